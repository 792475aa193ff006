//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use urlfetch_relay::codec::{encode_request, DecodedRequest};
use urlfetch_relay::config::RelayConfig;
use urlfetch_relay::http::HttpServer;
use urlfetch_relay::lifecycle::Shutdown;
use urlfetch_relay::net::Listener;
use urlfetch_relay::obfuscation::XorCipher;

/// One request as the mock origin saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub type Log = Arc<Mutex<Vec<Recorded>>>;

/// Start the relay on an ephemeral port. Keep the `Shutdown` alive.
pub async fn start_relay(config: RelayConfig) -> (SocketAddr, Shutdown) {
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let listener = Listener::from_tokio(socket, config.listener.max_connections);
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Start a mock origin that records each request and answers with the raw
/// bytes `respond` builds. Every connection is closed after one exchange.
pub async fn start_origin<F>(respond: F) -> (SocketAddr, Log)
where
    F: Fn(&Recorded) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::default();
    let respond = Arc::new(respond);

    let seen = log.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = respond.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let Some(recorded) = read_request(&mut socket).await else {
                    return;
                };
                let response = respond(&recorded);
                seen.lock().unwrap().push(recorded);
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, log)
}

/// Mock origin with a fixed status, Content-Type and body.
pub async fn start_fixed_origin(
    status: &'static str,
    content_type: &'static str,
    body: &'static [u8],
) -> (SocketAddr, Log) {
    start_origin(move |_| raw_response(status, &[("Content-Type", content_type)], body)).await
}

/// Start a programmable mock origin with async support.
pub async fn start_programmable_origin<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<u8>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let response = f().await;
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Origin that accepts and never answers. The counter goes up once the
/// relay side closes the socket.
pub async fn start_silent_origin() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let closed = Arc::new(AtomicUsize::new(0));

    let counter = closed.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => continue,
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    (addr, closed)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn raw_response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Recorded {
        request_line,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Encode a client frame for `method url` carrying the given password.
pub fn frame(method: &str, url: &str, password: Option<&str>, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut request = DecodedRequest::new(method, Url::parse(url).unwrap());
    for (name, value) in headers {
        request.headers.insert(name, *value);
    }
    if let Some(password) = password {
        request.params.insert("password".into(), password.into());
    }
    request.body = body.to_vec().into();
    encode_request(&request).unwrap()
}

/// Client for talking to the relay: no proxy, no redirects, no pooling.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// A decoded relay reply.
#[derive(Debug)]
pub struct Reply {
    /// Outer Content-Type (the disguise).
    pub disguise: String,
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

/// POST a frame and undo the obfuscation with the given secret.
pub async fn post_frame(relay: SocketAddr, frame: Vec<u8>, secret: &str) -> Reply {
    let response = client()
        .post(format!("http://{relay}/"))
        .body(frame)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200, "outer status is always 200");

    let disguise = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.bytes().await.unwrap();
    let mut reply = decode_reply(&XorCipher::from_secret(secret).apply(bytes));
    reply.disguise = disguise;
    reply
}

/// Split a plaintext reply into status, head text and body.
pub fn decode_reply(plain: &[u8]) -> Reply {
    let split = find(plain, b"\r\n\r\n").expect("reply has a header terminator");
    let head = String::from_utf8_lossy(&plain[..split]).to_string();
    let status = head
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("reply has a status line");

    Reply {
        disguise: String::new(),
        status,
        head,
        body: plain[split + 4..].to_vec(),
    }
}
