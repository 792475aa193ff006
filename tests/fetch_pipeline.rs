//! End-to-end tests for the framed fetch pipeline.

use std::sync::atomic::Ordering;
use std::time::Duration;

use urlfetch_relay::codec::compress_body;
use urlfetch_relay::config::RelayConfig;

mod common;

const SECRET: &str = "123456";

fn config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.fetch.password = SECRET.into();
    config
}

#[tokio::test]
async fn test_get_is_forwarded_and_obfuscated() {
    let (origin, log) = common::start_fixed_origin("200 OK", "text/html", b"<p>hello</p>").await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let frame = common::frame("GET", &format!("http://{origin}/"), Some(SECRET), &[], b"");
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.status, 200);
    assert!(reply.head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(reply.body, b"<p>hello</p>");
    assert_eq!(reply.disguise, "image/gif");

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].request_line, "GET / HTTP/1.1");
    assert!(seen[0].header("x-urlfetch-password").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_wrong_password_is_forbidden() {
    let (origin, log) = common::start_fixed_origin("200 OK", "text/html", b"secret").await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let frame = common::frame("GET", &format!("http://{origin}/"), Some("wrong"), &[], b"");
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.status, 403);
    assert!(String::from_utf8_lossy(&reply.body).contains("Wrong Password"));
    assert_eq!(reply.disguise, "image/gif");
    assert!(log.lock().unwrap().is_empty(), "origin must not be contacted");

    // A missing password is the same failure.
    let frame = common::frame("GET", &format!("http://{origin}/"), None, &[], b"");
    assert_eq!(common::post_frame(relay, frame, SECRET).await.status, 403);

    shutdown.trigger();
}

#[tokio::test]
async fn test_denylisted_host_is_forbidden() {
    let mut config = config();
    config.fetch.hosts_deny = vec![".example.com".into()];
    let (relay, shutdown) = common::start_relay(config).await;

    let frame = common::frame("GET", "http://images.example.com/a.png", Some(SECRET), &[], b"");
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.status, 403);
    assert!(String::from_utf8_lossy(&reply.body).contains("images.example.com"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_deflate_body_is_inflated_before_forwarding() {
    let (origin, log) = common::start_fixed_origin("201 Created", "text/plain", b"ok").await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let payload = b"name=value&".repeat(200);
    let compressed = compress_body(&payload).unwrap();
    let frame = common::frame(
        "POST",
        &format!("http://{origin}/submit"),
        Some(SECRET),
        &[("Content-Encoding", "deflate"), ("Content-Type", "application/x-www-form-urlencoded")],
        &compressed,
    );
    let reply = common::post_frame(relay, frame, SECRET).await;
    assert_eq!(reply.status, 201);

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen[0].request_line, "POST /submit HTTP/1.1");
    assert_eq!(seen[0].body, payload);
    assert_eq!(seen[0].header("content-length"), Some(payload.len().to_string().as_str()));
    assert!(seen[0].header("content-encoding").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_deflate_bomb_gets_too_large_page() {
    let (origin, log) = common::start_fixed_origin("200 OK", "text/plain", b"ok").await;
    let mut config = config();
    config.fetch.max_frame_bytes = 64 * 1024;
    let (relay, shutdown) = common::start_relay(config).await;

    let compressed = compress_body(&vec![0u8; 4 * 1024 * 1024]).unwrap();
    let frame = common::frame(
        "POST",
        &format!("http://{origin}/upload"),
        Some(SECRET),
        &[("Content-Encoding", "deflate")],
        &compressed,
    );
    assert!(frame.len() < 64 * 1024);

    let reply = common::post_frame(relay, frame, SECRET).await;
    assert_eq!(reply.status, 413);
    assert!(String::from_utf8_lossy(&reply.body).contains("Frame Too Large"));
    assert!(log.lock().unwrap().is_empty(), "origin must not be contacted");

    shutdown.trigger();
}

#[tokio::test]
async fn test_head_is_forwarded_without_body() {
    let (origin, log) =
        common::start_origin(|_| common::raw_response("200 OK", &[("Content-Type", "text/plain")], b"")).await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let frame = common::frame(
        "HEAD",
        &format!("http://{origin}/"),
        Some(SECRET),
        &[("Content-Length", "3")],
        b"xyz",
    );
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.status, 200);
    assert!(reply.body.is_empty());

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen[0].request_line, "HEAD / HTTP/1.1");
    assert!(seen[0].header("content-length").is_none());
    assert!(seen[0].body.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_media_response_switches_disguise() {
    let png: &'static [u8] = b"\x89PNG\r\n\x1a\nfake";
    let (image_origin, _) = common::start_fixed_origin("200 OK", "image/png", png).await;
    let (html_origin, _) = common::start_fixed_origin("200 OK", "text/html", b"<html/>").await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let image = common::post_frame(
        relay,
        common::frame("GET", &format!("http://{image_origin}/a.png"), Some(SECRET), &[], b""),
        SECRET,
    )
    .await;
    let html = common::post_frame(
        relay,
        common::frame("GET", &format!("http://{html_origin}/"), Some(SECRET), &[], b""),
        SECRET,
    )
    .await;

    assert_eq!(image.disguise, "image/x-png");
    assert_eq!(html.disguise, "image/gif");
    assert_ne!(image.disguise, html.disguise);
    assert_eq!(image.body, png);

    shutdown.trigger();
}

#[tokio::test]
async fn test_media_sent_in_clear_when_configured() {
    let (origin, _) = common::start_fixed_origin("200 OK", "video/mp4", b"frames").await;
    let mut config = config();
    config.fetch.obfuscate_media = false;
    let (relay, shutdown) = common::start_relay(config).await;

    let frame = common::frame("GET", &format!("http://{origin}/v.mp4"), Some(SECRET), &[], b"");
    let response = common::client()
        .post(format!("http://{relay}/"))
        .body(frame)
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["content-type"], "image/x-png");

    let plain = response.bytes().await.unwrap();
    let reply = common::decode_reply(&plain);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"frames");

    shutdown.trigger();
}

#[tokio::test]
async fn test_response_head_is_normalized() {
    let (origin, _) = common::start_origin(|_| {
        b"HTTP/1.1 200 OK\r\n\
          content-type: text/plain\r\n\
          x-custom-header: 1\r\n\
          set-cookie: a=1; Path=/\r\n\
          set-cookie: b=2; Expires=Wed, 21 Oct 2015 07:28:00 GMT\r\n\
          transfer-encoding: chunked\r\n\
          Connection: close\r\n\r\n\
          5\r\nhello\r\n0\r\n\r\n"
            .to_vec()
    })
    .await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let frame = common::frame("GET", &format!("http://{origin}/"), Some(SECRET), &[], b"");
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.body, b"hello");
    assert!(reply.head.contains("\r\nContent-Type: text/plain"));
    assert!(reply.head.contains("\r\nX-Custom-Header: 1"));
    assert!(reply.head.contains("\r\nSet-Cookie: a=1; Path=/"));
    assert!(reply.head.contains("\r\nSet-Cookie: b=2; Expires=Wed, 21 Oct 2015 07:28:00 GMT"));
    assert!(!reply.head.to_ascii_lowercase().contains("transfer-encoding"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_timeout_yields_502_and_closes_origin() {
    let (origin, closed) = common::start_silent_origin().await;
    let mut config = config();
    config.upstream.timeout_secs = 1;
    let (relay, shutdown) = common::start_relay(config).await;

    let frame = common::frame("GET", &format!("http://{origin}/slow"), Some(SECRET), &[], b"");
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.status, 502);
    assert!(String::from_utf8_lossy(&reply.body).contains("request timeout"));

    let mut waited = Duration::ZERO;
    while closed.load(Ordering::SeqCst) == 0 && waited < Duration::from_secs(3) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }
    assert_eq!(closed.load(Ordering::SeqCst), 1, "upstream connection left open");

    shutdown.trigger();
}

#[tokio::test]
async fn test_timeout_parameter_overrides_config() {
    let (origin, _) = common::start_silent_origin().await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let mut frame_request = urlfetch_relay::codec::DecodedRequest::new(
        "GET",
        url::Url::parse(&format!("http://{origin}/")).unwrap(),
    );
    frame_request.params.insert("password".into(), SECRET.into());
    frame_request.params.insert("timeout".into(), "1".into());
    let frame = urlfetch_relay::codec::encode_request(&frame_request).unwrap();

    let started = std::time::Instant::now();
    let reply = common::post_frame(relay, frame, SECRET).await;
    assert_eq!(reply.status, 502);
    assert!(started.elapsed() < Duration::from_secs(5), "config default of 20s was used");

    shutdown.trigger();
}

#[tokio::test]
async fn test_connection_refused_yields_502() {
    let dead = common::closed_port().await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let url = format!("http://{dead}/");
    let frame = common::frame("GET", &url, Some(SECRET), &[], b"");
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.status, 502);
    let page = String::from_utf8_lossy(&reply.body).to_string();
    assert!(page.contains("http.request error"));
    assert!(page.contains(&url));

    shutdown.trigger();
}

#[tokio::test]
async fn test_custom_method_is_forwarded() {
    let (origin, log) = common::start_fixed_origin("200 OK", "text/plain", b"").await;
    let (relay, shutdown) = common::start_relay(config()).await;

    let frame = common::frame("PURGE", &format!("http://{origin}/cache"), Some(SECRET), &[], b"");
    let reply = common::post_frame(relay, frame, SECRET).await;

    assert_eq!(reply.status, 200);
    assert_eq!(log.lock().unwrap()[0].request_line, "PURGE /cache HTTP/1.1");

    shutdown.trigger();
}

#[tokio::test]
async fn test_malformed_frame_gets_error_page() {
    let (relay, shutdown) = common::start_relay(config()).await;

    let reply = common::post_frame(relay, b"\x00\x10not deflate at all".to_vec(), SECRET).await;
    assert_eq!(reply.status, 400);
    assert!(String::from_utf8_lossy(&reply.body).contains("Malformed Frame"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_non_frame_requests_are_redirected() {
    let (relay, shutdown) = common::start_relay(config()).await;
    let client = common::client();

    let get = client.get(format!("http://{relay}/index.php")).send().await.unwrap();
    assert_eq!(get.status(), 302);
    assert_eq!(get.headers()["location"], "https://www.google.com/");

    let empty_post = client.post(format!("http://{relay}/")).send().await.unwrap();
    assert_eq!(empty_post.status(), 302);

    shutdown.trigger();
}
