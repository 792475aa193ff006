//! Error pages.
//!
//! Failures that happen before an origin response exists are answered with
//! a small HTML page. The page travels back exactly like origin content: a
//! serialized `HTTP/1.1` head plus body, obfuscated, under the default
//! disguise type. Only the decoded status tells the client it failed.

use axum::http::{header, StatusCode};

use crate::codec::ResponseHead;

/// Page title used for 403 rejections.
pub const FORBIDDEN_TITLE: &str = "403 Forbidden";
/// Page title used for every upstream-side failure.
pub const URLFETCH_ERROR_TITLE: &str = "502 Urlfetch Error";

/// Render the error page.
///
/// Each argument is inserted exactly once. Inserted text is never scanned
/// again, so a detail containing template-like text stays literal.
pub fn render(title: &str, banner: &str, detail: &str) -> String {
    format!(
        r#"
<html><head>
<meta http-equiv="content-type" content="text/html;charset=utf-8">
<title>{title}</title>
<style><!--
body {{font-family: arial,sans-serif}}
div.nav {{margin-top: 1ex}}
div.nav A {{font-size: 10pt; font-family: arial,sans-serif}}
span.nav {{font-size: 10pt; font-family: arial,sans-serif; font-weight: bold}}
div.nav A,span.big {{font-size: 12pt; color: #0000cc}}
div.nav A {{font-size: 10pt; color: black}}
A.l:link {{color: #6f6f6f}}
A.u:link {{color: green}}
//--></style>
</head>
<body text=#000000 bgcolor=#ffffff>
<table border=0 cellpadding=2 cellspacing=0 width=100%>
<tr><td bgcolor=#3366cc><font face=arial,sans-serif color=#ffffff><b>Message</b></td></tr>
<tr><td> </td></tr></table>
<blockquote>
<H1>{banner}</H1>
{detail}
<p>
</blockquote>
<table width=100% cellpadding=0 cellspacing=0><tr><td bgcolor=#3366cc><img alt="" width=1 height=4></td></tr></table>
</body></html>
"#,
        title = escape(title),
        banner = escape(banner),
        detail = escape(detail),
    )
}

/// Serialized head and body of an error page, not yet obfuscated.
pub fn error_frame(status: StatusCode, title: &str, banner: &str, detail: &str) -> Vec<u8> {
    let page = render(title, banner, detail);

    let mut head = ResponseHead::new(status);
    head.push(header::CONTENT_TYPE.as_str(), b"text/html; charset=utf-8");
    head.push(header::CONTENT_LENGTH.as_str(), page.len().to_string().as_bytes());

    let mut frame = head.to_bytes();
    frame.extend_from_slice(page.as_bytes());
    frame
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
