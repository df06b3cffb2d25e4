//! Request logging for the admin server.
//!
//! `-v` prints one line per request; `-vv` also echoes request and response
//! bodies. Anti-forgery tokens are masked and CSV downloads are summarized by
//! size instead of being echoed.

use std::io::IsTerminal;
use std::sync::LazyLock;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Local;
use regex::Regex;
use serde_json::Value;

/// Form and query fields whose values never reach the log.
const MASKED_FIELDS: &[&str] = &["nonce", "natf_nonce"];

/// A token parameter embedded in a URL, raw (`&nonce=`) or HTML-escaped (`&amp;nonce=`).
static TOKEN_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r#"([?&;](?:natf_)?nonce=)[^&"'\s<>]*"#) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid token parameter regex: {err}"),
    }
});

// ANSI color codes
struct Palette {
    reset: &'static str,
    dim: &'static str,
    green: &'static str,
    yellow: &'static str,
    red: &'static str,
    cyan: &'static str,
    blue: &'static str,
    magenta: &'static str,
    gray: &'static str,
}

impl Palette {
    fn detect() -> Self {
        if std::io::stderr().is_terminal() {
            Self {
                reset: "\x1b[0m",
                dim: "\x1b[2m",
                green: "\x1b[92m",
                yellow: "\x1b[93m",
                red: "\x1b[91m",
                cyan: "\x1b[96m",
                blue: "\x1b[94m",
                magenta: "\x1b[95m",
                gray: "\x1b[90m",
            }
        } else {
            Self {
                reset: "",
                dim: "",
                green: "",
                yellow: "",
                red: "",
                cyan: "",
                blue: "",
                magenta: "",
                gray: "",
            }
        }
    }

    fn status(&self, status: StatusCode) -> &'static str {
        if status.is_success() {
            self.green
        } else if status.is_redirection() {
            self.yellow
        } else {
            self.red
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S,%3f").to_string()
}

/// Mask token values in a urlencoded query string or form body.
#[must_use]
pub fn mask_tokens(encoded: &str) -> String {
    encoded
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if MASKED_FIELDS.contains(&key) => format!("{key}=***"),
            _ => pair.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Mask token-bearing values anywhere in a JSON document.
///
/// Strings under a key ending in `nonce` are replaced outright; token
/// parameters inside other strings (download links, summary markup) are masked.
fn mask_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key.ends_with("nonce") && child.is_string() {
                    *child = Value::String("***".to_owned());
                } else {
                    mask_json(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_json),
        Value::String(text) if text.contains('?') => {
            let masked = TOKEN_PARAM.replace_all(text.as_str(), "${1}***").into_owned();
            *text = masked;
        }
        _ => {}
    }
}

/// Render a body for the debug log.
fn describe_body(bytes: &Bytes, content_type: Option<&str>) -> String {
    if content_type.is_some_and(|ct| ct.starts_with("text/csv")) {
        return format!("<{} bytes of CSV>", bytes.len());
    }
    if let Ok(mut json) = serde_json::from_slice::<Value>(bytes) {
        mask_json(&mut json);
        return serde_json::to_string_pretty(&json).unwrap_or_default();
    }
    mask_tokens(&String::from_utf8_lossy(bytes))
}

fn content_type(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

#[derive(Debug, Clone, Copy)]
pub struct LoggingMiddleware {
    pub verbose: u8,
}

impl LoggingMiddleware {
    #[must_use]
    pub fn new(verbose: u8) -> Self {
        Self { verbose }
    }

    pub async fn handle(self, request: Request, next: Next) -> Response {
        if self.verbose == 0 {
            return next.run(request).await;
        }

        let palette = Palette::detect();
        let method = request.method().clone();
        let target = match request.uri().query() {
            Some(query) => format!("{}?{}", request.uri().path(), mask_tokens(query)),
            None => request.uri().path().to_owned(),
        };
        let start = Instant::now();

        let request = if self.verbose >= 2 {
            log_request_body(request, &palette).await
        } else {
            request
        };
        let response = next.run(request).await;

        let status = response.status();
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        // eprintln! rather than tracing so ANSI codes are not escaped.
        eprintln!(
            "{} - INFO - {}{method}{} {}{target}{} -> {}{}{} in {}{duration_ms:.1}ms{}",
            timestamp(),
            palette.cyan,
            palette.reset,
            palette.blue,
            palette.reset,
            palette.status(status),
            status.as_u16(),
            palette.reset,
            palette.magenta,
            palette.reset
        );

        if self.verbose >= 2 {
            return log_response_body(response, &palette).await;
        }
        response
    }
}

async fn log_request_body(request: Request, palette: &Palette) -> Request {
    let (parts, body) = request.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return Request::from_parts(parts, Body::empty());
    };
    if !bytes.is_empty() {
        let kind = content_type(&parts.headers);
        eprintln!(
            "{} - DEBUG - {}Request body:{}\n{}{}{}",
            timestamp(),
            palette.dim,
            palette.reset,
            palette.gray,
            describe_body(&bytes, kind.as_deref()),
            palette.reset
        );
    }
    Request::from_parts(parts, Body::from(bytes))
}

async fn log_response_body(response: Response, palette: &Palette) -> Response {
    let (parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return Response::from_parts(parts, Body::empty());
    };
    if !bytes.is_empty() {
        let kind = content_type(&parts.headers);
        eprintln!(
            "{} - DEBUG - {}Response body:{}\n{}{}{}",
            timestamp(),
            palette.dim,
            palette.reset,
            palette.gray,
            describe_body(&bytes, kind.as_deref()),
            palette.reset
        );
    }
    Response::from_parts(parts, Body::from(bytes))
}
