use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, error};

use crate::engine::{Engine, EngineError};
use crate::limits::*;
use crate::model::*;
use crate::observability::{REQUEST_DURATION_SECONDS, REQUESTS_TOTAL, route_label};

const LIVENESS_TEXT: &str = "Hotel Room Reservation System";
const INTERNAL_ERROR: &str = "Internal server error";
const CORS_ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Content-Type";

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug)]
pub enum HttpError {
    Io(io::Error),
    Malformed(&'static str),
    TooLarge,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Io(e) => write!(f, "I/O error: {e}"),
            HttpError::Malformed(what) => write!(f, "malformed request: {what}"),
            HttpError::TooLarge => write!(f, "request too large"),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        HttpError::Io(e)
    }
}

// ── Messages ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target without the query string.
    pub path: String,
    /// Lowercased names, trimmed values, in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub keep_alive: bool,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Bytes,
    pub close: bool,
}

impl Response {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            body: Bytes::new(),
            close: false,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            content_type: Some("text/plain; charset=utf-8"),
            body: Bytes::copy_from_slice(body.as_bytes()),
            ..Self::empty(status)
        }
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                content_type: Some("application/json"),
                body: Bytes::from(body),
                ..Self::empty(status)
            },
            Err(e) => {
                error!("failed to encode response body: {e}");
                Self::error(500, INTERNAL_ERROR)
            }
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = ErrorBody {
            error: message.to_string(),
        };
        Self {
            content_type: Some("application/json"),
            body: Bytes::from(serde_json::to_vec(&body).unwrap_or_default()),
            ..Self::empty(status)
        }
    }

    fn closing(mut self) -> Self {
        self.close = true;
        self
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

// ── Codec ────────────────────────────────────────────────────────

/// HTTP/1.x framing: `Content-Length` bodies only, no chunked transfer.
#[derive(Debug, Default)]
pub struct HttpCodec;

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

impl Decoder for HttpCodec {
    type Item = Request;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, HttpError> {
        let Some(head_len) = find_head_end(src) else {
            if src.len() > MAX_HEAD_LEN {
                return Err(HttpError::TooLarge);
            }
            return Ok(None);
        };
        if head_len > MAX_HEAD_LEN {
            return Err(HttpError::TooLarge);
        }

        let head = std::str::from_utf8(&src[..head_len - 4])
            .map_err(|_| HttpError::Malformed("request head is not UTF-8"))?;
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split(' ');
        let (method, target, version) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(m), Some(t), Some(v), None) if !m.is_empty() && t.starts_with('/') => {
                    (m, t, v)
                }
                _ => return Err(HttpError::Malformed("bad request line")),
            };
        let http10 = match version {
            "HTTP/1.1" => false,
            "HTTP/1.0" => true,
            _ => return Err(HttpError::Malformed("unsupported HTTP version")),
        };

        let mut headers = Vec::new();
        for line in lines {
            if headers.len() == MAX_HEADERS {
                return Err(HttpError::TooLarge);
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(HttpError::Malformed("bad header line"))?;
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
        let header = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };

        if header("transfer-encoding").is_some() {
            return Err(HttpError::Malformed("transfer-encoding is not supported"));
        }
        let content_length = match header("content-length") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| HttpError::Malformed("bad content-length"))?,
            None => 0,
        };
        if content_length > MAX_BODY_LEN {
            return Err(HttpError::TooLarge);
        }
        let keep_alive = match header("connection").map(str::to_ascii_lowercase) {
            Some(c) if c == "close" => false,
            Some(c) if c == "keep-alive" => true,
            _ => !http10,
        };

        let total = head_len + content_length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let method = method.to_string();
        let path = target.split('?').next().unwrap_or(target).to_string();
        let mut frame = src.split_to(total);
        let body = frame.split_off(head_len).freeze();

        Ok(Some(Request {
            method,
            path,
            headers,
            body,
            keep_alive,
        }))
    }
}

impl Encoder<Response> for HttpCodec {
    type Error = HttpError;

    fn encode(&mut self, response: Response, dst: &mut BytesMut) -> Result<(), HttpError> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            response.status,
            reason_phrase(response.status)
        );
        if let Some(content_type) = response.content_type {
            head.push_str(&format!("content-type: {content_type}\r\n"));
        }
        head.push_str(&format!("content-length: {}\r\n", response.body.len()));
        head.push_str("access-control-allow-origin: *\r\n");
        for (name, value) in &response.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if response.close {
            head.push_str("connection: close\r\n");
        }
        head.push_str("\r\n");

        dst.reserve(head.len() + response.body.len());
        dst.extend_from_slice(head.as_bytes());
        dst.extend_from_slice(&response.body);
        Ok(())
    }
}

// ── Routing ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    BookRooms,
    GetBookings,
    ResetBookings,
    RandomOccupancy,
    /// CORS preflight on any path.
    Preflight,
    MethodNotAllowed,
    NotFound,
}

impl Route {
    pub fn resolve(method: &str, path: &str) -> Self {
        if method == "OPTIONS" {
            return Route::Preflight;
        }
        let (route, expected) = match path {
            "/" => (Route::Root, "GET"),
            "/bookRooms" => (Route::BookRooms, "POST"),
            "/getBookings" => (Route::GetBookings, "GET"),
            "/resetBookings" => (Route::ResetBookings, "DELETE"),
            "/randomOccupancy" => (Route::RandomOccupancy, "GET"),
            _ => return Route::NotFound,
        };
        if method == expected {
            route
        } else {
            Route::MethodNotAllowed
        }
    }
}

/// `numRooms` from a JSON body, if it is present and a whole number. `2.0` counts
/// as 2 since JSON clients often send every number as a double.
fn parse_num_rooms(body: &[u8]) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let num_rooms = value.get("numRooms")?;
    if let Some(n) = num_rooms.as_i64() {
        return Some(n);
    }
    let n = num_rooms.as_f64()?;
    (n.is_finite() && n.fract() == 0.0 && n.abs() <= i64::MAX as f64).then_some(n as i64)
}

fn engine_error(e: EngineError) -> Response {
    if e.is_client_error() {
        debug!("request rejected: {e}");
        Response::error(400, &e.to_string())
    } else {
        error!("request failed: {e}");
        Response::error(500, INTERNAL_ERROR)
    }
}

async fn dispatch(engine: &Engine, route: Route, request: &Request) -> Response {
    match route {
        Route::Root => Response::text(200, LIVENESS_TEXT),
        Route::BookRooms => {
            let result = match parse_num_rooms(&request.body) {
                Some(n) => engine.book_rooms(n).await,
                None => Err(EngineError::InvalidRoomCount(None)),
            };
            match result {
                Ok(rooms) => Response::json(
                    200,
                    &BookingReceipt {
                        message: "Rooms booked successfully".into(),
                        rooms,
                    },
                ),
                Err(e) => engine_error(e),
            }
        }
        Route::GetBookings => match engine.booked_rooms().await {
            Ok(rooms) => Response::json(200, &rooms),
            Err(e) => engine_error(e),
        },
        Route::ResetBookings => match engine.reset_bookings().await {
            Ok(_) => Response::json(
                200,
                &MessageBody {
                    message: "All bookings cleared!".into(),
                },
            ),
            Err(e) => engine_error(e),
        },
        Route::RandomOccupancy => match engine.random_occupancy().await {
            Ok(report) => Response::json(200, &report),
            Err(e) => {
                error!("error generating random occupancy: {e}");
                Response::error(500, INTERNAL_ERROR)
            }
        },
        Route::Preflight => Response {
            headers: vec![
                ("access-control-allow-methods", CORS_ALLOW_METHODS),
                ("access-control-allow-headers", CORS_ALLOW_HEADERS),
            ],
            ..Response::empty(204)
        },
        Route::MethodNotAllowed => Response::error(405, "Method not allowed"),
        Route::NotFound => Response::error(404, "Not found"),
    }
}

/// Route and serve one request.
pub async fn handle(engine: &Engine, request: &Request) -> Response {
    let route = Route::resolve(&request.method, &request.path);
    let started = Instant::now();
    let response = dispatch(engine, route, request).await;

    let label = route_label(&route);
    metrics::counter!(REQUESTS_TOTAL, "route" => label, "status" => response.status.to_string())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "route" => label)
        .record(started.elapsed().as_secs_f64());
    debug!("{} {} -> {}", request.method, request.path, response.status);
    response
}

/// Serve requests on one connection until the peer closes, asks to close, or
/// sends something unparseable.
pub async fn process_connection<S>(socket: S, engine: Arc<Engine>) -> Result<(), HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(socket, HttpCodec);
    while let Some(frame) = framed.next().await {
        let request = match frame {
            Ok(request) => request,
            Err(HttpError::Io(e)) => return Err(HttpError::Io(e)),
            Err(e) => {
                debug!("rejecting request: {e}");
                let status = if matches!(e, HttpError::TooLarge) { 413 } else { 400 };
                framed.send(Response::error(status, &e.to_string()).closing()).await?;
                return Ok(());
            }
        };

        let mut response = handle(&engine, &request).await;
        if !request.keep_alive {
            response = response.closing();
        }
        let close = response.close;
        framed.send(response).await?;
        if close {
            break;
        }
    }
    Ok(())
}
