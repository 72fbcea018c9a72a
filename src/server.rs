//! HTTP boundary
//! Minimal HTTP/1.1 handling on tokio: one task per connection, one request
//! per connection, permissive CORS on every response.

use crate::error::{GatewayError, Result};
use crate::pipeline::{IncomingRequest, QueryPipeline};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

const MAX_REQUEST_BYTES: usize = 1_000_000;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    pub fn from_error(err: &GatewayError) -> Self {
        Self::error(err.status_code(), &err.client_message())
    }

    pub fn to_http_string(&self) -> String {
        create_response(self.status, status_text(self.status), &self.body)
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}

/// Accept connections forever, spawning one task per connection.
pub async fn serve(listener: TcpListener, pipeline: Arc<QueryPipeline>) -> Result<()> {
    info!("Listening on {}", listener.local_addr()?);
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from {}", addr);
        let pipeline = pipeline.clone();
        let span = info_span!("request", id = %Uuid::new_v4(), peer = %addr);
        tokio::spawn(handle_connection(stream, pipeline).instrument(span));
    }
}

pub async fn handle_connection<S>(mut stream: S, pipeline: Arc<QueryPipeline>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let buffer = match timeout(READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(buffer)) => buffer,
        Ok(Err(e)) => {
            warn!("Failed to read from stream: {}", e);
            return;
        }
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
    };

    if buffer.is_empty() {
        return;
    }

    let response = if request_size(&buffer) > MAX_REQUEST_BYTES {
        HttpResponse::error(413, "Request body too large")
    } else {
        handle_request(&pipeline, &buffer).await
    };

    if let Err(e) = stream.write_all(response.to_http_string().as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
    let _ = stream.shutdown().await;
}

/// Read until the headers and `Content-Length` bytes of body have arrived.
async fn read_request<S>(stream: &mut S) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut temp_buf = [0u8; 8192];

    loop {
        let n = stream.read(&mut temp_buf).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&temp_buf[..n]);

        let size = request_size(&buffer);
        if buffer.len() >= size || size > MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(buffer)
}

/// Full request size once headers are in (headers plus declared body),
/// otherwise an upper bound just past what has been read so far.
fn request_size(buffer: &[u8]) -> usize {
    match find_header_end(buffer) {
        Some(headers_end) => {
            let headers = String::from_utf8_lossy(&buffer[..headers_end]);
            let content_length = extract_content_length(&headers).unwrap_or(0);
            (headers_end + 4)
                .saturating_add(content_length)
                .max(buffer.len())
        }
        None => buffer.len() + 1,
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

fn extract_content_length(headers: &str) -> Option<usize> {
    for line in headers.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

/// Route one raw request and produce its response.
pub async fn handle_request(pipeline: &QueryPipeline, raw: &[u8]) -> HttpResponse {
    let (head, body) = match find_header_end(raw) {
        Some(end) => (&raw[..end], &raw[end + 4..]),
        None => (raw, &raw[raw.len()..]),
    };
    let head = String::from_utf8_lossy(head);

    let request_line = head.lines().next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return HttpResponse::error(400, "Malformed request line");
    }

    let method = parts[0];
    let path = parts[1].split('?').next().unwrap_or("/");
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    debug!("Request: {} {}", method, path);

    match (method, path) {
        ("OPTIONS", _) => HttpResponse {
            status: 204,
            body: String::new(),
        },
        ("GET", "/health") => HttpResponse::json(200, &serde_json::json!({ "status": "ok" })),
        ("POST", "/query") => handle_query(pipeline, body).await,
        _ => HttpResponse::error(404, "Not found"),
    }
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    user_id: Option<Value>,
}

fn caller_id(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

async fn handle_query(pipeline: &QueryPipeline, body: &[u8]) -> HttpResponse {
    let parsed: QueryBody = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) => return HttpResponse::error(400, &format!("Invalid JSON body: {}", e)),
    };

    let request = IncomingRequest::new(parsed.query.unwrap_or_default(), caller_id(parsed.user_id));

    match pipeline.run(&request).await {
        Ok(payload) => match serde_json::to_value(&payload) {
            Ok(json) => HttpResponse::json(200, &json),
            Err(e) => HttpResponse::from_error(&GatewayError::Json(e)),
        },
        Err(e) => {
            if e.is_fault() {
                error!("Query failed: {}", e);
            } else {
                info!("Query refused: {}", e);
            }
            HttpResponse::from_error(&e)
        }
    }
}
