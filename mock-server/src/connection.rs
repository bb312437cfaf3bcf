//! One HTTP/1.1 exchange per accepted connection.
//!
//! The listener owns the raw socket instead of handing it to a framework so
//! that faults can be injected below the HTTP layer. Requests for the admin
//! API are forwarded to the axum router; everything else is matched against
//! the registered stubs and recorded in the journal. Every response carries
//! `connection: close`.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use log::debug;
use rand::Rng;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tower::ServiceExt;

use crate::admin::ADMIN_PREFIX;
use crate::error::ServerError;
use crate::journal::RecordedRequest;
use crate::state::SharedState;
use crate::stub::Fault;
use crate::template;

const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const GARBAGE_LEN: usize = 256;
const GARBAGE_CHUNK: &[u8] = b"lskdu018973t09sylgasjkfg1][]'./.sdlv";

pub const NO_MATCH_BODY: &str = "No stub matched the request";

#[derive(Debug)]
struct RawRequest {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

pub(crate) async fn handle(mut stream: TcpStream, state: SharedState, admin: Router) -> Result<(), ServerError> {
    let raw = {
        let mut reader = BufReader::new(&mut stream);
        match read_request(&mut reader).await {
            Ok(raw) => raw,
            Err(ServerError::BadRequest(reason)) => {
                drop(reader);
                return write_response(&mut stream, 400, &[], reason.as_bytes()).await;
            }
            Err(e) => return Err(e),
        }
    };
    let Some(raw) = raw else {
        return Ok(());
    };

    if raw.target.starts_with(ADMIN_PREFIX) {
        return serve_admin(&mut stream, admin, raw).await;
    }

    let body = String::from_utf8_lossy(&raw.body).into_owned();
    let request = match RecordedRequest::new(&raw.method, &raw.target, raw.headers, body) {
        Ok(request) => request,
        Err(e) => return write_response(&mut stream, 400, &[], e.to_string().as_bytes()).await,
    };
    state.record(request.clone());

    let Some(response) = state.find_response(&request) else {
        debug!("no stub matched {} {}", request.method, request.url());
        return write_response(
            &mut stream,
            404,
            &[("content-type", "text/plain")],
            NO_MATCH_BODY.as_bytes(),
        )
        .await;
    };
    debug!("{} {} -> {}", request.method, request.url(), response.status);

    if let Some(delay) = response.delay {
        tokio::time::sleep(delay.sample()).await;
    }
    if let Some(fault) = response.fault {
        debug!("injecting {fault:?}");
        return inject_fault(stream, fault).await;
    }

    let body = if response.templated {
        template::render(&response.body, &request)
    } else {
        response.body
    };
    let headers: Vec<(&str, &str)> = response
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    write_response(&mut stream, response.status, &headers, body.as_bytes()).await
}

/// Returns `None` when the peer closed before sending a request line.
async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<RawRequest>, ServerError> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ServerError::BadRequest(format!("bad request line {:?}", line.trim_end())));
    };
    let (method, target) = (method.to_string(), target.to_string());

    let mut head_bytes = line.len();
    let mut headers = Vec::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(ServerError::BadRequest("connection closed inside request head".into()));
        }
        head_bytes += n;
        if head_bytes > MAX_HEAD_BYTES {
            return Err(ServerError::BadRequest("request head too large".into()));
        }
        let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
        if trimmed.is_empty() {
            break;
        }
        let Some((name, value)) = trimmed.split_once(':') else {
            return Err(ServerError::BadRequest(format!("bad header line {trimmed:?}")));
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let chunked = header(&headers, "transfer-encoding").is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    let body = if chunked {
        read_chunked(reader).await?
    } else if let Some(length) = header(&headers, "content-length") {
        let length: usize = length
            .parse()
            .map_err(|_| ServerError::BadRequest(format!("bad content-length {length:?}")))?;
        if length > MAX_BODY_BYTES {
            return Err(body_too_large());
        }
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await?;
        body
    } else {
        Vec::new()
    };

    Ok(Some(RawRequest {
        method,
        target,
        headers,
        body,
    }))
}

async fn read_chunked<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ServerError> {
    let mut body = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ServerError::BadRequest("truncated chunked body".into()));
        }
        let size_field = line.trim().split(';').next().unwrap_or_default();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| ServerError::BadRequest(format!("bad chunk size {size_field:?}")))?;
        if size == 0 {
            // trailers
            loop {
                line.clear();
                if reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
                    return Ok(body);
                }
            }
        }
        let start = body.len();
        let end = start
            .checked_add(size)
            .filter(|&end| end <= MAX_BODY_BYTES)
            .ok_or_else(body_too_large)?;
        body.resize(end, 0);
        reader.read_exact(&mut body[start..]).await?;
        line.clear();
        reader.read_line(&mut line).await?;
    }
}

fn body_too_large() -> ServerError {
    ServerError::BadRequest(format!("request body exceeds {MAX_BODY_BYTES} bytes"))
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

async fn serve_admin(stream: &mut TcpStream, admin: Router, raw: RawRequest) -> Result<(), ServerError> {
    let mut builder = Request::builder().method(raw.method.as_str()).uri(raw.target.as_str());
    for (name, value) in &raw.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let request = match builder.body(Body::from(raw.body)) {
        Ok(request) => request,
        Err(e) => return write_response(stream, 400, &[], e.to_string().as_bytes()).await,
    };

    let response = match admin.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.into_body().collect().await?.to_bytes();
    let headers: Vec<(&str, &str)> = headers.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
    write_response(stream, status, &headers, &body).await
}

async fn write_response(
    stream: &mut TcpStream,
    status: u16,
    headers: &[(&str, &str)],
    body: &[u8],
) -> Result<(), ServerError> {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("");
    let mut head = format!("HTTP/1.1 {status} {reason}\r\n");
    for (name, value) in headers {
        let framing = ["content-length", "connection", "transfer-encoding"]
            .iter()
            .any(|reserved| name.eq_ignore_ascii_case(reserved));
        if !framing {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
    }
    head.push_str(&format!("content-length: {}\r\nconnection: close\r\n\r\n", body.len()));

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn inject_fault(mut stream: TcpStream, fault: Fault) -> Result<(), ServerError> {
    match fault {
        Fault::EmptyResponse => stream.shutdown().await?,
        Fault::MalformedResponseChunk => {
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ntransfer-encoding: chunked\r\n\r\n")
                .await?;
            stream.write_all(GARBAGE_CHUNK).await?;
            stream.shutdown().await?;
        }
        Fault::RandomDataThenClose => {
            let garbage = random_bytes(GARBAGE_LEN);
            stream.write_all(&garbage).await?;
            stream.shutdown().await?;
        }
        Fault::ConnectionResetByPeer => {
            // zero linger turns the close into an RST
            #[allow(deprecated)]
            let linger = stream.set_linger(Some(Duration::ZERO));
            linger?;
            drop(stream);
        }
    }
    Ok(())
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(raw: &[u8]) -> Result<Option<RawRequest>, ServerError> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader).await
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let raw = b"POST /movieservice/v1/movie HTTP/1.1\r\nHost: x\r\nContent-Length: 13\r\n\r\n{\"name\":\"Up\"}";
        let req = parse(raw).await.unwrap().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.target, "/movieservice/v1/movie");
        assert_eq!(req.body, b"{\"name\":\"Up\"}");
        assert_eq!(header(&req.headers, "host"), Some("x"));
    }

    #[tokio::test]
    async fn reads_chunked_body() {
        let raw = b"PUT /movieservice/v1/movie/3 HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\n{\"a\"\r\n5;ext=1\r\n:\"b\"}\r\n0\r\n\r\n";
        let req = parse(raw).await.unwrap().unwrap();
        assert_eq!(req.body, b"{\"a\":\"b\"}");
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected() {
        let raw = b"POST /movieservice/v1/movie HTTP/1.1\r\nContent-Length: 99999999999999999\r\n\r\n{}";
        assert!(matches!(parse(raw).await, Err(ServerError::BadRequest(_))));

        let raw = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_BYTES + 1
        );
        assert!(matches!(parse(raw.as_bytes()).await, Err(ServerError::BadRequest(_))));
    }

    #[tokio::test]
    async fn oversized_chunk_is_rejected() {
        let raw = b"PUT / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n1\r\na\r\nffffffffffffffff\r\nb\r\n0\r\n\r\n";
        assert!(matches!(parse(raw).await, Err(ServerError::BadRequest(_))));
    }

    #[tokio::test]
    async fn empty_stream_is_not_an_error() {
        assert!(parse(b"").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_head_is_rejected() {
        assert!(matches!(parse(b"GARBAGE\r\n\r\n").await, Err(ServerError::BadRequest(_))));
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nno-colon-here\r\n\r\n").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nHost: x\r\n").await,
            Err(ServerError::BadRequest(_))
        ));
    }
}
