//! `multipart/form-data` response bodies.
//!
//! Transaction results come back as one part per relation (an Arrow IPC
//! stream named by its relation-id path), plus JSON parts named
//! `transaction`, `metadata` and `problems`.

use crate::error::{ClientError, ClientResult};

/// One named part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// True for a `multipart/*` content type
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/")
}

/// The `boundary` parameter of a content type
pub fn boundary(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Split a body into its parts, in order
pub fn split_parts(content_type: &str, body: &[u8]) -> ClientResult<Vec<Part>> {
    let boundary = boundary(content_type).ok_or_else(|| {
        ClientError::invalid_response(format!("no multipart boundary in '{content_type}'"))
    })?;
    let delimiter = format!("--{boundary}").into_bytes();

    let mut parts = Vec::new();
    let mut cursor = find(body, &delimiter, 0)
        .ok_or_else(|| ClientError::invalid_response("multipart body has no opening delimiter"))?
        + delimiter.len();

    loop {
        // closing delimiter
        if body[cursor..].starts_with(b"--") {
            return Ok(parts);
        }
        let next = find(body, &delimiter, cursor)
            .ok_or_else(|| ClientError::invalid_response("multipart body is not terminated"))?;
        parts.push(parse_part(&body[cursor..next])?);
        cursor = next + delimiter.len();
    }
}

fn parse_part(raw: &[u8]) -> ClientResult<Part> {
    let raw = raw.strip_prefix(b"\r\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r\n").unwrap_or(raw);
    let split = find(raw, b"\r\n\r\n", 0)
        .ok_or_else(|| ClientError::invalid_response("multipart part has no header block"))?;
    let headers = String::from_utf8_lossy(&raw[..split]);

    let mut name = None;
    let mut content_type = None;
    for line in headers.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            name = disposition_name(value).map(str::to_string);
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }

    let name = name
        .ok_or_else(|| ClientError::invalid_response("multipart part has no name"))?;
    Ok(Part {
        name,
        content_type,
        body: raw[split + 4..].to_vec(),
    })
}

fn disposition_name(value: &str) -> Option<&str> {
    value.split(';').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        (key.trim() == "name").then(|| value.trim().trim_matches('"'))
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}
