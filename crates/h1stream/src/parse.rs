//! Single-line parsers for the HTTP/1.x response grammar
//!
//! Each function receives one line without its `\n` terminator. A trailing
//! `\r` is tolerated everywhere.

use http::StatusCode;
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};

use crate::state::{ParseError, ParseErrorKind};

/// A header line reduced to what affects message framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    ContentLength(u64),
    Chunked,
    Other,
}

/// Strip the optional `\r` preceding the line terminator.
pub fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Parse `<protocol> <status-code> [<reason>]`.
///
/// The reason phrase may be empty or missing entirely; only the protocol
/// token and the status code are checked.
pub fn parse_status_line(line: &[u8]) -> Result<StatusCode, ParseError> {
    let line = strip_cr(line);
    let mut parts = line.splitn(3, |&b| b == b' ');

    let protocol = parts.next().unwrap_or_default();
    if !protocol.starts_with(b"HTTP/") {
        return Err(ParseErrorKind::InvalidProtocol.into());
    }

    let code = match parts.next() {
        Some(code) if !code.is_empty() => code,
        _ => return Err(ParseErrorKind::MissingStatusCode.into()),
    };
    StatusCode::from_bytes(code).map_err(|_| ParseErrorKind::InvalidStatusCode.into())
}

/// Parse a `name: value` header (or trailer) line. A line without a `:`
/// (such as an obs-fold continuation) does not affect framing.
pub fn parse_header_line(line: &[u8]) -> Result<HeaderField, ParseError> {
    let line = strip_cr(line);
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        return Ok(HeaderField::Other);
    };
    let name = line[..colon].trim_ascii();
    let value = line[colon + 1..].trim_ascii();

    if name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str().as_bytes()) {
        let length = std::str::from_utf8(value)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or(ParseErrorKind::InvalidContentLength)?;
        return Ok(HeaderField::ContentLength(length));
    }

    if name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str().as_bytes())
        && value.to_ascii_lowercase().windows(7).any(|w| w == b"chunked")
    {
        return Ok(HeaderField::Chunked);
    }

    Ok(HeaderField::Other)
}

/// Parse a chunk-size line: hex size, optionally followed by `;extensions`.
pub fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let line = strip_cr(line);
    let size = match line.iter().position(|&b| b == b';') {
        Some(semi) => &line[..semi],
        None => line,
    };
    std::str::from_utf8(size.trim_ascii())
        .ok()
        .filter(|s| !s.is_empty())
        .and_then(|s| u64::from_str_radix(s, 16).ok())
        .ok_or_else(|| ParseErrorKind::InvalidChunkSize.into())
}
