//! Multipart body decoding.
//!
//! Splits a boundary-delimited body into its parts. Parts that are themselves
//! `multipart/*` containers are decoded recursively and their children are
//! spliced into the same flat list, so callers never see nesting.

use std::io::{BufRead, Cursor};

use tracing::{debug, trace};

use crate::error::{ConvertError, Result};
use crate::model::part::{HeaderMap, RawPart};
use crate::parser::header::{read_header_block, trim_line_ending};
use crate::parser::transfer;

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    /// `--boundary`: another part follows.
    Next,
    /// `--boundary--`: last part of this level.
    Close,
}

/// Decode the multipart body read from `reader`, appending every leaf part to
/// `out` in document order.
///
/// `reader` must be positioned just after the header block that declared
/// `boundary`. Decoding stops at the closing delimiter; any epilogue after it
/// is left unread.
pub fn decode_multipart<R: BufRead + ?Sized>(
    reader: &mut R,
    boundary: &str,
    out: &mut Vec<RawPart>,
) -> Result<()> {
    decode_level(reader, boundary, 0, out)
}

fn decode_level<R: BufRead + ?Sized>(
    reader: &mut R,
    boundary: &str,
    depth: usize,
    out: &mut Vec<RawPart>,
) -> Result<()> {
    if boundary.is_empty() {
        return Err(ConvertError::MalformedMultipart(
            "empty boundary parameter".to_string(),
        ));
    }
    let delimiter = format!("--{boundary}").into_bytes();
    let mut line = Vec::new();

    // Preamble: everything before the first delimiter is ignored.
    loop {
        if next_line(reader, &mut line)? == 0 {
            return Err(ConvertError::MalformedMultipart(format!(
                "boundary {boundary:?} never found"
            )));
        }
        match classify(&line, &delimiter) {
            Some(Delimiter::Next) => break,
            Some(Delimiter::Close) => {
                debug!(boundary, "multipart section without parts");
                return Ok(());
            }
            None => {}
        }
    }

    loop {
        let headers = read_header_block(reader).map_err(|e| e.in_part(out.len()))?;

        let mut body = Vec::new();
        let closing = loop {
            if next_line(reader, &mut line)? == 0 {
                return Err(ConvertError::MalformedMultipart(format!(
                    "part {} ended before closing boundary {boundary:?}",
                    out.len()
                )));
            }
            if let Some(kind) = classify(&line, &delimiter) {
                break kind == Delimiter::Close;
            }
            body.extend_from_slice(&line);
        };

        // The line break before a delimiter belongs to the delimiter.
        let body_len = trim_line_ending(&body).len();
        body.truncate(body_len);

        push_part(headers, body, depth, out)?;

        if closing {
            return Ok(());
        }
    }
}

/// Append one decoded section to `out`, descending into nested containers.
fn push_part(
    headers: HeaderMap,
    body: Vec<u8>,
    depth: usize,
    out: &mut Vec<RawPart>,
) -> Result<()> {
    // An unparseable type is reported by whoever needs the type; here it
    // simply cannot be a container.
    let nested = headers
        .content_type()
        .ok()
        .flatten()
        .filter(|ct| ct.is_multipart());

    match nested {
        Some(ct) => {
            if depth + 1 >= MAX_DEPTH {
                return Err(ConvertError::MalformedMultipart(format!(
                    "multipart nesting deeper than {MAX_DEPTH} levels"
                )));
            }
            let boundary = ct.param("boundary").ok_or_else(|| {
                ConvertError::MalformedMultipart(format!(
                    "nested {} at part {} has no boundary",
                    ct.essence(),
                    out.len()
                ))
            })?;
            trace!(boundary, depth = depth + 1, "descending into nested multipart");
            decode_level(&mut Cursor::new(body), boundary, depth + 1, out)
        }
        None => {
            let part = finish_part(headers, body, out.len())?;
            out.push(part);
            Ok(())
        }
    }
}

/// Build a leaf [`RawPart`], undoing its `Content-Transfer-Encoding`.
pub(crate) fn finish_part(mut headers: HeaderMap, body: Vec<u8>, index: usize) -> Result<RawPart> {
    let body = transfer::decode_body(headers.get("content-transfer-encoding"), body)
        .map_err(|reason| ConvertError::MalformedMultipart(format!("part {index}: {reason}")))?;
    headers.remove("content-transfer-encoding");
    trace!(index, size = body.len(), "decoded part");
    Ok(RawPart { headers, body })
}

/// Read one line (including its line ending) into `line`.
fn next_line<R: BufRead + ?Sized>(reader: &mut R, line: &mut Vec<u8>) -> Result<usize> {
    line.clear();
    reader
        .read_until(b'\n', line)
        .map_err(|e| ConvertError::MalformedMultipart(format!("read error: {e}")))
}

/// Is `line` a delimiter for this boundary? Trailing whitespace is ignored.
fn classify(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    let rest = line[..end].strip_prefix(delimiter)?;
    match rest {
        b"" => Some(Delimiter::Next),
        b"--" => Some(Delimiter::Close),
        _ => None,
    }
}
