//! Whole-archive decoding: raw MHTML bytes in, flat list of parts out.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::model::part::RawPart;
use crate::parser::header::read_header_block;
use crate::parser::multipart::{decode_multipart, finish_part};
use crate::parser::stream::{StripPreamble, TrimLeading};

/// Size of the buffered reader wrapped around the input file.
const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Open and decode an MHTML file from disk.
pub fn decode_file(path: &Path) -> Result<Vec<RawPart>> {
    let file = File::open(path).map_err(|source| ConvertError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;
    decode_archive(file)
}

/// Decode an MHTML byte stream into its parts, in document order.
///
/// The stream is cleaned up first (preamble sentence removed, leading
/// whitespace trimmed), then the top-level header block is read. A
/// `multipart/*` message is split on its boundary; anything else becomes a
/// single part carrying the top-level headers.
pub fn decode_archive<R: Read>(source: R) -> Result<Vec<RawPart>> {
    let cleaned = TrimLeading::new(StripPreamble::new(source));
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, cleaned);

    let headers = read_header_block(&mut reader)?;
    let content_type = headers
        .content_type()?
        .ok_or(ConvertError::MissingContentType { index: None })?;

    let mut parts = Vec::new();
    if content_type.is_multipart() {
        let boundary = content_type.param("boundary").ok_or_else(|| {
            ConvertError::MalformedMultipart(format!(
                "{} without boundary parameter",
                content_type.essence()
            ))
        })?;
        debug!(mime = content_type.essence(), boundary, "decoding multipart archive");
        decode_multipart(&mut reader, boundary, &mut parts)?;
    } else {
        debug!(mime = content_type.essence(), "single-part archive");
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| ConvertError::MalformedMultipart(format!("read error: {e}")))?;
        parts.push(finish_part(headers, body, 0)?);
    }

    debug!(parts = parts.len(), "archive decoded");
    Ok(parts)
}
