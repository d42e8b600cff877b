//! Streaming byte filters applied before any header parsing.
//!
//! Some archivers write stray blank lines before the first header, and some
//! emit the classic multipart preamble sentence in places a strict header
//! parser chokes on. Both are removed here without buffering the file.

use std::io::{self, Read};

/// The boilerplate sentence MIME writers put ahead of the first boundary.
pub const MIME_PREAMBLE: &str = "This is a multi-part message in MIME format.";

/// Size of the chunks pulled from the inner reader by [`StripPreamble`].
const CHUNK_SIZE: usize = 8 * 1024;

/// Drops leading Unicode whitespace from the start of a stream, once.
///
/// The trim is applied to the first read that yields data. Reads that
/// return nothing, or whose data was entirely whitespace, keep the trim
/// armed for the next chunk.
pub struct TrimLeading<R> {
    inner: R,
    trimmed: bool,
}

impl<R: Read> TrimLeading<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            trimmed: false,
        }
    }
}

impl<R: Read> Read for TrimLeading<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if self.trimmed || n == 0 {
                return Ok(n);
            }

            let skip = leading_whitespace_len(&buf[..n]);
            if skip == n {
                // Whole chunk was whitespace: returning 0 here would read as EOF.
                continue;
            }
            self.trimmed = true;
            buf.copy_within(skip..n, 0);
            return Ok(n - skip);
        }
    }
}

/// Number of bytes of leading whitespace in `bytes`, counting whole
/// UTF-8 characters only.
fn leading_whitespace_len(bytes: &[u8]) -> usize {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        // Only the valid prefix can be inspected; this is safe to slice.
        Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    };
    text.len() - text.trim_start().len()
}

/// Removes every occurrence of a fixed marker from a stream.
///
/// At most `marker.len() - 1` bytes are held back between reads, so a marker
/// split across two chunks of the inner reader is still found.
pub struct StripPreamble<R> {
    inner: R,
    marker: Vec<u8>,
    pending: Vec<u8>,
    ready: Vec<u8>,
    ready_pos: usize,
    eof: bool,
}

impl<R: Read> StripPreamble<R> {
    /// Strip the standard [`MIME_PREAMBLE`] sentence.
    pub fn new(inner: R) -> Self {
        Self::with_marker(inner, MIME_PREAMBLE)
    }

    pub fn with_marker(inner: R, marker: &str) -> Self {
        Self {
            inner,
            marker: marker.as_bytes().to_vec(),
            pending: Vec::new(),
            ready: Vec::new(),
            ready_pos: 0,
            eof: false,
        }
    }

    /// Move everything in `pending` that can no longer be part of a marker
    /// into `ready`, dropping complete markers on the way.
    fn drain_pending(&mut self) {
        self.ready.clear();
        self.ready_pos = 0;

        let mut start = 0;
        while let Some(pos) = find(&self.pending[start..], &self.marker) {
            self.ready
                .extend_from_slice(&self.pending[start..start + pos]);
            start += pos + self.marker.len();
        }

        let keep = if self.eof {
            0
        } else {
            self.marker.len().saturating_sub(1)
        };
        let release_to = self.pending.len().saturating_sub(keep).max(start);
        self.ready.extend_from_slice(&self.pending[start..release_to]);
        self.pending.drain(..release_to);
    }
}

impl<R: Read> Read for StripPreamble<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.marker.is_empty() {
            return self.inner.read(buf);
        }
        loop {
            if self.ready_pos < self.ready.len() {
                let n = buf.len().min(self.ready.len() - self.ready_pos);
                buf[..n].copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + n]);
                self.ready_pos += n;
                return Ok(n);
            }
            if self.eof && self.pending.is_empty() {
                return Ok(0);
            }

            let mut chunk = [0u8; CHUNK_SIZE];
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&chunk[..n]);
            }
            self.drain_pending();
        }
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out its data in fixed-size pieces, with an optional
    /// empty read up front.
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        empty_first: bool,
    }

    impl Chunked {
        fn new(data: &[u8], chunk: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                chunk,
                empty_first: false,
            }
        }
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.empty_first {
                self.empty_first = false;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "spurious"));
            }
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn read_all(mut r: impl Read) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_trim_leading_blank_lines() {
        let out = read_all(TrimLeading::new(&b"\r\n\n  \tMIME-Version: 1.0\n"[..]));
        assert_eq!(out, b"MIME-Version: 1.0\n");
    }

    #[test]
    fn test_trim_only_at_start() {
        let out = read_all(TrimLeading::new(Chunked::new(b"  a\n  b\n", 3)));
        assert_eq!(out, b"a\n  b\n");
    }

    #[test]
    fn test_trim_spans_whitespace_only_chunks() {
        let out = read_all(TrimLeading::new(Chunked::new(b"\n\n\n\n\n\nHeader: x\n", 2)));
        assert_eq!(out, b"Header: x\n");
    }

    #[test]
    fn test_trim_survives_interrupted_first_read() {
        let mut src = Chunked::new(b"\n\nA: b\n", 64);
        src.empty_first = true;
        let out = read_all(TrimLeading::new(src));
        assert_eq!(out, b"A: b\n");
    }

    #[test]
    fn test_trim_unicode_whitespace() {
        let input = "\u{feff}".to_string(); // BOM is not whitespace
        let out = read_all(TrimLeading::new(input.as_bytes()));
        assert_eq!(out, input.as_bytes());

        let input = "\u{a0}\u{2003}X";
        let out = read_all(TrimLeading::new(input.as_bytes()));
        assert_eq!(out, b"X");
    }

    #[test]
    fn test_trim_is_idempotent() {
        let once = read_all(TrimLeading::new(&b"\n \nFrom: a\n\nbody"[..]));
        let twice = read_all(TrimLeading::new(&once[..]));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_trim_all_whitespace_is_empty() {
        let out = read_all(TrimLeading::new(&b" \n\t "[..]));
        assert!(out.is_empty());
    }

    #[test]
    fn test_strip_preamble() {
        let input = format!("A: b\n\n{MIME_PREAMBLE}\n--x\n");
        let out = read_all(StripPreamble::new(input.as_bytes()));
        assert_eq!(out, b"A: b\n\n\n--x\n");
    }

    #[test]
    fn test_strip_marker_across_chunks() {
        let input = format!("pre{MIME_PREAMBLE}mid{MIME_PREAMBLE}post");
        for chunk in [1, 3, 7, 40, 4096] {
            let out = read_all(StripPreamble::new(Chunked::new(input.as_bytes(), chunk)));
            assert_eq!(out, b"premidpost", "chunk size {chunk}");
        }
    }

    #[test]
    fn test_strip_keeps_partial_marker_at_eof() {
        let out = read_all(StripPreamble::new(&b"tail: This is a multi"[..]));
        assert_eq!(out, b"tail: This is a multi");
    }

    #[test]
    fn test_strip_then_trim() {
        let input = format!("{MIME_PREAMBLE}\r\n\r\nMIME-Version: 1.0\r\n");
        let out = read_all(TrimLeading::new(StripPreamble::new(input.as_bytes())));
        assert_eq!(out, b"MIME-Version: 1.0\r\n");
    }
}
