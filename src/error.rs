//! Centralized error types for mhtml2pdf.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mhtml2pdf library.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The input archive could not be opened or read.
    #[error("cannot read '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A top-level or part header block is malformed.
    ///
    /// `line` counts from the start of the header block; `part` is set when
    /// the block belongs to a part rather than the top-level message.
    #[error("{}header parse error at line {line}: {reason}", part_prefix(.part))]
    HeaderParse {
        part: Option<usize>,
        line: usize,
        reason: String,
    },

    /// The boundary structure of a multipart body is inconsistent.
    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),

    /// A part (or the top-level message) has no usable `Content-Type`.
    #[error("{}", missing_content_type_message(.index))]
    MissingContentType { index: Option<usize> },

    /// A `Content-Type` value is not a valid media type.
    #[error("{}invalid media type '{value}': {reason}", part_prefix(.part))]
    MediaTypeParse {
        part: Option<usize>,
        value: String,
        reason: String,
    },

    /// No `text/html` part was found in the archive.
    #[error("html not found")]
    HtmlNotFound,

    /// Creating a directory or writing a file failed.
    #[error("cannot write '{path}': {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The external renderer failed.
    #[error("render failed: {0}")]
    Render(String),

    /// Any of the above, tagged with the input archive it happened in.
    #[error("convert {path} failed: {source}")]
    WithFile {
        path: PathBuf,
        source: Box<ConvertError>,
    },
}

fn missing_content_type_message(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("part {i} has no Content-Type"),
        None => "message has no Content-Type".to_string(),
    }
}

fn part_prefix(part: &Option<usize>) -> String {
    match part {
        Some(i) => format!("part {i}: "),
        None => String::new(),
    }
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create a `Persistence` variant from a path and an `io::Error`.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Attach the input file this error occurred in.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            already @ Self::WithFile { .. } => already,
            other => Self::WithFile {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Record which part a header or media-type error came from.
    ///
    /// Other errors, and errors already tagged with a part, pass through.
    pub fn in_part(self, index: usize) -> Self {
        match self {
            Self::HeaderParse {
                part: None,
                line,
                reason,
            } => Self::HeaderParse {
                part: Some(index),
                line,
                reason,
            },
            Self::MediaTypeParse {
                part: None,
                value,
                reason,
            } => Self::MediaTypeParse {
                part: Some(index),
                value,
                reason,
            },
            other => other,
        }
    }

    /// The underlying error, with any file tag removed.
    pub fn root(&self) -> &ConvertError {
        match self {
            Self::WithFile { source, .. } => source.root(),
            other => other,
        }
    }
}
