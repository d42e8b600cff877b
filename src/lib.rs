//! `mhtml2pdf`: turn saved web pages (MHTML/MHT archives) into PDF.
//!
//! The library decodes an archive into its MIME parts, writes every resource
//! next to the archive, points the HTML document at those local copies and
//! hands the result to a [`render::Renderer`] for printing.

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod render;
