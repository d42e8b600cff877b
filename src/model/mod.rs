//! Core data model types for decoded MHTML parts.

pub mod part;
