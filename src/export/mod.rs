//! Output side of a conversion: resource files on disk and the rewritten document.

pub mod resources;
pub mod rewrite;
