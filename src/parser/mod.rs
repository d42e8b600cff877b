//! MHTML decoding: stream clean-up, header blocks, media types, multipart
//! splitting and transfer decoding.

pub mod archive;
pub mod header;
pub mod media_type;
pub mod multipart;
pub mod stream;
pub mod transfer;
