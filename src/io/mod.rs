//! Buffered IO.
//!
//! - [`LineReader`] line oriented reader over an [`AsyncRead`] source
//!
//! [`AsyncRead`]: tokio::io::AsyncRead
mod reader;

pub use reader::LineReader;
