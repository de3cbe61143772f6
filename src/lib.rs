//! HTTP Intercepting Proxy Data Plane
//!
//! Moves message bytes between a client and a peer while framing bodies byte exact, and lets an
//! observer inspect every byte in flight without buffering the whole message.
//!
//! - [`relay()`] and [`Tunnel`] raw byte relay, for `CONNECT` tunnels and bodies delimited by
//!   connection close
//! - [`LineReader`] buffered line reader a connection keeps for its lifetime
//! - [`body`] fixed length and chunked body copy, chunked encoding
//! - [`Transfer`] observation hook and cancellation for any of the above
//!
//! Connection setup, header parsing, and the choice of [`Coding`] belong to the caller.
//!
//! [`Coding`]: body::Coding
#![warn(missing_debug_implementations)]

mod log;

pub mod config;
pub mod error;
pub mod io;
pub mod body;
pub mod relay;
pub mod transfer;

pub use config::Config;
pub use error::{Error, FramingError};
pub use io::LineReader;
pub use relay::{Tunnel, relay, tunnel};
pub use transfer::{Observer, Transfer};
