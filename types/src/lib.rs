//! Core framing types for sieve.
//!
//! This crate contains the pure part of the sanitizer: no IO, no async.
//! [`locate_header`] finds `Content-Length` headers in a byte buffer,
//! [`Sanitizer`] drives it across an arbitrarily chunked stream, and
//! [`MessageAssembler`] joins the resulting segments into whole messages.

pub mod frame;

mod assembler;
mod display;
mod sanitizer;

pub use assembler::MessageAssembler;
pub use display::noise_text;
pub use frame::{FrameHeader, HEADER_PREFIX, HEADER_SEPARATOR, locate_header};
pub use sanitizer::{Emitted, Leftover, Sanitizer};
