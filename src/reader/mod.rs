//! XML Reader Module
//!
//! - SliceReader: zero-copy reader over a `&str` that yields a
//!   well-formed event stream
//! - Events: XML event types for pull parsing

pub mod events;
pub mod slice;

pub use events::{EndElement, StartElement, XmlEvent};
pub use slice::SliceReader;
