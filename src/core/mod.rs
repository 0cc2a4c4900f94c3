//! Low-level XML primitives
//!
//! - scanner: memchr-based delimiter search and XML character classes
//! - tokenizer: markup tokens with byte spans
//! - entities: reference decoding and escaping, borrowing when nothing changes
//! - attributes: attribute lists with their original quote and raw value

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod tokenizer;
