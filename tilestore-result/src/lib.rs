//! Error types and result definitions for the tilestore array engine.
//!
//! This crate provides the unified error type ([`Error`]) and result type
//! alias ([`Result<T>`]) used throughout all tilestore crates. All operations
//! that could fail return `Result<T>`, so failures propagate naturally with
//! the `?` operator across crate boundaries.
//!
//! Buffer overflow during a read is deliberately NOT an error: it is a normal
//! suspension point reported through the read state and truncated buffer
//! sizes, and the next `read` call resumes where the previous one stopped.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
