//! # fincraft-error
//!
//! Unified error handling for fincraft.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., FileNotFound, NetworkFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent or Temporary)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use fincraft_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::FileNotFound, "file 'aapl.json' not found")
//!         .with_operation("tools::read_structured_file")
//!         .with_context("file_name", "aapl.json")
//!         .with_context("data_dir", "data"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, fincraft_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using fincraft Error
pub type Result<T> = std::result::Result<T, Error>;
