//! Error Handling Module
//!
//! A single error taxonomy for the instrumentation layer. Errors raised by the
//! wrapped provider call are never converted into `RapidaError`; they travel
//! through the interceptors untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use rapida::error::RapidaError;
//!
//! let error = RapidaError::api_error(404, "Not found");
//! assert!(error.is_client_error());
//! ```

mod conversions;
pub mod types;

pub use types::*;
