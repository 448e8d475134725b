//! Correlation
//!
//! The join between an outbound request and the response metadata observed
//! for it later. A [`CorrelationId`] is minted per call and travels on the
//! request under [`RAPIDA_REQUEST_ID`](crate::headers::RAPIDA_REQUEST_ID); the
//! response hook files the response's [`ResponseMetadata`] under that id in a
//! [`CorrelationStore`], where the result correlator picks it up.

mod id;
mod response;
mod store;

pub use id::CorrelationId;
pub use response::{RAPIDA_FIELD, RateLimitSnapshot, ResponseMetadata};
pub use store::{CorrelationStore, EvictionPolicy, StoreStats};
