//! SDK Utilities
//!
//! Common utilities for the SDK.

mod deadline;
mod time;

pub use deadline::within;
pub use time::{elapsed_since, now_utc};
