//! Storage implementations
//!
//! - `pod/` - Solid Pod storage over any `PodFetch` transport

pub mod pod;
