//! Core traits for cdnranges
//!
//! - [`RangeSource`]: Retrieve a published IP range list

pub mod range_source;

pub use range_source::RangeSource;
