//! sift-core
//!
//! Engine-independent types for the search pipeline: the query descriptor a
//! caller sends, the field mapping used to validate aggregations, and the
//! response envelope handed back. No index engine types leak through here.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod query;
pub mod response;
pub mod traits;
pub mod types;
