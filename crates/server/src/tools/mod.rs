//! MCP tool implementations.
//!
//! Every operation the page shell can drive on the worker lives here.

pub mod cache;
pub mod counter;
pub mod sync;
