//! Data models shared across crates
//!
//! Attachment records and queue state live in the upload crate; this module
//! holds what crosses a capability boundary (REST payloads, identifiers).

mod attachment;
mod task;

pub use attachment::*;
pub use task::*;
