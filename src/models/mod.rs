//! Data models for the scan orchestrator.
//!
//! `bucket` and `object` mirror the metadata rows of the object store the
//! scanner reads from. `event`, `scan_result` and `summary` describe one
//! invocation: what triggered it, what happened to each object, and the
//! folded outcome returned to the caller.

pub mod bucket;
pub mod event;
pub mod object;
pub mod scan_result;
pub mod summary;
