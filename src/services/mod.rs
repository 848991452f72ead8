//! Scan orchestration services, leaves first: key sanitizing, workspaces,
//! the scanner adapter, the object store and fetcher, then the single-object
//! pipeline, the batch driver and the invocation entry point.

pub mod batch;
pub mod fetcher;
pub mod invoker;
pub mod object_store;
pub mod pipeline;
pub mod sanitizer;
pub mod scanner;
pub mod sqlite_store;
pub mod workspace;

#[cfg(test)]
pub mod testing;
