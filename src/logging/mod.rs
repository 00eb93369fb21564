//! Structured JSON logging for the pipeline.

mod format;

pub use format::StructuredLogger;
