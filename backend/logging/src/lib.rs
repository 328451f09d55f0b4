//! Structured logging for Pantry.
//!
//! Console output, optional NDJSON file rotation, and redaction of provider secrets.

pub mod logger;
pub mod redact;

pub use logger::init_logger;
pub use redact::redact_secrets;
