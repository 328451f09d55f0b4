//! Client side of the receipt pipeline.
//!
//! Validates images locally, refuses to upload unless the relay answers its health
//! probe, and normalizes every failure into a [`pantry_core::PipelineError`].

pub mod backoff;
pub mod client;
pub mod source;

pub use backoff::{with_backoff, BackoffPolicy};
pub use client::{parse_items, ScanClient, DEFAULT_API_URL};
pub use source::{FileBlob, ImageSource};
