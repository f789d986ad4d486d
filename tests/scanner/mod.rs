//! Integration tests for the scan pipeline.
//!
//! Categories:
//! 1. Discovery - path resolution, exclusions, deduplication
//! 2. Lifecycle - per-file dispositions and end-to-end verdicts
//! 3. Bridge - engine behavior with a live (fake) parser subprocess

mod bridge;
mod discovery;
mod lifecycle;
