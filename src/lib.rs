//! Scene Timeline: timing synchronization and quality gates for narrated video.
//!
//! Allocates wall-clock time per scene, fits narration into each scene's
//! budget under bounded speaking rates, builds time-aligned captions, drives
//! bounded capture retries, and evaluates the gates that decide whether a
//! rendered version may be promoted.

pub mod core;
pub mod schema;
