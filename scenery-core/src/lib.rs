//! Scenery Core
//!
//! Core types shared by the Scenery render pipeline.
//!
//! This crate contains:
//! - Job configuration: quality tiers and per-render settings
//! - Results: the single terminal record produced by every render job
//! - Diagnostics: structured interpretation of a failed job's stderr

pub mod domain;
