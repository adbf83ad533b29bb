//! Core domain types
//!
//! These types describe one render request and what came out of it. They are
//! shared between the runner (which produces them) and front ends such as the
//! CLI (which display them).

pub mod config;
pub mod diagnostic;
pub mod result;
