//! Domain models for Permea.
//!
//! These are the core types shared across all crates.

pub mod access;
pub mod dependency;
pub mod group;
pub mod history;
pub mod permission;
pub mod trace;
pub mod user;
