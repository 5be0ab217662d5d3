//! Permea Core — domain models and the permission resolution engine.
//!
//! This crate provides:
//! - Domain models ([`models`]): permissions, groups, users, history
//!   entries and resolution traces
//! - Error types ([`error`])
//! - Store trait definitions ([`store`], [`history`]) implemented by the
//!   in-process (`permea-mem`) and durable (`permea-db`) backends
//! - The resolution engine ([`resolve`]) and integrity checker
//!   ([`integrity`])
//! - The repository facade ([`service::PermissionsService`]) composing
//!   all of the above behind a single entry point

pub mod error;
pub mod history;
pub mod integrity;
pub mod models;
pub mod resolve;
pub mod service;
pub mod store;
