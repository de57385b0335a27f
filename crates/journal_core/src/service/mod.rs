//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate import components into use-case level APIs.
//! - Keep FFI layers decoupled from storage details.

pub mod import_service;
