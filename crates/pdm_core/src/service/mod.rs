//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and version resolution into use-case APIs.
//! - Keep CLI/RPC layers decoupled from storage details.

pub mod definition_service;
