//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate catalog and repository calls for a UI host.
//! - Keep UI/FFI layers decoupled from storage and transport details.

pub mod coordinator;
pub mod work_queue;
