//! Flutter-facing bindings for the book search core.

pub mod api;
