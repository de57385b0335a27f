//! Flutter-facing bindings for the journal import core.

pub mod api;
