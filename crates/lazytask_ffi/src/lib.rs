//! Flutter-facing bindings for LazyTask core.

pub mod api;
