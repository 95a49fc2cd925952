//! Core domain + application logic for the marker bot.
//!
//! Chat, identity lookups and bookmark creation live behind ports (traits)
//! implemented in adapter crates; this crate holds the command grammar,
//! authorization rules, channel registry and the join/leave/marker workflows.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod markers;
pub mod membership;
pub mod messaging;
pub mod ports;
pub mod registry;
pub mod replies;
pub mod security;
pub mod settings;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use errors::{Error, Result};

pub const COMPONENT: domain::ComponentVersion = domain::ComponentVersion {
    name: "mkb-core",
    version: env!("CARGO_PKG_VERSION"),
};
