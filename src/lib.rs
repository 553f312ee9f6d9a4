//! Health monitor for DNS seeders, websites and a node's chain tip.
//!
//! A self-paced poll loop ([`engine::Monitor`]) probes every endpoint,
//! publishes a [`models::StatusSnapshot`] and feeds it through a debouncing
//! [`tracker::StateTracker`]; confirmed transitions are posted to chat by the
//! [`messaging`] client, which also answers a few commands. The latest
//! snapshot is served as JSON by [`api`].

pub mod api;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod models;
pub mod probes;
pub mod rpc;
pub mod snapshot;
pub mod tracker;
pub mod utils;
