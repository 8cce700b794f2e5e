//! Operator CLI harness for the swarm coordination core.
//!
//! The actual engine lives in `swarm-common` (domain types) and
//! `swarm-runtime` (transport, channels, router, state, spawner,
//! lifecycle controller). This crate is a thin harness: layered config,
//! a roster loader, and a `clap`-derived binary that drives one
//! `LifecycleController` run end to end.

pub mod config;
pub mod errors;
pub mod roster;
