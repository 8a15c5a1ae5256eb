//! fleetgate - fleet controller for LLM inference backends
//!
//! Supervises backend processes, probes their health, balances requests across
//! the healthy ones and raises alerts from sampled metrics.

pub mod api;
pub mod cli;
pub mod config;
pub mod fleet;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod monitoring;
pub mod registry;
pub mod routing;
pub mod supervisor;
