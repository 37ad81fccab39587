//! Core domain + application logic for the domain expiry watch bot.
//!
//! This crate is framework-agnostic. Telegram and the WHOIS backends live
//! behind ports (traits) implemented in adapter crates.

pub mod batch;
pub mod checker;
pub mod config;
pub mod digest;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod repository;
pub mod scheduler;
pub mod subscribers;

pub use errors::{Error, Result};

#[cfg(test)]
pub(crate) mod testing;
