//! Core domain + application logic for the relay bot's premium subsystem.
//!
//! This crate is framework-agnostic. Telegram and MongoDB live behind ports
//! (traits) implemented in adapter crates.

pub mod codes;
pub mod commands;
pub mod config;
pub mod domain;
pub mod duration;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod memory;
pub mod messaging;
pub mod ports;
pub mod purge;
pub mod redeem;
pub mod security;

pub use errors::{Error, Result};
