//! Platform-agnostic connectivity logic for the potty tracker
//!
//! This crate contains everything between the buttons and the network that
//! does not touch hardware:
//!
//! - **`supervisor`**: link state machine with capped exponential backoff
//! - **`time_sync`**: two-phase wall-clock sync with US DST correction
//! - **`dispatcher`**: outbound bot, voice, webhook and NotifyMe notifications
//! - **`poller`**: inbound bot commands with offset tracking and a reply gate
//! - **`service`**: the `Connectivity` context that ties them to one tick
//!
//! Hardware is reached only through the `potty-hal` traits, so the whole
//! crate runs under `cargo test` on the host.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod calendar;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod encode;
pub mod error;
pub mod http;
pub mod mono;
pub mod policy;
pub mod poller;
pub mod report;
pub mod scanner;
pub mod service;
pub mod supervisor;
pub mod time_sync;

#[cfg(test)]
mod testing;

pub use command::Command;
pub use config::Config;
pub use dispatcher::NotificationDispatcher;
pub use error::{NotifyError, TimeSyncError};
pub use poller::{CommandHandler, CommandPoller};
pub use report::{TimeKeeper, TimerBank, TimerKind};
pub use service::{AlertReport, Connectivity};
pub use supervisor::{ConnectionSupervisor, LinkEvent, LinkState};
pub use time_sync::TimeSyncService;
