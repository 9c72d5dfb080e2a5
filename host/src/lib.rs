//! Solvex inspection host: polls inspection data on an interval, keeps the
//! last and second-to-last readings, and serves dashboard view-state as JSON.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod logging;
pub mod poller;
pub mod server;
pub mod snapshot;
pub mod source;
pub mod view;
