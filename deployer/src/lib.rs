//! Fractal generator deployer library.
//!
//! This crate deploys the fractal generator web application onto a single
//! host: it backs up and replaces the application, its systemd unit and the
//! nginx configuration, installs the Python dependencies, activates the
//! services and smoke-tests the result over HTTP. It is used by the
//! `fractal-deploy` CLI binary and can be driven programmatically for testing.
//!
//! # Modules
//!
//! - [`backup`] - Timestamped backups of files about to be replaced
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Deployment layout and TOML configuration loading
//! - [`deps`] - Command execution and package installation
//! - [`error`] - Fatal error types
//! - [`logging`] - Log file and console subscriber setup
//! - [`manifest`] - The fixed set of files to deploy and where they go
//! - [`output`] - Summary and dry-run rendering
//! - [`pipeline`] - Deployment step orchestration
//! - [`probe`] - HTTP smoke-test probes
//! - [`prompt`] - Operator confirmation
//! - [`report`] - Step records, the deployment result and the receipt
//! - [`service`] - Service manager and web-server activation
//! - [`stager`] - File placement and static asset sweep

pub mod backup;
pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod prompt;
pub mod report;
pub mod service;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
