//! Profile-driven machine provisioning engine.
//!
//! Resolves a declarative profile (with inheritance) from `conf/profiles.d/`,
//! enables its package repositories, installs its packages with the backend
//! for the detected OS, then runs its shell modules from `conf/modules.d/`
//! in priority order.
//!
//! The public API is organised into these layers:
//!
//! - **[`exec`]**: the process runner every backend shells out through
//! - **[`platform`]**: `os-release` parsing into a typed OS identity
//! - **[`config`]**: repository layout, settings and profile resolution
//! - **[`backends`]**: package and repository backends per OS family
//! - **[`modules`]**: module discovery, ordering and execution
//! - **[`orchestrator`]**: the end-to-end provisioning sequence
//! - **[`commands`]**: subcommand handlers behind the CLI
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod backends;
pub mod cli;
pub mod commands;
pub mod config;
pub mod environment;
pub mod error;
pub mod exec;
pub mod logging;
pub mod modules;
pub mod orchestrator;
pub mod platform;
