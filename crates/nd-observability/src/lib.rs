// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # nd-observability
//!
//! Logging setup shared by the ndcomponents crates and tools, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log files with daily rotation under a per-run folder

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

// Re-export commonly used items
pub use cli::*;
pub use config::*;
pub use init::*;

/// Known crate names (log targets) for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "nd-kernel",
    "nd-config",
    "nd-observability",
    "ndcomponents",
    "rotn_demo",
];
