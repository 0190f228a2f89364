// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Let's Encrypt certificates for ServerPilot-style nginx-sp apps.
//!
//! ```rust,no_run
//! use rwssl::{Config, IssueOutcome, SslManager, SystemRunner};
//!
//! let config = Config::discover(None)?;
//! let runner = SystemRunner::new(config.command_timeout_secs);
//! let manager = SslManager::new(&config, &runner);
//!
//! if let IssueOutcome::Activated { validated, .. } = manager.get_cert("blog")? {
//!     println!("secured {}", validated.join(" "));
//! }
//! # Ok::<(), rwssl::Error>(())
//! ```

/// certbot invocations.
pub mod certbot;
/// External command execution.
pub mod command;
/// Configuration handling.
pub mod config;
/// Domain validation.
pub mod domain;
/// Error types.
pub mod error;
/// Filesystem utilities.
pub mod fs;
/// Account and app discovery.
pub mod inventory;
/// Per-app locking.
pub mod lock;
/// Per-app SSL operations.
pub mod manager;
/// Service reload with fallbacks.
pub mod service;
/// Vhost templates.
pub mod template;
/// Vhost parsing.
pub mod vhost;

pub use certbot::{Certbot, DomainPartition, Rejected};
pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use config::{Config, LogConfig, Paths};
pub use domain::{is_valid_domain, DomainSet};
pub use error::{Error, ErrorKind, Result};
pub use fs::{atomic_write, path_to_str};
pub use inventory::{find_apps, resolve, AppRecord, AppRef};
pub use lock::AppLock;
pub use manager::{AppInfo, IssueOutcome, SslManager};
pub use service::{LadderReport, ServiceController, StepResult};
pub use template::{TemplateData, Value, Variant, VhostWriter};
pub use vhost::{read_app_details, AppDetails};
