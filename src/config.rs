// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::fs::validate_name;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current config file version. Increment when making breaking changes.
const CONFIG_VERSION: u32 = 1;

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "RWSSL_CONFIG";

/// System-wide config location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/rwssl/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Config file version for future migration support
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    /// Directory holding one home directory per SSH account
    #[serde(default = "default_users_root")]
    pub users_root: PathBuf,
    /// nginx-sp virtual host directory
    #[serde(default = "default_vhosts_dir")]
    pub vhosts_dir: PathBuf,
    /// certbot `--config-dir`, also where live certificates end up
    #[serde(default = "default_ssl_root")]
    pub ssl_root: PathBuf,
    /// Service unit reloaded after a vhost change
    #[serde(default = "default_service")]
    pub service: String,
    /// Program used to reload/restart `service`
    #[serde(default = "default_service_manager")]
    pub service_manager: String,
    #[serde(default = "default_certbot")]
    pub certbot: String,
    /// Kill external commands after this many seconds (0 waits forever)
    #[serde(default)]
    pub command_timeout_secs: u64,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// pretty, compact or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_users_root() -> PathBuf {
    PathBuf::from("/srv/users")
}

fn default_vhosts_dir() -> PathBuf {
    PathBuf::from("/etc/nginx-sp/vhosts.d")
}

fn default_ssl_root() -> PathBuf {
    PathBuf::from("/etc/nginx-sp/le-ssls")
}

fn default_service() -> String {
    "nginx-sp".into()
}

fn default_service_manager() -> String {
    "systemctl".into()
}

fn default_certbot() -> String {
    "certbot".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            users_root: default_users_root(),
            vhosts_dir: default_vhosts_dir(),
            ssl_root: default_ssl_root(),
            service: default_service(),
            service_manager: default_service_manager(),
            certbot: default_certbot(),
            command_timeout_secs: 0,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Find the config file to use: explicit path, `RWSSL_CONFIG`,
    /// `/etc/rwssl/config.toml`, then the per-user config directory.
    /// Returns `None` when no candidate exists and defaults should apply.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = requested_path(explicit) {
            return Some(path);
        }
        let system = PathBuf::from(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Some(system);
        }
        ProjectDirs::from("", "", "rwssl")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists())
    }

    /// Load config from `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = if path.exists() {
            let content = crate::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load the located config, or defaults when none exists.
    ///
    /// A path given with `--config` or `RWSSL_CONFIG` must exist.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = requested_path(explicit) {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Self::load(&path);
        }
        match Self::locate(None) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.config_version > CONFIG_VERSION {
            tracing::warn!(
                version = self.config_version,
                supported = CONFIG_VERSION,
                "Config version is newer than supported, some settings may be ignored"
            );
        }

        for (name, path) in [
            ("users_root", &self.users_root),
            ("vhosts_dir", &self.vhosts_dir),
            ("ssl_root", &self.ssl_root),
        ] {
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "{} must be an absolute path, got: {}",
                    name,
                    path.display()
                )));
            }
        }

        for (name, value) in [
            ("service_manager", &self.service_manager),
            ("certbot", &self.certbot),
        ] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(Error::Config(format!(
                    "{} must be a single program name or path, got: '{}'",
                    name, value
                )));
            }
        }

        validate_name("service", &self.service)
            .map_err(|e| Error::Config(format!("service: {}", e)))?;

        match self.log.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => {
                return Err(Error::Config(format!(
                    "log.format must be one of pretty, compact, json; got '{}'",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn paths(&self) -> Paths {
        Paths {
            users_root: self.users_root.clone(),
            vhosts_dir: self.vhosts_dir.clone(),
            ssl_root: self.ssl_root.clone(),
        }
    }
}

/// Config path asked for explicitly, by argument or environment.
fn requested_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    std::env::var(CONFIG_ENV)
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Filesystem layout of a ServerPilot-style host.
#[derive(Debug, Clone)]
pub struct Paths {
    pub users_root: PathBuf,
    pub vhosts_dir: PathBuf,
    pub ssl_root: PathBuf,
}

impl Paths {
    pub fn user_home(&self, user: &str) -> PathBuf {
        self.users_root.join(user)
    }

    pub fn apps_dir(&self, user: &str) -> PathBuf {
        self.user_home(user).join("apps")
    }

    pub fn app_dir(&self, user: &str, app: &str) -> PathBuf {
        self.apps_dir(user).join(app)
    }

    /// Public web root used for webroot validation.
    pub fn webroot(&self, user: &str, app: &str) -> PathBuf {
        self.app_dir(user, app).join("public")
    }

    pub fn vhost_conf(&self, app: &str) -> PathBuf {
        self.vhosts_dir.join(format!("{}.conf", app))
    }

    /// Per-app include directory (`<app>.d`).
    pub fn vhost_include_dir(&self, app: &str) -> PathBuf {
        self.vhosts_dir.join(format!("{}.d", app))
    }

    pub fn vhost_main_conf(&self, app: &str) -> PathBuf {
        self.vhost_include_dir(app).join("main.conf")
    }

    /// Advisory lock file for changes to `app`; never matches the `*.conf` include.
    pub fn lock_file(&self, app: &str) -> PathBuf {
        self.vhosts_dir.join(format!(".{}.rwssl-lock", app))
    }

    pub fn live_cert_dir(&self, app: &str) -> PathBuf {
        self.ssl_root.join("live").join(app)
    }

    pub fn fullchain(&self, app: &str) -> PathBuf {
        self.live_cert_dir(app).join("fullchain.pem")
    }

    pub fn has_certificate(&self, app: &str) -> bool {
        self.fullchain(app).exists()
    }
}
