// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Per-app SSL operations: issue, remove, force and unforce.

use crate::certbot::{Certbot, Rejected};
use crate::command::CommandRunner;
use crate::config::{Config, Paths};
use crate::domain::DomainSet;
use crate::error::{Error, Result};
use crate::fs::validate_name;
use crate::inventory::find_apps;
use crate::lock::AppLock;
use crate::service::{ensure_activated, LadderReport, ServiceController};
use crate::template::{TemplateData, Variant, VhostWriter};
use crate::vhost::{read_app_details, AppDetails};
use std::path::PathBuf;
use tracing::{info, warn};

/// Result of [`SslManager::get_cert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// No domain passed the dry run; nothing was changed.
    NotAvailable { rejected: Vec<Rejected> },
    /// A certificate was issued and the SSL vhost is live.
    Activated {
        validated: Vec<String>,
        rejected: Vec<Rejected>,
        ladder: LadderReport,
    },
}

/// What is known about an app without touching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app: String,
    pub details: AppDetails,
    pub vhost: PathBuf,
    /// Live `fullchain.pem`, when the app has a certificate.
    pub certificate: Option<PathBuf>,
}

pub struct SslManager<'a> {
    config: &'a Config,
    paths: Paths,
    runner: &'a dyn CommandRunner,
}

impl<'a> SslManager<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            paths: config.paths(),
            runner,
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    fn certbot(&self) -> Certbot<'_> {
        Certbot::new(&self.config.certbot, &self.paths.ssl_root, self.runner)
    }

    fn service(&self) -> ServiceController<'_> {
        ServiceController::new(&self.config.service_manager, &self.config.service, self.runner)
    }

    fn writer(&self) -> VhostWriter<'_> {
        VhostWriter::new(&self.paths)
    }

    /// Details of a valid app. Fails unless its vhost exists and parses.
    fn valid_app(&self, app: &str) -> Result<AppDetails> {
        validate_name("app", app)?;
        read_app_details(&self.paths, app)
    }

    /// Lock a valid app, then read its details so they match what the lock protects.
    fn lock_app(&self, app: &str) -> Result<(AppLock, AppDetails)> {
        validate_name("app", app)?;
        let lock = AppLock::acquire(&self.paths, app)?;
        let details = read_app_details(&self.paths, app)?;
        Ok((lock, details))
    }

    fn require_certificate(&self, app: &str) -> Result<()> {
        if self.paths.has_certificate(app) {
            Ok(())
        } else {
            Err(Error::CertificateNotFound {
                app: app.to_string(),
            })
        }
    }

    fn template_data(&self, app: &str, user: &str, domains: &DomainSet) -> Result<TemplateData> {
        TemplateData::new(&self.paths, app, user, domains)
    }

    pub fn info(&self, app: &str) -> Result<AppInfo> {
        let details = self.valid_app(app)?;
        let certificate = self
            .paths
            .has_certificate(app)
            .then(|| self.paths.fullchain(app));
        Ok(AppInfo {
            app: app.to_string(),
            details,
            vhost: self.paths.vhost_conf(app),
            certificate,
        })
    }

    /// Issue (or renew) a certificate for every domain of `app` that passes a dry run,
    /// then switch the app to the SSL vhost.
    ///
    /// When neither reload nor restart brings nginx back, the previous vhost is
    /// restored and [`Error::FatalRecovery`] is returned regardless of whether
    /// the restore succeeded.
    pub fn get_cert(&self, app: &str) -> Result<IssueOutcome> {
        let (_lock, details) = self.lock_app(app)?;
        let conf = self.paths.vhost_conf(app);
        let backup = std::fs::read(&conf).map_err(|e| Error::ReadFile {
            path: conf.clone(),
            source: e,
        })?;

        let webroot = self.paths.webroot(&details.user, app);
        let partition = self
            .certbot()
            .partition_domains(&webroot, details.domains.as_slice())?;

        if partition.validated.is_empty() {
            info!(app = %app, "SSL not available for this app yet");
            return Ok(IssueOutcome::NotAvailable {
                rejected: partition.rejected,
            });
        }

        self.certbot()
            .issue(&webroot, app, &partition.validated)?;

        let secured = DomainSet::from(partition.validated.clone());
        let data = self.template_data(app, &details.user, &secured)?;
        self.writer().write_ssl(&data)?;

        let ladder = self.service().apply_with_rollback(&conf, &backup);
        ensure_activated(app, &ladder)?;

        info!(app = %app, domains = ?partition.validated, "SSL activated");
        Ok(IssueOutcome::Activated {
            validated: partition.validated,
            rejected: partition.rejected,
            ladder,
        })
    }

    /// Run [`get_cert`](Self::get_cert) for every app found, continuing past failures.
    pub fn get_cert_all(&self, user: Option<&str>) -> Result<Vec<(String, Result<IssueOutcome>)>> {
        let records = find_apps(&self.paths, user)?;
        Ok(records
            .into_iter()
            .map(|record| {
                let outcome = self.get_cert(&record.app);
                if let Err(e) = &outcome {
                    warn!(app = %record.app, error = %e, "Certificate request failed");
                }
                (record.app, outcome)
            })
            .collect())
    }

    /// Revoke the app's certificate and switch it back to the plain vhost.
    /// Nothing on disk changes when revocation fails.
    pub fn remove_cert(&self, app: &str) -> Result<()> {
        let (_lock, details) = self.lock_app(app)?;
        self.require_certificate(app)?;

        self.certbot()
            .revoke(app)
            .map_err(|e| Error::RevokeFailed {
                app: app.to_string(),
                reason: e.to_string(),
            })?;

        let data = self.template_data(app, &details.user, &details.domains)?;
        self.writer().write_plain(&data)?;
        self.service().reload_or_restart()?;

        info!(app = %app, "SSL certificate removed");
        Ok(())
    }

    /// Redirect all HTTP traffic of the app to HTTPS.
    pub fn force_ssl(&self, app: &str) -> Result<()> {
        let (_lock, details) = self.lock_app(app)?;
        self.require_certificate(app)?;

        let data = self.template_data(app, &details.user, &details.domains)?;
        self.writer().write_ssl_forced(&data)?;
        self.service().reload_or_restart()?;

        info!(app = %app, "HTTPS forced");
        Ok(())
    }

    /// Stop redirecting HTTP to HTTPS. Apps without a certificate fall back to the plain vhost.
    pub fn unforce_ssl(&self, app: &str) -> Result<Variant> {
        let (_lock, details) = self.lock_app(app)?;
        let variant = if self.paths.has_certificate(app) {
            Variant::Ssl
        } else {
            Variant::Plain
        };

        let data = self.template_data(app, &details.user, &details.domains)?;
        self.writer().write(variant, &data)?;
        self.service().reload_or_restart()?;

        info!(app = %app, ?variant, "HTTPS no longer forced");
        Ok(variant)
    }

    /// Write a plain vhost for an explicit user, app and comma-separated domain list.
    pub fn create_vhost(&self, user: &str, app: &str, domains: &str, reload: bool) -> Result<PathBuf> {
        validate_name("user", user)?;
        validate_name("app", app)?;
        let domains = DomainSet::parse(domains)?;

        let apps_dir = self.paths.apps_dir(user);
        if !apps_dir.is_dir() {
            return Err(Error::AccountNotFound(apps_dir));
        }

        let _lock = AppLock::acquire(&self.paths, app)?;
        let data = self.template_data(app, user, &domains)?;
        let path = self.writer().write_plain(&data)?;
        if reload {
            self.service().reload_or_restart()?;
        }
        Ok(path)
    }
}
