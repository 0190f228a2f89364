// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! certbot invocations: per-domain dry runs, combined issuance and revocation.

use crate::command::CommandRunner;
use crate::error::Result;
use crate::fs::path_to_str;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A domain whose dry run failed, with certbot's explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub domain: String,
    pub reason: String,
}

/// Outcome of dry-running every candidate domain independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainPartition {
    pub validated: Vec<String>,
    pub rejected: Vec<Rejected>,
}

pub struct Certbot<'a> {
    program: &'a str,
    ssl_root: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> Certbot<'a> {
    pub fn new(program: &'a str, ssl_root: &Path, runner: &'a dyn CommandRunner) -> Self {
        Self {
            program,
            ssl_root: ssl_root.to_path_buf(),
            runner,
        }
    }

    pub fn dry_run_args(webroot: &Path, domain: &str) -> Result<Vec<String>> {
        Ok(vec![
            "certonly".into(),
            "--non-interactive".into(),
            "--dry-run".into(),
            "--webroot".into(),
            "-w".into(),
            path_to_str(webroot)?.into(),
            "--register-unsafely-without-email".into(),
            "--agree-tos".into(),
            "-d".into(),
            domain.into(),
        ])
    }

    pub fn issue_args(&self, webroot: &Path, app: &str, domains: &[String]) -> Result<Vec<String>> {
        let mut args: Vec<String> = vec![
            "certonly".into(),
            "--non-interactive".into(),
            "--agree-tos".into(),
            "--register-unsafely-without-email".into(),
            "--webroot".into(),
            "-w".into(),
            path_to_str(webroot)?.into(),
            "--cert-name".into(),
            app.into(),
            "--config-dir".into(),
            path_to_str(&self.ssl_root)?.into(),
        ];
        for domain in domains {
            args.push("-d".into());
            args.push(domain.clone());
        }
        Ok(args)
    }

    pub fn revoke_args(&self, app: &str) -> Result<Vec<String>> {
        Ok(vec![
            "--non-interactive".into(),
            "revoke".into(),
            "--config-dir".into(),
            path_to_str(&self.ssl_root)?.into(),
            "--cert-name".into(),
            app.into(),
        ])
    }

    /// Dry-run issuance for each domain on its own. A failure only drops that
    /// domain; errors spawning certbot at all still propagate.
    pub fn partition_domains(&self, webroot: &Path, domains: &[String]) -> Result<DomainPartition> {
        let mut partition = DomainPartition::default();

        for domain in domains {
            let args = Self::dry_run_args(webroot, domain)?;
            match self.runner.run(self.program, &args)?.check(self.program, &args) {
                Ok(_) => {
                    debug!(domain = %domain, "Dry run succeeded");
                    partition.validated.push(domain.clone());
                }
                Err(e) => {
                    warn!(domain = %domain, error = %e, "Dry run failed, skipping domain");
                    partition.rejected.push(Rejected {
                        domain: domain.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(partition)
    }

    /// Request one certificate named `app` covering all `domains`.
    pub fn issue(&self, webroot: &Path, app: &str, domains: &[String]) -> Result<()> {
        let args = self.issue_args(webroot, app, domains)?;
        info!(app = %app, domains = ?domains, "Requesting certificate");
        self.runner.run(self.program, &args)?.check(self.program, &args)?;
        Ok(())
    }

    pub fn revoke(&self, app: &str) -> Result<()> {
        let args = self.revoke_args(app)?;
        info!(app = %app, "Revoking certificate");
        self.runner.run(self.program, &args)?.check(self.program, &args)?;
        Ok(())
    }
}
