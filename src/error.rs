// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure categories used by callers that only care about the class of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Parse,
    ExternalProcess,
    Write,
    FatalRecovery,
    Other,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{domain} is not a valid domain.")]
    InvalidDomain { domain: String },

    #[error("You need to provide at least one valid domain name.")]
    NoDomains,

    #[error("Invalid {what} '{value}': {reason}")]
    InvalidName {
        what: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} has not been provided.")]
    MissingIdentifier(&'static str),

    #[error("App '{app}' belongs to '{owner}', not '{user}'")]
    OwnerMismatch {
        app: String,
        user: String,
        owner: String,
    },

    #[error("Accounts root {0} does not exist")]
    AccountsRootNotFound(PathBuf),

    #[error("Looks like you have provided an invalid SSH user: no apps directory at {0}")]
    AccountNotFound(PathBuf),

    #[error("Looks like you provided a wrong app name: {path} does not exist")]
    VhostNotFound { path: PathBuf },

    #[error("The app {app} does not have an active SSL certificate.")]
    CertificateNotFound { app: String },

    #[error("Failed to parse vhost config {path}: {reason}")]
    VhostParse { path: PathBuf, reason: String },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid path (non-UTF8): {0}")]
    InvalidPath(PathBuf),

    #[error("Command '{command}' not found.\n{hint}")]
    CommandNotFound { command: String, hint: String },

    #[error("Command failed: {command}\n{stderr}")]
    Command { command: String, stderr: String },

    #[error("Command '{command}' timed out after {seconds} seconds")]
    CommandTimeout { command: String, seconds: u64 },

    #[error("SSL certificate cannot be removed: {reason}")]
    RevokeFailed { app: String, reason: String },

    #[error("SSL activation failed for app {app}! {summary}")]
    FatalRecovery { app: String, summary: String },

    #[error("Template error in {template}: {reason}")]
    Template {
        template: &'static str,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("App {app} is being changed by another rwssl process")]
    AppBusy { app: String },

    #[error("{failed} of {total} app(s) failed: {apps}")]
    BatchFailed {
        failed: usize,
        total: usize,
        apps: String,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidDomain { .. }
            | Error::NoDomains
            | Error::InvalidName { .. }
            | Error::MissingIdentifier(_)
            | Error::OwnerMismatch { .. } => ErrorKind::Validation,
            Error::AccountsRootNotFound(_)
            | Error::AccountNotFound(_)
            | Error::VhostNotFound { .. }
            | Error::CertificateNotFound { .. } => ErrorKind::NotFound,
            Error::VhostParse { .. } => ErrorKind::Parse,
            Error::CommandNotFound { .. }
            | Error::Command { .. }
            | Error::CommandTimeout { .. }
            | Error::RevokeFailed { .. } => ErrorKind::ExternalProcess,
            Error::WriteFile { .. } | Error::CreateDir { .. } => ErrorKind::Write,
            Error::FatalRecovery { .. } => ErrorKind::FatalRecovery,
            Error::ReadFile { .. }
            | Error::ReadDir { .. }
            | Error::InvalidPath(_)
            | Error::Template { .. }
            | Error::Config(_)
            | Error::AppBusy { .. }
            | Error::BatchFailed { .. } => ErrorKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
