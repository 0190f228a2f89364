// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Per-app advisory lock held while an app's vhost is being changed.

use crate::config::Paths;
use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tracing::debug;

/// Exclusive lock on one app. Released when dropped.
#[derive(Debug)]
pub struct AppLock {
    file: File,
    path: PathBuf,
}

impl AppLock {
    /// Take the app's lock without blocking.
    ///
    /// # Errors
    /// [`Error::AppBusy`] when another rwssl process holds it.
    pub fn acquire(paths: &Paths, app: &str) -> Result<Self> {
        let path = paths.lock_file(app);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(app = %app, lock = %path.display(), "Acquired app lock");
                Ok(AppLock { file, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(Error::AppBusy {
                app: app.to_string(),
            }),
            Err(e) => Err(Error::WriteFile { path, source: e }),
        }
    }
}

impl Drop for AppLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(lock = %self.path.display(), error = %e, "Failed to release app lock");
        }
    }
}
