// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Reload/restart of the proxy service and the fallback ladder around it.

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::fs::atomic_write;
use std::fmt;
use std::path::Path;
use tracing::{error, info, warn};

/// What happened at one rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Succeeded,
    Failed(String),
    NotAttempted,
}

impl StepResult {
    fn from_result(result: &Result<()>) -> Self {
        match result {
            Ok(()) => StepResult::Succeeded,
            Err(e) => StepResult::Failed(e.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, StepResult::Succeeded)
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Succeeded => write!(f, "ok"),
            StepResult::Failed(reason) => write!(f, "failed ({})", reason),
            StepResult::NotAttempted => write!(f, "skipped"),
        }
    }
}

/// Record of every step attempted to bring the service back after a vhost change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderReport {
    pub reload: StepResult,
    pub restart: StepResult,
    pub restore: StepResult,
    pub final_restart: StepResult,
}

impl LadderReport {
    /// The new configuration is live.
    pub fn activated(&self) -> bool {
        self.reload.succeeded() || self.restart.succeeded()
    }
}

impl fmt::Display for LadderReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reload: {}, restart: {}, restore backup: {}, restart after restore: {}",
            self.reload, self.restart, self.restore, self.final_restart
        )
    }
}

pub struct ServiceController<'a> {
    manager: &'a str,
    service: &'a str,
    runner: &'a dyn CommandRunner,
}

impl<'a> ServiceController<'a> {
    pub fn new(manager: &'a str, service: &'a str, runner: &'a dyn CommandRunner) -> Self {
        Self {
            manager,
            service,
            runner,
        }
    }

    fn control(&self, action: &str) -> Result<()> {
        let args = vec![action.to_string(), self.service.to_string()];
        self.runner
            .run(self.manager, &args)?
            .check(self.manager, &args)?;
        info!(service = %self.service, action, "Service control succeeded");
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        self.control("reload")
    }

    pub fn restart(&self) -> Result<()> {
        self.control("restart")
    }

    /// Reload, falling back to a restart. The restart error is returned when both fail.
    pub fn reload_or_restart(&self) -> Result<()> {
        match self.reload() {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(service = %self.service, error = %e, "Reload failed, restarting");
                self.restart()
            }
        }
    }

    /// Reload, then restart, then put `backup` back at `conf` and restart once more.
    /// Each rung is tried at most once.
    pub fn apply_with_rollback(&self, conf: &Path, backup: &[u8]) -> LadderReport {
        let mut report = LadderReport {
            reload: StepResult::NotAttempted,
            restart: StepResult::NotAttempted,
            restore: StepResult::NotAttempted,
            final_restart: StepResult::NotAttempted,
        };

        report.reload = StepResult::from_result(&self.reload());
        if report.reload.succeeded() {
            return report;
        }
        warn!(service = %self.service, result = %report.reload, "Reload failed, restarting");

        report.restart = StepResult::from_result(&self.restart());
        if report.restart.succeeded() {
            return report;
        }
        error!(
            service = %self.service,
            conf = %conf.display(),
            result = %report.restart,
            "Restart failed, restoring previous vhost"
        );

        report.restore = StepResult::from_result(&atomic_write(conf, backup));
        report.final_restart = StepResult::from_result(&self.restart());
        report
    }
}

/// Turn a ladder that did not activate the new config into [`Error::FatalRecovery`].
pub fn ensure_activated(app: &str, report: &LadderReport) -> Result<()> {
    if report.activated() {
        Ok(())
    } else {
        Err(Error::FatalRecovery {
            app: app.to_string(),
            summary: report.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::FakeRunner;

    #[test]
    fn test_reload_success_stops_ladder() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let conf = dir.path().join("a.conf");
        std::fs::write(&conf, "new").expect("write conf");

        let runner = FakeRunner::new();
        let controller = ServiceController::new("systemctl", "nginx-sp", &runner);
        let report = controller.apply_with_rollback(&conf, b"old");

        assert!(report.activated());
        assert_eq!(report.restart, StepResult::NotAttempted);
        assert_eq!(*runner.calls.borrow(), vec!["systemctl reload nginx-sp"]);
        assert_eq!(std::fs::read(&conf).expect("read conf"), b"new");
    }

    #[test]
    fn test_restart_fallback() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let conf = dir.path().join("a.conf");
        std::fs::write(&conf, "new").expect("write conf");

        let runner = FakeRunner::new().on("reload", &[false]);
        let controller = ServiceController::new("systemctl", "nginx-sp", &runner);
        let report = controller.apply_with_rollback(&conf, b"old");

        assert!(report.activated());
        assert!(matches!(report.reload, StepResult::Failed(_)));
        assert_eq!(report.restart, StepResult::Succeeded);
        assert_eq!(report.restore, StepResult::NotAttempted);
        assert!(ensure_activated("a", &report).is_ok());
    }

    #[test]
    fn test_restore_then_fatal_even_when_final_restart_succeeds() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let conf = dir.path().join("a.conf");
        std::fs::write(&conf, "new").expect("write conf");

        let runner = FakeRunner::new()
            .on("reload", &[false])
            .on("restart", &[false, true]);
        let controller = ServiceController::new("systemctl", "nginx-sp", &runner);
        let report = controller.apply_with_rollback(&conf, b"old");

        assert!(!report.activated());
        assert_eq!(report.restore, StepResult::Succeeded);
        assert_eq!(report.final_restart, StepResult::Succeeded);
        assert_eq!(std::fs::read(&conf).expect("read conf"), b"old");
        assert_eq!(
            *runner.calls.borrow(),
            vec![
                "systemctl reload nginx-sp",
                "systemctl restart nginx-sp",
                "systemctl restart nginx-sp"
            ]
        );

        let err = ensure_activated("a", &report).expect_err("should be fatal");
        assert_eq!(err.kind(), crate::error::ErrorKind::FatalRecovery);
    }

    #[test]
    fn test_reload_or_restart() {
        let runner = FakeRunner::new().on("reload", &[false]).on("restart", &[false]);
        let controller = ServiceController::new("systemctl", "nginx-sp", &runner);
        let err = controller.reload_or_restart().expect_err("both steps fail");
        assert!(err.to_string().contains("systemctl restart nginx-sp"));
        assert_eq!(runner.calls.borrow().len(), 2);
    }
}
