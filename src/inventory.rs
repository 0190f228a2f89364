// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Discovery of accounts and apps on the host.

use crate::config::Paths;
use crate::domain::DomainSet;
use crate::error::{Error, Result};
use crate::fs::{list_dirs, validate_name};
use crate::vhost::read_app_details;
use tracing::debug;

/// A valid app found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecord {
    pub app: String,
    /// Owner according to the app's vhost.
    pub user: String,
    pub domains: DomainSet,
}

/// A concrete (user, app) pair resolved against the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRef {
    pub user: String,
    pub app: String,
}

/// Enumerate valid apps, for every account or for `user` only.
///
/// Apps whose vhost is missing or unparsable are left out. Results are
/// ordered by account, then app name.
///
/// # Errors
/// [`Error::AccountsRootNotFound`] when the accounts root is missing,
/// [`Error::AccountNotFound`] when `user` has no `apps` directory.
pub fn find_apps(paths: &Paths, user: Option<&str>) -> Result<Vec<AppRecord>> {
    let accounts = match user {
        Some(user) => {
            validate_name("user", user)?;
            let apps_dir = paths.apps_dir(user);
            if !apps_dir.is_dir() {
                return Err(Error::AccountNotFound(apps_dir));
            }
            vec![user.to_string()]
        }
        None => {
            if !paths.users_root.is_dir() {
                return Err(Error::AccountsRootNotFound(paths.users_root.clone()));
            }
            list_dirs(&paths.users_root)?
                .into_iter()
                .map(|(name, _)| name)
                .collect()
        }
    };

    let mut records = Vec::new();
    for account in accounts {
        let apps_dir = paths.apps_dir(&account);
        if !apps_dir.is_dir() {
            debug!(account = %account, "Account has no apps directory");
            continue;
        }

        for (app, _) in list_dirs(&apps_dir)? {
            match read_app_details(paths, &app) {
                Ok(details) => records.push(AppRecord {
                    app,
                    user: details.user,
                    domains: details.domains,
                }),
                Err(e) => {
                    debug!(account = %account, app = %app, error = %e, "Skipping app without a usable vhost");
                }
            }
        }
    }

    Ok(records)
}

/// Resolve `app` to its owner. An explicit `user` must match the vhost's owner.
pub fn resolve(paths: &Paths, user: Option<&str>, app: Option<&str>) -> Result<AppRef> {
    let app = app.ok_or(Error::MissingIdentifier("App name"))?;
    validate_name("app", app)?;

    let details = read_app_details(paths, app)?;
    if let Some(user) = user {
        validate_name("user", user)?;
        if user != details.user {
            return Err(Error::OwnerMismatch {
                app: app.to_string(),
                user: user.to_string(),
                owner: details.user,
            });
        }
    }

    Ok(AppRef {
        user: details.user,
        app: app.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::Path;

    fn layout(dir: &Path) -> Paths {
        let paths = Paths {
            users_root: dir.join("srv").join("users"),
            vhosts_dir: dir.join("vhosts.d"),
            ssl_root: dir.join("le-ssls"),
        };
        std::fs::create_dir_all(&paths.users_root).expect("mkdir users");
        std::fs::create_dir_all(&paths.vhosts_dir).expect("mkdir vhosts");
        paths
    }

    fn add_app(paths: &Paths, user: &str, app: &str, domains: &str) {
        std::fs::create_dir_all(paths.webroot(user, app)).expect("mkdir webroot");
        let conf = format!(
            "server {{\n    server_name {};\n    root {};\n}}\n",
            domains,
            paths.webroot(user, app).display()
        );
        std::fs::write(paths.vhost_conf(app), conf).expect("write vhost");
    }

    #[test]
    fn test_find_all_apps_across_accounts() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let paths = layout(dir.path());
        add_app(&paths, "bob", "shop", "shop.com");
        add_app(&paths, "alice", "blog", "blog.com www.blog.com");
        add_app(&paths, "alice", "api", "api.blog.com");
        // App directory without a vhost is ignored
        std::fs::create_dir_all(paths.app_dir("alice", "orphan")).expect("mkdir orphan");
        // Account without apps directory is ignored
        std::fs::create_dir_all(paths.user_home("carol")).expect("mkdir carol");

        let records = find_apps(&paths, None).expect("scan should succeed");
        let summary: Vec<(&str, &str, String)> = records
            .iter()
            .map(|r| (r.app.as_str(), r.user.as_str(), r.domains.joined()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("api", "alice", "api.blog.com".to_string()),
                ("blog", "alice", "blog.com,www.blog.com".to_string()),
                ("shop", "bob", "shop.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_find_apps_for_one_user() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let paths = layout(dir.path());
        add_app(&paths, "bob", "shop", "shop.com");
        add_app(&paths, "alice", "blog", "blog.com");

        let records = find_apps(&paths, Some("bob")).expect("scan should succeed");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].app, "shop");
    }

    #[test]
    fn test_empty_apps_dir_is_empty_result() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let paths = layout(dir.path());
        std::fs::create_dir_all(paths.apps_dir("dave")).expect("mkdir apps");

        assert!(find_apps(&paths, Some("dave"))
            .expect("scan should succeed")
            .is_empty());
        assert!(find_apps(&paths, None)
            .expect("scan should succeed")
            .is_empty());
    }

    #[test]
    fn test_missing_account_and_root() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let paths = layout(dir.path());

        let err = find_apps(&paths, Some("nobody")).expect_err("should fail");
        assert!(matches!(err, Error::AccountNotFound(_)));

        let missing_root = Paths {
            users_root: dir.path().join("nope"),
            ..paths
        };
        let err = find_apps(&missing_root, None).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_resolve() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let paths = layout(dir.path());
        add_app(&paths, "alice", "blog", "blog.com");

        let app_ref = resolve(&paths, None, Some("blog")).expect("should resolve");
        assert_eq!(
            app_ref,
            AppRef {
                user: "alice".into(),
                app: "blog".into()
            }
        );
        assert!(resolve(&paths, Some("alice"), Some("blog")).is_ok());

        let err = resolve(&paths, Some("bob"), Some("blog")).expect_err("wrong owner");
        assert!(matches!(err, Error::OwnerMismatch { .. }));

        let err = resolve(&paths, None, None).expect_err("missing app");
        assert!(matches!(err, Error::MissingIdentifier(_)));

        let err = resolve(&paths, None, Some("../etc")).expect_err("bad name");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = resolve(&paths, None, Some("ghost")).expect_err("no vhost");
        assert!(matches!(err, Error::VhostNotFound { .. }));
    }
}
