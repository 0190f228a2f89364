// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub fn path_to_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))
}

pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| Error::CreateDir {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Atomically write data to a file using a temporary file and rename.
/// nginx never observes a half-written vhost, and a failed write leaves the old file in place.
/// An existing file keeps its permissions, and its owner when we are allowed to set it.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    use std::fs;
    use std::io::Write;

    // Temp file must live on the same filesystem for rename to be atomic
    let parent = path
        .parent()
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;

    let random_suffix: u64 = rand::Rng::random(&mut rand::rng());
    let temp_path = parent.join(format!(".tmp-{:x}", random_suffix));

    let existing = fs::metadata(path).ok();

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        if let Some(meta) = &existing {
            file.set_permissions(meta.permissions())?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::MetadataExt;
                // Fails with EPERM unless running as root
                let _ = std::os::unix::fs::fchown(&file, Some(meta.uid()), Some(meta.gid()));
            }
        }
        file.write_all(contents)?;
        file.sync_all()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }

    fs::rename(&temp_path, path).map_err(|e| {
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }
        Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    Ok(())
}

/// List the subdirectories of `dir`, sorted by name.
/// Entries that cannot be read or whose names are not UTF-8 are skipped with a warning.
pub fn list_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut dirs = Vec::new();
    for entry_result in entries {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Could not read directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => dirs.push((name, path)),
            Err(name) => {
                tracing::warn!(entry = ?name, "Skipping non-UTF8 directory name");
            }
        }
    }

    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(dirs)
}

/// Validate a user or app name for use as a single path component.
pub fn validate_name(what: &'static str, value: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::InvalidName {
            what,
            value: value.to_string(),
            reason: reason.to_string(),
        })
    };

    if value.is_empty() {
        return reject("cannot be empty");
    }
    if value == "." || value == ".." {
        return reject("cannot be a relative path component");
    }
    if value.starts_with('-') {
        return reject("cannot start with a dash");
    }
    for c in value.chars() {
        if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' {
            return reject(&format!("contains invalid character: '{}'", c));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let path = dir.path().join("app.conf");

        atomic_write(&path, b"first").expect("first write should succeed");
        atomic_write(&path, b"second").expect("second write should succeed");

        assert_eq!(std::fs::read(&path).expect("file should be readable"), b"second");

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("dir should be readable")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp directory should be created");
        let path = dir.path().join("blog.conf");
        std::fs::write(&path, "old").expect("write should succeed");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640))
            .expect("chmod should succeed");

        atomic_write(&path, b"new").expect("atomic write should succeed");

        let mode = std::fs::metadata(&path)
            .expect("file should exist")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(std::fs::read(&path).expect("read should succeed"), b"new");
    }

    #[test]
    fn test_atomic_write_missing_parent_fails_without_creating_file() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        let path = dir.path().join("missing").join("app.conf");

        let err = atomic_write(&path, b"data").expect_err("write should fail");
        assert!(matches!(err, Error::WriteFile { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_list_dirs_sorted_and_skips_files() {
        let dir = tempfile::tempdir().expect("temp directory should be created");
        std::fs::create_dir(dir.path().join("zeta")).expect("mkdir zeta");
        std::fs::create_dir(dir.path().join("alpha")).expect("mkdir alpha");
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write file");

        let names: Vec<String> = list_dirs(dir.path())
            .expect("listing should succeed")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("app", "blog").is_ok());
        assert!(validate_name("app", "my-app_2.0").is_ok());

        assert!(validate_name("app", "").is_err());
        assert!(validate_name("app", "..").is_err());
        assert!(validate_name("app", "a/b").is_err());
        assert!(validate_name("app", "-rf").is_err());
        assert!(validate_name("user", "bob smith").is_err());
    }
}
