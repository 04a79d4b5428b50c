//! Filesystem abstraction for counter sources.
//!
//! Both kernel sources are read through the `FileSystem` trait so the
//! collectors can run against the real pseudo-filesystems in
//! production and an in-memory mock in tests.

use std::io;
use std::path::{Path, PathBuf};

/// Abstraction over the handful of filesystem operations the
/// collectors need.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries of a directory. Order is unspecified; callers
    /// that care must sort.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation delegating to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn real_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stat");
        fs::write(&file, "1 2 3 4\n").unwrap();

        let real = RealFs::new();
        assert!(real.exists(&file));
        assert!(!real.exists(&dir.path().join("missing")));
        assert_eq!(real.read_to_string(&file).unwrap(), "1 2 3 4\n");

        let entries = real.read_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![file]);
    }
}
