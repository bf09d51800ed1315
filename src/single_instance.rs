//! Single-instance guard
//!
//! An exclusive advisory lock on a file in the settings directory, held for
//! the lifetime of the process. A second process (or a second guard on the
//! same path) fails to acquire the lock and reports itself as not the first
//! instance.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

pub struct SingleInstance {
    file: Option<File>,
    is_first: bool,
}

impl SingleInstance {
    /// Try to become the primary instance by locking `path` exclusively.
    /// Inability to create the lock file at all is treated as "not first".
    pub fn acquire(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
        {
            Ok(file) => match file.try_lock_exclusive() {
                Ok(()) => Self {
                    file: Some(file),
                    is_first: true,
                },
                Err(_) => Self {
                    file: None,
                    is_first: false,
                },
            },
            Err(_) => Self {
                file: None,
                is_first: false,
            },
        }
    }

    /// True if this process holds the lock.
    pub fn is_first_instance(&self) -> bool {
        self.is_first
    }
}

impl Drop for SingleInstance {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // unlock explicitly; dropping the handle would also release it
            let _ = FileExt::unlock(&file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_acquire_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("mouse-guard.lock");
        let instance = SingleInstance::acquire(&lock_path);
        assert!(instance.is_first_instance());
    }

    #[test]
    fn test_second_acquire_fails_while_first_is_held() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("mouse-guard.lock");

        let first = SingleInstance::acquire(&lock_path);
        assert!(first.is_first_instance());

        let second = SingleInstance::acquire(&lock_path);
        assert!(!second.is_first_instance());
    }

    #[test]
    fn test_lock_is_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("mouse-guard.lock");

        drop(SingleInstance::acquire(&lock_path));

        let again = SingleInstance::acquire(&lock_path);
        assert!(again.is_first_instance());
    }

    #[test]
    fn test_missing_parent_directory_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("nested").join("dir").join("guard.lock");
        let instance = SingleInstance::acquire(&lock_path);
        assert!(instance.is_first_instance());
    }
}
