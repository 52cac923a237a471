// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{Error, Result};
use rusqlite::{Connection, ErrorCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Exclusive, non-blocking advisory lock for one job against one ledger.
///
/// Held as an open `BEGIN EXCLUSIVE` transaction on a side SQLite file, so
/// the OS drops it if the process dies. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    conn: Connection,
    path: PathBuf,
}

impl RunLock {
    /// Lock file for `job` next to the ledger, e.g. `ledger.sqlite.ingest.lock`.
    pub fn path_for(database: &Path, job: &str) -> PathBuf {
        let mut name = database.as_os_str().to_os_string();
        name.push(format!(".{job}.lock"));
        PathBuf::from(name)
    }

    pub fn acquire(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::ZERO)?;
        match conn.execute_batch("BEGIN EXCLUSIVE") {
            Ok(()) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                return Err(Error::ConcurrentRunDetected {
                    lock: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
        debug!(lock = %path.display(), "run lock acquired");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            debug!(lock = %self.path.display(), error = %e, "run lock release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_fast_until_release() {
        let dir = tempdir().unwrap();
        let path = RunLock::path_for(&dir.path().join("ledger.sqlite"), "ingest");
        assert!(path.to_string_lossy().ends_with("ledger.sqlite.ingest.lock"));

        let first = RunLock::acquire(&path).unwrap();
        let err = RunLock::acquire(&path).unwrap_err();
        assert!(matches!(err, Error::ConcurrentRunDetected { .. }));

        drop(first);
        let again = RunLock::acquire(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
    }
}
