//! Process-wide advisory file lock guarding SQL access to the output
//! database, so that independent shard processes (spec.md §5) don't
//! interleave writes to the same `.mbtiles` file.
//!
//! Mirrors the `Flock` RAII guard of the tool this design was distilled
//! from: the lockfile is opened once and held open for the process's
//! lifetime, and each SQL-touching sequence acquires and releases the
//! exclusive lock around itself rather than holding it for the whole run.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

pub struct LockFile {
	file: File,
}

impl LockFile {
	/// Opens (creating if necessary) the lockfile at `path` with mode 0644.
	pub fn open(path: &Path) -> Result<LockFile> {
		let file = open_with_mode(path).with_context(|| format!("failed to open lockfile {path:?}"))?;
		Ok(LockFile { file })
	}

	/// Blocks until the exclusive lock is acquired, returning a guard that
	/// releases it on drop.
	pub fn acquire(&self) -> Result<LockGuard<'_>> {
		self
			.file
			.lock_exclusive()
			.context("failed to acquire exclusive lock")?;
		Ok(LockGuard { file: &self.file })
	}
}

#[cfg(unix)]
fn open_with_mode(path: &Path) -> std::io::Result<File> {
	use std::os::unix::fs::OpenOptionsExt;
	OpenOptions::new()
		.create(true)
		.read(true)
		.write(true)
		.mode(0o644)
		.open(path)
}

#[cfg(not(unix))]
fn open_with_mode(path: &Path) -> std::io::Result<File> {
	OpenOptions::new().create(true).read(true).write(true).open(path)
}

/// Releases the exclusive lock when dropped.
pub struct LockGuard<'a> {
	file: &'a File,
}

impl Drop for LockGuard<'_> {
	fn drop(&mut self) {
		let _ = self.file.unlock();
	}
}
