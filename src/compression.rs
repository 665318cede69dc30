//! Gzip compression helpers for tile payloads.
//!
//! MBTiles vector tiles are always gzip-compressed MVT (spec.md §6). This
//! wraps `flate2` the same way `versatiles_core`'s `compress_gzip`/
//! `decompress_gzip` do.

use crate::blob::Blob;
use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::{GzDecoder, GzEncoder};
use std::io::Read;

/// Compresses `blob` with gzip at the given level (spec.md §4.5 uses level 6
/// for merged output tiles).
pub fn compress_gzip(blob: &Blob, level: u32) -> Result<Blob> {
	let mut encoder = GzEncoder::new(blob.as_slice(), Compression::new(level));
	let mut compressed = Vec::new();
	encoder
		.read_to_end(&mut compressed)
		.context("failed to gzip-compress tile data")?;
	Ok(Blob::from(compressed))
}

/// Decompresses a gzip-compressed blob.
pub fn decompress_gzip(blob: &Blob) -> Result<Blob> {
	let mut decoder = GzDecoder::new(blob.as_slice());
	let mut decompressed = Vec::new();
	decoder
		.read_to_end(&mut decompressed)
		.context("failed to gzip-decompress tile data")?;
	Ok(Blob::from(decompressed))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips() -> Result<()> {
		let data = Blob::from(b"the quick brown fox jumps over the lazy dog".repeat(50).as_slice());
		let compressed = compress_gzip(&data, 6)?;
		assert_ne!(compressed.as_slice(), data.as_slice());
		let decompressed = decompress_gzip(&compressed)?;
		assert_eq!(decompressed, data);
		Ok(())
	}

	#[test]
	fn decompress_rejects_garbage() {
		let garbage = Blob::from(b"not gzip".as_slice());
		assert!(decompress_gzip(&garbage).is_err());
	}
}
