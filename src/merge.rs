//! Slow-path tile merge: decodes the MVT layers of every contributing
//! input tile and concatenates them into one tile (spec.md §4.5).
//!
//! Layers are never re-parsed or re-encoded feature by feature; each
//! contributing layer is cloned verbatim into the merged tile, which is
//! what makes this safe to treat two layers of the same name as "last one
//! wins by MVT semantics" rather than a conflict this code must resolve.

use crate::blob::Blob;
use crate::compression::{compress_gzip, decompress_gzip};
use anyhow::{Context, Result};
use geozero::mvt::Tile;
use prost::Message;

const OUTPUT_GZIP_LEVEL: u32 = 6;

/// Decompresses, decodes, and concatenates the layers of every payload in
/// `payloads`, in order, then re-encodes and re-compresses the result.
///
/// A payload that fails gzip decompression or MVT decoding is skipped
/// (spec.md §7): it simply contributes no layers. Returns `None` if no
/// payload contributed any layers, signalling the caller to skip the
/// coordinate entirely rather than write an empty tile.
pub fn merge_tiles(payloads: &[Blob], labels: &[&str]) -> Result<Option<Blob>> {
	let mut merged = Tile::default();
	let mut contributed = false;

	for (payload, label) in payloads.iter().zip(labels) {
		let decompressed = match decompress_gzip(payload) {
			Ok(d) => d,
			Err(err) => {
				log::warn!("skipping tile from {label}: failed to decompress: {err:#}");
				continue;
			}
		};
		let tile = match Tile::decode(decompressed.as_slice()) {
			Ok(t) => t,
			Err(err) => {
				log::warn!("skipping tile from {label}: failed to decode MVT: {err:#}");
				continue;
			}
		};
		if !tile.layers.is_empty() {
			contributed = true;
		}
		merged.layers.extend(tile.layers);
	}

	if !contributed {
		return Ok(None);
	}

	let encoded = merged.encode_to_vec();
	let compressed = compress_gzip(&Blob::from(encoded), OUTPUT_GZIP_LEVEL).context("failed to compress merged tile")?;
	Ok(Some(compressed))
}

#[cfg(test)]
mod tests {
	use super::*;
	use geozero::mvt::tile::Layer;

	fn gzip_tile(layer_names: &[&str]) -> Blob {
		let tile = Tile {
			layers: layer_names
				.iter()
				.map(|name| Layer {
					version: 2,
					name: (*name).to_string(),
					..Default::default()
				})
				.collect(),
		};
		let encoded = tile.encode_to_vec();
		compress_gzip(&Blob::from(encoded), 6).unwrap()
	}

	#[test]
	fn concatenates_layers_in_match_order() -> Result<()> {
		let a = gzip_tile(&["roads"]);
		let b = gzip_tile(&["water"]);
		let merged = merge_tiles(&[a, b], &["a", "b"])?.unwrap();

		let decompressed = decompress_gzip(&merged)?;
		let tile = Tile::decode(decompressed.as_slice())?;
		let names: Vec<&str> = tile.layers.iter().map(|l| l.name.as_str()).collect();
		assert_eq!(names, vec!["roads", "water"]);
		Ok(())
	}

	#[test]
	fn undecodable_payload_is_skipped_not_fatal() -> Result<()> {
		let good = gzip_tile(&["roads"]);
		let garbage = Blob::from(b"not gzip".as_slice());
		let merged = merge_tiles(&[good, garbage], &["good", "garbage"])?.unwrap();
		let decompressed = decompress_gzip(&merged)?;
		let tile = Tile::decode(decompressed.as_slice())?;
		assert_eq!(tile.layers.len(), 1);
		Ok(())
	}

	#[test]
	fn all_undecodable_payloads_yields_none() -> Result<()> {
		let garbage1 = Blob::from(b"not gzip".as_slice());
		let garbage2 = Blob::from(b"also not gzip".as_slice());
		let merged = merge_tiles(&[garbage1, garbage2], &["a", "b"])?;
		assert!(merged.is_none());
		Ok(())
	}
}
