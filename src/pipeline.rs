//! Orchestrates a full merge run: opens inputs, reconciles metadata,
//! enumerates the union of populated coordinates per zoom, and dispatches
//! each coordinate to the fast or slow path (spec.md §4.6).

use crate::input_index::InputIndex;
use crate::mbtiles::{MBTilesReader, MBTilesWriter, TileWriteMode, ZMAX};
use crate::merge::merge_tiles;
use crate::metadata::{InputMetadata, reconcile};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

pub struct ShardConfig {
	pub shards: u32,
	pub shard: u32,
}

impl ShardConfig {
	pub fn validate(self) -> Result<ShardConfig> {
		if self.shard >= self.shards {
			bail!("SHARD ({}) must be less than SHARDS ({})", self.shard, self.shards);
		}
		Ok(self)
	}
}

/// Runs the merge pipeline, writing `output_path`.
pub fn run(input_paths: &[PathBuf], output_path: &Path, config: &ShardConfig) -> Result<()> {
	if input_paths.is_empty() {
		bail!("at least one input file is required");
	}

	log::info!(
		"merging {} input(s) into {:?} (shard {}/{})",
		input_paths.len(),
		output_path,
		config.shard,
		config.shards
	);

	let mut readers = Vec::with_capacity(input_paths.len());
	let mut indexes = Vec::with_capacity(input_paths.len());
	for (i, path) in input_paths.iter().enumerate() {
		let reader = MBTilesReader::open_path(path).with_context(|| format!("failed to open input {path:?}"))?;
		let index = InputIndex::build(path, i, &reader).with_context(|| format!("failed to scan input {path:?}"))?;
		readers.push(reader);
		indexes.push(index);
	}

	if config.shard == 0 && config.shards == 1 && output_path.exists() {
		std::fs::remove_file(output_path)
			.with_context(|| format!("failed to remove stale output {output_path:?}"))?;
	}

	let mut writer = MBTilesWriter::create(output_path)
		.with_context(|| format!("failed to open output {output_path:?}"))?;

	if config.shard == 0 {
		let mut input_metadata = Vec::with_capacity(readers.len());
		for (path, reader) in input_paths.iter().zip(&readers) {
			input_metadata.push(InputMetadata {
				path: path.clone(),
				entries: reader.metadata()?,
				bounds: reader.bounds()?,
			});
		}
		let merged = reconcile(&input_metadata)?;
		for (name, value) in merged {
			writer.set_metadata(&name, &value)?;
		}
	}

	for zoom in 0..ZMAX {
		let Some((min_x, min_y, max_x, max_y)) = union_bbox(&indexes, zoom) else {
			continue;
		};

		for x in min_x..=max_x {
			for y in min_y..=max_y {
				if shard_bucket(zoom, x, y, config.shards) != config.shard {
					continue;
				}

				let matches: Vec<usize> = indexes
					.iter()
					.enumerate()
					.filter(|(_, idx)| idx.contains(zoom, x, y))
					.map(|(i, _)| i)
					.collect();

				match matches.len() {
					0 => continue,
					1 => {
						let i = matches[0];
						if let Some(tile) = readers[i].read_tile(zoom, x, y)? {
							writer.save_tile(zoom, x, y, tile, TileWriteMode::Insert)?;
						}
					}
					_ => {
						let mut payloads = Vec::with_capacity(matches.len());
						let mut labels = Vec::with_capacity(matches.len());
						for &i in &matches {
							if let Some(tile) = readers[i].read_tile(zoom, x, y)? {
								payloads.push(tile);
								labels.push(indexes[i].path().to_string_lossy().into_owned());
							}
						}
						let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
						if let Some(merged) = merge_tiles(&payloads, &label_refs)? {
							writer.save_tile(zoom, x, y, merged, TileWriteMode::Insert)?;
						}
					}
				}
			}
		}
	}

	writer.close()?;
	Ok(())
}

/// Deterministic, balanced-enough shard assignment for one coordinate
/// (spec.md §4.6): `(x·2^z + y) mod SHARDS`.
fn shard_bucket(zoom: u8, x: u32, y: u32, shards: u32) -> u32 {
	((u64::from(x) * (1u64 << u64::from(zoom)) + u64::from(y)) % u64::from(shards)) as u32
}

fn union_bbox(indexes: &[InputIndex], zoom: u8) -> Option<(u32, u32, u32, u32)> {
	let mut union: Option<(u32, u32, u32, u32)> = None;
	for index in indexes {
		let Some(bbox) = index.bbox(zoom) else { continue };
		let Some((min_x, min_y, max_x, max_y)) = bbox.bounds() else {
			continue;
		};
		union = Some(match union {
			None => (min_x, min_y, max_x, max_y),
			Some((umin_x, umin_y, umax_x, umax_y)) => (
				umin_x.min(min_x),
				umin_y.min(min_y),
				umax_x.max(max_x),
				umax_y.max(max_y),
			),
		});
	}
	union
}
