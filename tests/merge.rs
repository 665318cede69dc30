//! End-to-end scenarios exercising the full merge pipeline against real
//! on-disk SQLite fixtures.

use geozero::mvt::Tile as MvtTile;
use geozero::mvt::tile::Layer;
use mbtiles_merge::blob::Blob;
use mbtiles_merge::compression::{compress_gzip, decompress_gzip};
use mbtiles_merge::mbtiles::{MBTilesReader, MBTilesWriter, TileWriteMode};
use mbtiles_merge::pipeline::{self, ShardConfig};
use prost::Message;
use std::path::{Path, PathBuf};

fn make_input(
	dir: &Path,
	name: &str,
	tiles: &[(u8, u32, u32, Vec<u8>)],
	metadata: &[(&str, &str)],
) -> anyhow::Result<PathBuf> {
	let path = dir.join(name);
	let mut writer = MBTilesWriter::create(&path)?;
	for (name, value) in metadata {
		writer.set_metadata(name, value)?;
	}
	for (z, x, y, data) in tiles {
		writer.save_tile(*z, *x, *y, Blob::from(data.clone()), TileWriteMode::Insert)?;
	}
	writer.close()?;
	Ok(path)
}

fn gzip_mvt(layer_names: &[&str]) -> Vec<u8> {
	let tile = MvtTile {
		layers: layer_names
			.iter()
			.map(|name| Layer {
				version: 2,
				name: (*name).to_string(),
				..Default::default()
			})
			.collect(),
	};
	compress_gzip(&Blob::from(tile.encode_to_vec()), 6).unwrap().into_vec()
}

/// S4: a sharded run against the same output file must equal a single
/// combined run covering S2 (disjoint coordinates) and S3 (one overlap).
#[test]
fn sharded_run_covers_same_coordinates_as_single_shard() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	// (0,0,z=0) lands in bucket 0; (x=0,y=1,z=1) lands in bucket 1, so the
	// two coordinates are genuinely split across the two shards below.
	let a = make_input(dir.path(), "a.mbtiles", &[(0, 0, 0, b"Ba".to_vec())], &[])?;
	let b = make_input(dir.path(), "b.mbtiles", &[(1, 0, 1, b"Bb".to_vec())], &[])?;

	// Reference: single-shard combined run.
	let reference_output = dir.path().join("reference.mbtiles");
	pipeline::run(
		&[a.clone(), b.clone()],
		&reference_output,
		&ShardConfig { shards: 1, shard: 0 }.validate()?,
	)?;
	let reference = MBTilesReader::open_path(&reference_output)?;
	assert_eq!(reference.read_tile(0, 0, 0)?.unwrap().as_slice(), b"Ba");
	assert_eq!(reference.read_tile(1, 0, 1)?.unwrap().as_slice(), b"Bb");

	// Sharded: two shards writing sequentially into the same output file.
	let sharded_output = dir.path().join("sharded.mbtiles");
	for shard in 0..2 {
		pipeline::run(
			&[a.clone(), b.clone()],
			&sharded_output,
			&ShardConfig { shards: 2, shard }.validate()?,
		)?;
	}
	let sharded = MBTilesReader::open_path(&sharded_output)?;
	assert_eq!(sharded.read_tile(0, 0, 0)?.unwrap().as_slice(), b"Ba");
	assert_eq!(sharded.read_tile(1, 0, 1)?.unwrap().as_slice(), b"Bb");
	Ok(())
}

/// S5: minzoom/maxzoom fold to [min, max], bounds fold componentwise.
#[test]
fn metadata_merge_folds_zoom_range_and_bounds() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	let a = make_input(
		dir.path(),
		"a.mbtiles",
		&[],
		&[
			("minzoom", "4"),
			("maxzoom", "10"),
			("bounds", "-1,-1,1,1"),
			("json", "{\"vector_layers\":[{\"id\":\"roads\"}]}"),
		],
	)?;
	let b = make_input(
		dir.path(),
		"b.mbtiles",
		&[],
		&[
			("minzoom", "2"),
			("maxzoom", "8"),
			("bounds", "0,0,2,2"),
			("json", "{\"vector_layers\":[{\"id\":\"water\"}]}"),
		],
	)?;
	let output = dir.path().join("merged.mbtiles");

	pipeline::run(&[a, b], &output, &ShardConfig { shards: 1, shard: 0 }.validate()?)?;

	let reader = MBTilesReader::open_path(&output)?;
	let meta = reader.metadata()?;
	let get = |k: &str| meta.iter().find(|(n, _)| n == k).unwrap().1.clone();
	assert_eq!(get("minzoom"), "2");
	assert_eq!(get("maxzoom"), "10");
	assert_eq!(get("bounds"), "-1.000000,-1.000000,2.000000,2.000000");
	Ok(())
}

/// S6: a descriptor shared by both inputs is written once; unique
/// descriptors are preserved.
#[test]
fn vector_layers_descriptor_dedup() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	let a = make_input(
		dir.path(),
		"a.mbtiles",
		&[],
		&[(
			"json",
			"{\"vector_layers\":[{\"id\":\"roads\",\"fields\":{}},{\"id\":\"buildings\"}]}",
		)],
	)?;
	let b = make_input(
		dir.path(),
		"b.mbtiles",
		&[],
		&[(
			"json",
			"{\"vector_layers\":[{\"id\":\"roads\",\"fields\":{}},{\"id\":\"water\"}]}",
		)],
	)?;
	let output = dir.path().join("merged.mbtiles");

	pipeline::run(&[a, b], &output, &ShardConfig { shards: 1, shard: 0 }.validate()?)?;

	let reader = MBTilesReader::open_path(&output)?;
	let meta = reader.metadata()?;
	let json = meta.iter().find(|(n, _)| n == "json").unwrap().1.clone();
	let descriptor_count = json.matches("\"id\"").count();
	assert_eq!(descriptor_count, 3);
	Ok(())
}

/// S3 re-verified end to end through the pipeline, including the
/// decompress step on the merged output.
#[test]
fn overlapping_layers_feature_counts_are_preserved() -> anyhow::Result<()> {
	let dir = tempfile::tempdir()?;
	let a = make_input(dir.path(), "a.mbtiles", &[(5, 3, 7, gzip_mvt(&["roads"]))], &[])?;
	let b = make_input(dir.path(), "b.mbtiles", &[(5, 3, 7, gzip_mvt(&["water"]))], &[])?;
	let output = dir.path().join("merged.mbtiles");

	pipeline::run(&[a, b], &output, &ShardConfig { shards: 1, shard: 0 }.validate()?)?;

	let reader = MBTilesReader::open_path(&output)?;
	let tile = reader.read_tile(5, 3, 7)?.unwrap();
	let decompressed = decompress_gzip(&tile)?;
	let decoded = MvtTile::decode(decompressed.as_slice())?;
	assert_eq!(decoded.layers.len(), 2);
	assert_eq!(decoded.layers[0].name, "roads");
	assert_eq!(decoded.layers[1].name, "water");
	Ok(())
}
