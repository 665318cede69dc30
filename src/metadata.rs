//! Merges the metadata tables of every input into the metadata the output
//! archive is written with (spec.md §4.4).

use anyhow::{Context, Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// One input's metadata rows and geographic bounds, as read from its
/// [`crate::mbtiles::MBTilesReader`].
pub struct InputMetadata {
	pub path: PathBuf,
	pub entries: Vec<(String, String)>,
	pub bounds: Option<(f64, f64, f64, f64)>,
}

/// Merges every input's metadata into the final set of `(name, value)`
/// rows to write to the output. Steps 1-4 of the reconciliation algorithm:
/// last-writer-wins merge, minzoom/maxzoom fold, bounds fold, and a
/// brace-balanced `vector_layers` dedup.
pub fn reconcile(inputs: &[InputMetadata]) -> Result<Vec<(String, String)>> {
	let mut merged: BTreeMap<String, String> = BTreeMap::new();
	for input in inputs {
		for (name, value) in &input.entries {
			merged.insert(name.clone(), value.clone());
		}
	}

	let mut minzoom: Option<i64> = None;
	let mut maxzoom: Option<i64> = None;
	for input in inputs {
		if let Some((_, value)) = input.entries.iter().find(|(n, _)| n == "minzoom") {
			let z: i64 = value
				.parse()
				.with_context(|| format!("invalid minzoom {value:?} in {:?}", input.path))?;
			minzoom = Some(minzoom.map_or(z, |m| m.min(z)));
		}
		if let Some((_, value)) = input.entries.iter().find(|(n, _)| n == "maxzoom") {
			let z: i64 = value
				.parse()
				.with_context(|| format!("invalid maxzoom {value:?} in {:?}", input.path))?;
			maxzoom = Some(maxzoom.map_or(z, |m| m.max(z)));
		}
	}
	if let Some(z) = minzoom {
		merged.insert("minzoom".to_string(), z.to_string());
	}
	if let Some(z) = maxzoom {
		merged.insert("maxzoom".to_string(), z.to_string());
	}

	let mut global_bounds: Option<(f64, f64, f64, f64)> = None;
	for input in inputs {
		if let Some((lon1, lat1, lon2, lat2)) = input.bounds {
			global_bounds = Some(match global_bounds {
				None => (lon1, lat1, lon2, lat2),
				Some((glon1, glat1, glon2, glat2)) => (
					glon1.min(lon1),
					glat1.min(lat1),
					glon2.max(lon2),
					glat2.max(lat2),
				),
			});
		}
	}
	if let Some((lon1, lat1, lon2, lat2)) = global_bounds {
		merged.insert(
			"bounds".to_string(),
			format!("{lon1:.6},{lat1:.6},{lon2:.6},{lat2:.6}"),
		);
	}

	let mut descriptors: BTreeSet<String> = BTreeSet::new();
	for input in inputs {
		let Some((_, json)) = input.entries.iter().find(|(n, _)| n == "json") else {
			continue;
		};
		for descriptor in extract_vector_layer_descriptors(json, &input.path)? {
			descriptors.insert(descriptor);
		}
	}
	if !descriptors.is_empty() {
		let joined = descriptors.into_iter().collect::<Vec<_>>().join(",");
		merged.insert("json".to_string(), format!("{{\"vector_layers\":[{joined}]}}"));
	}

	Ok(merged.into_iter().collect())
}

/// Walks the text following `"vector_layers":[`, maintaining a brace
/// counter, and returns the byte-exact slice of each top-level `{...}`
/// descriptor. Does not understand strings, escapes, or comments: braces
/// inside a quoted string value would mis-parse, which is acceptable for
/// the descriptors this scanner is meant to read.
fn extract_vector_layer_descriptors(json: &str, source: &Path) -> Result<Vec<String>> {
	const MARKER: &str = "\"vector_layers\":[";
	let start = json
		.find(MARKER)
		.ok_or_else(|| anyhow!("input {source:?} is missing \"vector_layers\":[ in its json metadata"))?;

	let bytes = json.as_bytes();
	let mut cursor = start + MARKER.len();
	let mut depth = 0i32;
	let mut descriptor_start = None;
	let mut descriptors = Vec::new();

	while cursor < bytes.len() {
		match bytes[cursor] {
			b'{' => {
				if depth == 0 {
					descriptor_start = Some(cursor);
				}
				depth += 1;
			}
			b'}' => {
				depth -= 1;
				if depth == 0 {
					if let Some(s) = descriptor_start.take() {
						descriptors.push(json[s..=cursor].to_string());
					}
				}
			}
			b']' if depth == 0 => break,
			_ => {}
		}
		cursor += 1;
	}

	Ok(descriptors)
}
