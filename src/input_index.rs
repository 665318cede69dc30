//! Per-input catalogue of populated coordinates, built from a single full
//! scan of an [`MBTilesReader`] (spec.md §4.2).

use crate::bbox::Bbox;
use crate::coord_set::CoordinateSet;
use crate::mbtiles::{MBTilesReader, ZMAX};
use anyhow::Result;
use std::path::{Path, PathBuf};

pub struct InputIndex {
	path: PathBuf,
	index: usize,
	per_zoom: Vec<(CoordinateSet, Bbox)>,
}

impl InputIndex {
	/// Scans `reader` once, populating a [`CoordinateSet`] and [`Bbox`] per
	/// zoom level. `index` is the input's assignment order, used downstream
	/// as a stable identifier (e.g. for match ordering in the slow path).
	pub fn build(path: &Path, index: usize, reader: &MBTilesReader) -> Result<InputIndex> {
		let mut per_zoom: Vec<(CoordinateSet, Bbox)> =
			(0..ZMAX).map(|z| (CoordinateSet::new(z), Bbox::new_empty())).collect();
		reader.scan_all(|zoom, x, y| {
			if let Some((set, bbox)) = per_zoom.get_mut(usize::from(zoom)) {
				set.insert(x, y);
				bbox.extend(x, y);
			}
		})?;
		Ok(InputIndex {
			path: path.to_path_buf(),
			index,
			per_zoom,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn index(&self) -> usize {
		self.index
	}

	pub fn contains(&self, zoom: u8, x: u32, y: u32) -> bool {
		self
			.per_zoom
			.get(usize::from(zoom))
			.is_some_and(|(set, _)| set.contains(x, y))
	}

	pub fn bbox(&self, zoom: u8) -> Option<&Bbox> {
		self.per_zoom.get(usize::from(zoom)).map(|(_, bbox)| bbox)
	}
}
