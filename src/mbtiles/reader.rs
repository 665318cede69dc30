//! Read-only access to an existing MBTiles archive.

use super::flip_y;
use crate::blob::Blob;
use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;

pub struct MBTilesReader {
	conn: Connection,
}

impl MBTilesReader {
	/// Opens `path` read-only and immutable, matching the teacher's
	/// `file:<path>?immutable=1&mode=ro` URI so SQLite never takes a lock on
	/// an input file while multiple shard processes read it concurrently.
	pub fn open_path(path: &Path) -> Result<MBTilesReader> {
		let uri = format!("file:{}?mode=ro&immutable=1", path.display());
		let conn = Connection::open_with_flags(
			uri,
			OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
		)
		.with_context(|| format!("failed to open MBTiles input {path:?}"))?;
		Ok(MBTilesReader { conn })
	}

	/// Returns every `(name, value)` row of the `metadata` table, in
	/// whatever order SQLite yields them (callers reconcile order-independently).
	pub fn metadata(&self) -> Result<Vec<(String, String)>> {
		let mut stmt = self.conn.prepare("SELECT name, value FROM metadata")?;
		let rows = stmt
			.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
			.collect::<std::result::Result<Vec<_>, _>>()
			.context("failed to read metadata table")?;
		Ok(rows)
	}

	/// Parses the `bounds` metadata value (`min_lon,min_lat,max_lon,max_lat`),
	/// if present.
	pub fn bounds(&self) -> Result<Option<(f64, f64, f64, f64)>> {
		let Some(value) = self
			.conn
			.query_row(
				"SELECT value FROM metadata WHERE name = 'bounds'",
				[],
				|row| row.get::<_, String>(0),
			)
			.optional()?
		else {
			return Ok(None);
		};
		let parts: Vec<&str> = value.split(',').map(str::trim).collect();
		if parts.len() != 4 {
			return Ok(None);
		}
		let mut nums = [0.0f64; 4];
		for (i, part) in parts.iter().enumerate() {
			nums[i] = part.parse().with_context(|| format!("invalid bounds value {value:?}"))?;
		}
		Ok(Some((nums[0], nums[1], nums[2], nums[3])))
	}

	/// Reads one tile at XYZ coordinates, converting to the TMS row MBTiles
	/// stores on disk at the SQL boundary. Returns `None` if absent.
	pub fn read_tile(&self, zoom: u8, x: u32, y: u32) -> Result<Option<Blob>> {
		let row = flip_y(zoom, y);
		let data = self
			.conn
			.query_row(
				"SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
				(zoom, x, row),
				|r| r.get::<_, Vec<u8>>(0),
			)
			.optional()
			.context("failed to read tile")?;
		Ok(data.map(Blob::from))
	}

	/// Performs the single full-table scan used to populate an input's
	/// coordinate index (spec.md §4.2): visits every stored tile's
	/// `(zoom, x, y)` in XYZ space, converting the on-disk TMS row once here
	/// so every downstream consumer (`CoordinateSet`, `Bbox`) works purely in
	/// XYZ coordinates.
	pub fn scan_all(&self, mut visit: impl FnMut(u8, u32, u32)) -> Result<()> {
		let mut stmt = self
			.conn
			.prepare("SELECT zoom_level, tile_column, tile_row FROM tiles")?;
		let mut rows = stmt.query([])?;
		while let Some(row) = rows.next()? {
			let zoom: u8 = row.get(0)?;
			let x: u32 = row.get(1)?;
			let tms_row: u32 = row.get(2)?;
			visit(zoom, x, flip_y(zoom, tms_row));
		}
		Ok(())
	}
}
