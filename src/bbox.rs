//! Axis-aligned bounds in tile coordinates at a single zoom level.
//!
//! Starts empty (spec.md §3: "min = +∞, max = −∞"). Rather than relying on
//! sentinel integer values that could collide with a real coordinate, the
//! empty state is represented directly with `Option`.

#[derive(Debug, Clone, Copy, Default)]
pub struct Bbox {
	extent: Option<Extent>,
}

#[derive(Debug, Clone, Copy)]
struct Extent {
	min_x: u32,
	min_y: u32,
	max_x: u32,
	max_y: u32,
}

impl Bbox {
	#[must_use]
	pub fn new_empty() -> Bbox {
		Bbox { extent: None }
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.extent.is_none()
	}

	pub fn extend(&mut self, x: u32, y: u32) {
		self.extent = Some(match self.extent {
			None => Extent {
				min_x: x,
				min_y: y,
				max_x: x,
				max_y: y,
			},
			Some(e) => Extent {
				min_x: e.min_x.min(x),
				min_y: e.min_y.min(y),
				max_x: e.max_x.max(x),
				max_y: e.max_y.max(y),
			},
		});
	}

	pub fn extend_bbox(&mut self, other: &Bbox) {
		if let Some(e) = other.extent {
			self.extend(e.min_x, e.min_y);
			self.extend(e.max_x, e.max_y);
		}
	}

	/// Returns `(min_x, min_y, max_x, max_y)`, or `None` if empty.
	#[must_use]
	pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
		self.extent.map(|e| (e.min_x, e.min_y, e.max_x, e.max_y))
	}
}
