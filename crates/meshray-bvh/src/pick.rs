//! Click-to-select triangle picking.

use crate::geometry::GeometrySource;
use crate::{Bvh, Ray, RayHit};

/// Tracks the selected triangle of an interactively picked mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrianglePicker {
    selected: Option<u32>,
    last_selected: Option<u32>,
}

impl TrianglePicker {
    /// Create a picker with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cast `ray` against `bvh` and select the nearest triangle it hits.
    ///
    /// A miss leaves the selection untouched. On a hit the previous
    /// selection moves to [`last_selected`](Self::last_selected).
    pub fn pick<G: GeometrySource + ?Sized>(
        &mut self,
        bvh: &Bvh<'_, G>,
        ray: &Ray,
    ) -> Option<RayHit> {
        let hit = bvh.intersect_closest(ray)?;
        self.last_selected = self.selected;
        self.selected = Some(hit.triangle);
        Some(hit)
    }

    /// Currently selected triangle.
    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    /// Selection before the most recent successful pick.
    pub fn last_selected(&self) -> Option<u32> {
        self.last_selected
    }

    /// Drop both selections.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
