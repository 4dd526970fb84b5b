//! Rectangle placement for drawing a mount on one cylinder revolution.
//!
//! [`LayoutRender`] holds only the geometry; every call to
//! [`LayoutRender::iter`] starts a fresh pass, so the same render always
//! yields the same rectangles in the same order.

use std::iter::FusedIterator;

use serde::Serialize;

use super::calculator::{LayoutMetrics, LayoutSpec};

/// Blank substrate shown on each side of the mount.
pub const SUBSTRATE_MARGIN_MM: f64 = 2.0;

/// Advance gaps at or below this are not drawn.
pub const GAP_DRAW_THRESHOLD_MM: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RectKind {
    Label,
    Gap,
}

/// A rectangle in substrate coordinates (x across the web, y along it).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedRect {
    pub kind: RectKind,
    pub repeat: u32,
    pub cavity: u32,
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Geometry {
    cavity_width: f64,
    cavity_gap: f64,
    cavities: u32,
    repeats: u32,
    label_length: f64,
    pitch: f64,
    advance_gap: f64,
    circumference: f64,
    mount_width: f64,
}

impl Geometry {
    fn draws_gap(&self) -> bool {
        self.advance_gap > GAP_DRAW_THRESHOLD_MM
    }

    fn cells(&self) -> u64 {
        u64::from(self.cavities) * u64::from(self.repeats)
    }

    fn label(&self, repeat: u32, cavity: u32) -> PlacedRect {
        PlacedRect {
            kind: RectKind::Label,
            repeat,
            cavity,
            x_mm: SUBSTRATE_MARGIN_MM + f64::from(cavity) * (self.cavity_width + self.cavity_gap),
            y_mm: f64::from(repeat) * self.pitch,
            width_mm: self.cavity_width,
            height_mm: self.label_length,
        }
    }

    fn gap_below(&self, label: &PlacedRect) -> PlacedRect {
        PlacedRect {
            kind: RectKind::Gap,
            y_mm: label.y_mm + self.label_length,
            height_mm: self.advance_gap,
            ..*label
        }
    }
}

/// Finished placement for one spec.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRender {
    geometry: Geometry,
}

impl LayoutRender {
    pub(crate) fn new(spec: &LayoutSpec, metrics: &LayoutMetrics) -> Self {
        let pitch = metrics.circumference_mm / f64::from(spec.repeats_per_revolution);
        Self {
            geometry: Geometry {
                cavity_width: spec.cavity_width_mm,
                cavity_gap: spec.cavity_gap_mm,
                cavities: spec.cavity_count,
                repeats: spec.repeats_per_revolution,
                label_length: spec.repeat_length_mm,
                pitch,
                advance_gap: metrics.advance_gap_mm,
                circumference: metrics.circumference_mm,
                mount_width: metrics.mount_width_mm,
            },
        }
    }

    pub fn substrate_width_mm(&self) -> f64 {
        self.geometry.mount_width + 2.0 * SUBSTRATE_MARGIN_MM
    }

    pub fn substrate_height_mm(&self) -> f64 {
        self.geometry.circumference
    }

    /// Number of rectangles a full pass yields.
    pub fn len(&self) -> usize {
        let per_cell = if self.geometry.draws_gap() { 2 } else { 1 };
        (self.geometry.cells() * per_cell) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new pass over the rectangles: repeat by repeat, cavity by
    /// cavity, each label followed by its gap when one is drawn.
    pub fn iter(&self) -> Rects {
        Rects {
            geometry: self.geometry,
            next_cell: 0,
            pending_gap: None,
        }
    }
}

impl<'a> IntoIterator for &'a LayoutRender {
    type Item = PlacedRect;
    type IntoIter = Rects;

    fn into_iter(self) -> Rects {
        self.iter()
    }
}

/// Lazy pass over a [`LayoutRender`].
#[derive(Debug, Clone)]
pub struct Rects {
    geometry: Geometry,
    next_cell: u64,
    pending_gap: Option<PlacedRect>,
}

impl Iterator for Rects {
    type Item = PlacedRect;

    fn next(&mut self) -> Option<PlacedRect> {
        if let Some(gap) = self.pending_gap.take() {
            return Some(gap);
        }
        if self.next_cell >= self.geometry.cells() {
            return None;
        }

        let cavities = u64::from(self.geometry.cavities);
        let repeat = (self.next_cell / cavities) as u32;
        let cavity = (self.next_cell % cavities) as u32;
        self.next_cell += 1;

        let label = self.geometry.label(repeat, cavity);
        if self.geometry.draws_gap() {
            self.pending_gap = Some(self.geometry.gap_below(&label));
        }
        Some(label)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining_cells = self.geometry.cells() - self.next_cell;
        let per_cell = if self.geometry.draws_gap() { 2 } else { 1 };
        let remaining =
            (remaining_cells * per_cell) as usize + usize::from(self.pending_gap.is_some());
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rects {}

impl FusedIterator for Rects {}
