//! Print-layout computation: cylinder selection, repeat geometry, material
//! and plate estimates.

pub mod calculator;
pub mod catalog;
pub mod render;

pub use calculator::{
    recommend_unit, LayoutCalculator, LayoutMetrics, LayoutSnapshot, LayoutSpec, Recommendation,
    MIN_ADVANCE_GAP_MM,
};
pub use catalog::{circumference_for, ZCatalog, ZUnit, DEFAULT_UNITS, Z_PITCH_MM};
pub use render::{LayoutRender, PlacedRect, RectKind, Rects};
