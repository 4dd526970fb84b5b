//! Repeat geometry, material and plate derivations for a flexo print job.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::catalog::{ZCatalog, ZUnit};
use super::render::LayoutRender;
use crate::error::LayoutError;

/// Smallest advance gap the press tolerates between two repeats.
pub const MIN_ADVANCE_GAP_MM: f64 = 2.0;

/// Plate margin added across the mount width, in centimeters.
pub const PLATE_WIDTH_MARGIN_CM: f64 = 4.0;

/// Plate margin added along the circumference, in centimeters.
pub const PLATE_LENGTH_MARGIN_CM: f64 = 2.0;

/// Dimensions entered for a job, plus the chosen cylinder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSpec {
    pub cavity_width_mm: f64,
    pub cavity_gap_mm: f64,
    pub cavity_count: u32,
    pub repeat_length_mm: f64,
    pub repeats_per_revolution: u32,
    /// Z unit code of the selected cylinder.
    pub unit: u16,
    pub color_count: u32,
    pub order_quantity: u64,
}

impl LayoutSpec {
    /// Rejects geometry that cannot be derived.
    pub fn validate(&self) -> Result<(), LayoutError> {
        positive("cavity_width_mm", self.cavity_width_mm)?;
        non_negative("cavity_gap_mm", self.cavity_gap_mm)?;
        at_least_one("cavity_count", u64::from(self.cavity_count))?;
        positive("repeat_length_mm", self.repeat_length_mm)?;
        at_least_one("repeats_per_revolution", u64::from(self.repeats_per_revolution))?;
        at_least_one("color_count", u64::from(self.color_count))?;
        at_least_one("order_quantity", self.order_quantity)?;
        Ok(())
    }

    /// Width of all cavities across the cylinder, including the gaps between them.
    pub fn mount_width_mm(&self) -> f64 {
        let count = f64::from(self.cavity_count);
        let gaps = f64::from(self.cavity_count.saturating_sub(1));
        self.cavity_width_mm * count + self.cavity_gap_mm * gaps
    }

    /// One-line summary kept alongside the snapshot for operators.
    pub fn describe(&self, advance_gap_mm: f64) -> String {
        format!(
            "Width: {}mm (gap: {}mm) x {} cavs, Length: {}mm | Z{}, {} reps, advance gap: {:.2}mm",
            self.cavity_width_mm,
            self.cavity_gap_mm,
            self.cavity_count,
            self.repeat_length_mm,
            self.unit,
            self.repeats_per_revolution,
            advance_gap_mm
        )
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), LayoutError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidDimension { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), LayoutError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidDimension { field, value })
    }
}

fn at_least_one(field: &'static str, value: u64) -> Result<(), LayoutError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(LayoutError::InvalidDimension {
            field,
            value: value as f64,
        })
    }
}

/// Suggested cylinder for a repeat length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub unit: ZUnit,
    pub advance_gap_mm: f64,
    /// False when no cylinder leaves the minimum gap and the first catalog
    /// entry was returned instead. Callers should warn, not fail.
    pub feasible: bool,
}

/// Values derived from a [`LayoutSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub circumference_mm: f64,
    pub advance_gap_mm: f64,
    pub linear_meters: f64,
    pub mount_width_mm: f64,
    pub plate_area_cm2: f64,
}

/// Spec and derived values as written to a job's technical record.
///
/// Never recomputed after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    pub spec: LayoutSpec,
    pub metrics: LayoutMetrics,
    pub summary: String,
}

/// Picks the cylinder that leaves the smallest advance gap of at least
/// [`MIN_ADVANCE_GAP_MM`]. Ties go to the smaller unit code.
pub fn recommend_unit(
    repeat_length_mm: f64,
    repeats_per_revolution: u32,
    catalog: &ZCatalog,
) -> Result<Recommendation, LayoutError> {
    positive("repeat_length_mm", repeat_length_mm)?;
    at_least_one("repeats_per_revolution", u64::from(repeats_per_revolution))?;
    let first = catalog.first().ok_or(LayoutError::EmptyCatalog)?;

    let repeats = f64::from(repeats_per_revolution);
    let best = catalog
        .units()
        .iter()
        .map(|unit| (unit, unit.circumference_mm / repeats - repeat_length_mm))
        .filter(|(_, gap)| *gap >= MIN_ADVANCE_GAP_MM)
        .fold(None::<(&ZUnit, f64)>, |best, candidate| match best {
            Some((_, best_gap)) if best_gap <= candidate.1 => best,
            _ => Some(candidate),
        });

    match best {
        Some((unit, gap)) => Ok(Recommendation {
            unit: *unit,
            advance_gap_mm: gap,
            feasible: true,
        }),
        None => {
            let gap = first.circumference_mm / repeats - repeat_length_mm;
            warn!(
                repeat_length_mm,
                repeats_per_revolution,
                "no cylinder leaves a {MIN_ADVANCE_GAP_MM}mm advance gap, falling back to Z{}",
                first.code
            );
            Ok(Recommendation {
                unit: first,
                advance_gap_mm: gap,
                feasible: false,
            })
        }
    }
}

/// Stateless calculator bound to a cylinder catalog.
#[derive(Debug, Clone, Default)]
pub struct LayoutCalculator {
    catalog: ZCatalog,
}

impl LayoutCalculator {
    pub fn new(catalog: ZCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ZCatalog {
        &self.catalog
    }

    pub fn recommend_unit(
        &self,
        repeat_length_mm: f64,
        repeats_per_revolution: u32,
    ) -> Result<Recommendation, LayoutError> {
        recommend_unit(repeat_length_mm, repeats_per_revolution, &self.catalog)
    }

    /// Derives gap, material length and plate area for `spec`.
    pub fn derive(&self, spec: &LayoutSpec) -> Result<LayoutMetrics, LayoutError> {
        spec.validate()?;
        let unit = self.catalog.require(spec.unit)?;

        let circumference = unit.circumference_mm;
        let pitch = circumference / f64::from(spec.repeats_per_revolution);
        let mount_width = spec.mount_width_mm();
        let plate_base = (mount_width / 10.0 + PLATE_WIDTH_MARGIN_CM)
            * (circumference / 10.0 + PLATE_LENGTH_MARGIN_CM);

        let metrics = LayoutMetrics {
            circumference_mm: circumference,
            advance_gap_mm: pitch - spec.repeat_length_mm,
            linear_meters: spec.order_quantity as f64 * pitch / 1000.0,
            mount_width_mm: mount_width,
            plate_area_cm2: plate_base * f64::from(spec.color_count),
        };
        debug!(unit = spec.unit, ?metrics, "derived layout");
        Ok(metrics)
    }

    /// Derives and packages the values stored on a job at creation time.
    pub fn snapshot(&self, spec: &LayoutSpec) -> Result<LayoutSnapshot, LayoutError> {
        let metrics = self.derive(spec)?;
        Ok(LayoutSnapshot {
            summary: spec.describe(metrics.advance_gap_mm),
            spec: spec.clone(),
            metrics,
        })
    }

    /// Placement of every label and gap on one revolution, for drawing.
    pub fn render_layout(&self, spec: &LayoutSpec) -> Result<LayoutRender, LayoutError> {
        let metrics = self.derive(spec)?;
        Ok(LayoutRender::new(spec, &metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn sample_spec() -> LayoutSpec {
        LayoutSpec {
            cavity_width_mm: 50.0,
            cavity_gap_mm: 0.0,
            cavity_count: 4,
            repeat_length_mm: 80.0,
            repeats_per_revolution: 1,
            unit: 88,
            color_count: 2,
            order_quantity: 10_000,
        }
    }

    #[test]
    fn test_derive_reference_job() {
        let calc = LayoutCalculator::default();
        let metrics = calc.derive(&sample_spec()).unwrap();

        assert!(approx(metrics.circumference_mm, 279.4));
        assert!(approx(metrics.advance_gap_mm, 199.4));
        assert!(approx(metrics.mount_width_mm, 200.0));
        assert!(approx(metrics.linear_meters, 2794.0));
        assert!(approx(metrics.plate_area_cm2, 24.0 * 29.94 * 2.0));
    }

    #[test]
    fn test_mount_width_counts_inner_gaps_only() {
        let mut spec = sample_spec();
        spec.cavity_gap_mm = 3.0;
        assert!(approx(spec.mount_width_mm(), 209.0));

        spec.cavity_count = 1;
        assert!(approx(spec.mount_width_mm(), 50.0));
    }

    #[test]
    fn test_derive_is_deterministic() {
        let calc = LayoutCalculator::default();
        let spec = sample_spec();
        assert_eq!(calc.derive(&spec).unwrap(), calc.derive(&spec).unwrap());
    }

    #[test]
    fn test_multiple_repeats_split_the_circumference() {
        let calc = LayoutCalculator::default();
        let mut spec = sample_spec();
        spec.repeats_per_revolution = 3;
        let metrics = calc.derive(&spec).unwrap();

        let pitch = 279.4 / 3.0;
        assert!(approx(metrics.advance_gap_mm, pitch - 80.0));
        assert!(approx(metrics.linear_meters, 10_000.0 * pitch / 1000.0));
    }

    #[test]
    fn test_recommend_smallest_feasible_gap() {
        let catalog = ZCatalog::default();
        // Z63 = 200.025mm: two repeats of 95mm leave 5.0125mm.
        let rec = recommend_unit(95.0, 2, &catalog).unwrap();
        assert!(rec.feasible);
        assert_eq!(rec.unit.code, 63);
        assert!(approx(rec.advance_gap_mm, 200.025 / 2.0 - 95.0));
    }

    #[test]
    fn test_recommend_skips_units_below_margin() {
        let catalog = ZCatalog::default();
        // Z88 leaves 1.4mm (rejected), Z90 leaves 7.75mm.
        let rec = recommend_unit(278.0, 1, &catalog).unwrap();
        assert!(rec.feasible);
        assert_eq!(rec.unit.code, 90);
        assert!(rec.advance_gap_mm >= MIN_ADVANCE_GAP_MM);
    }

    #[test]
    fn test_recommend_depends_on_repeat_count() {
        let catalog = ZCatalog::from_codes(&[140, 70]);
        let rec = recommend_unit(100.0, 1, &catalog).unwrap();
        assert_eq!(rec.unit.code, 70);
        let rec = recommend_unit(100.0, 2, &catalog).unwrap();
        assert_eq!(rec.unit.code, 140);
    }

    #[test]
    fn test_recommend_falls_back_to_first_unit() {
        let catalog = ZCatalog::default();
        let rec = recommend_unit(500.0, 1, &catalog).unwrap();
        assert!(!rec.feasible);
        assert_eq!(rec.unit.code, 63);
        assert!(rec.advance_gap_mm < 0.0);
    }

    #[test]
    fn test_recommend_never_negative_when_feasible_exists() {
        let catalog = ZCatalog::default();
        for length in (10..=400).step_by(7) {
            for repeats in 1..=6 {
                let rec = recommend_unit(f64::from(length), repeats, &catalog).unwrap();
                let any_feasible = catalog.units().iter().any(|u| {
                    u.circumference_mm / f64::from(repeats) - f64::from(length)
                        >= MIN_ADVANCE_GAP_MM
                });
                if any_feasible {
                    assert!(rec.feasible);
                    assert!(rec.advance_gap_mm >= MIN_ADVANCE_GAP_MM);
                }
            }
        }
    }

    #[test]
    fn test_recommend_rejects_zero_repeats() {
        let catalog = ZCatalog::default();
        match recommend_unit(80.0, 0, &catalog) {
            Err(LayoutError::InvalidDimension { field, .. }) => {
                assert_eq!(field, "repeats_per_revolution")
            }
            other => panic!("expected InvalidDimension, got {:?}", other),
        }
    }

    #[test]
    fn test_recommend_empty_catalog() {
        let catalog = ZCatalog::from_codes(&[]);
        assert_eq!(
            recommend_unit(80.0, 1, &catalog),
            Err(LayoutError::EmptyCatalog)
        );
    }

    #[test]
    fn test_derive_rejects_bad_dimensions() {
        let calc = LayoutCalculator::default();

        let mut spec = sample_spec();
        spec.cavity_width_mm = 0.0;
        assert!(matches!(
            calc.derive(&spec),
            Err(LayoutError::InvalidDimension { field: "cavity_width_mm", .. })
        ));

        let mut spec = sample_spec();
        spec.cavity_gap_mm = -1.0;
        assert!(matches!(
            calc.derive(&spec),
            Err(LayoutError::InvalidDimension { field: "cavity_gap_mm", .. })
        ));

        let mut spec = sample_spec();
        spec.repeat_length_mm = f64::NAN;
        assert!(matches!(
            calc.derive(&spec),
            Err(LayoutError::InvalidDimension { field: "repeat_length_mm", .. })
        ));

        let mut spec = sample_spec();
        spec.repeats_per_revolution = 0;
        assert!(matches!(
            calc.derive(&spec),
            Err(LayoutError::InvalidDimension { field: "repeats_per_revolution", .. })
        ));

        let mut spec = sample_spec();
        spec.order_quantity = 0;
        assert!(matches!(
            calc.derive(&spec),
            Err(LayoutError::InvalidDimension { field: "order_quantity", .. })
        ));
    }

    #[test]
    fn test_derive_rejects_unknown_unit() {
        let calc = LayoutCalculator::default();
        let mut spec = sample_spec();
        spec.unit = 87;
        assert_eq!(calc.derive(&spec), Err(LayoutError::UnknownUnit(87)));
    }

    #[test]
    fn test_snapshot_carries_summary() {
        let calc = LayoutCalculator::default();
        let snapshot = calc.snapshot(&sample_spec()).unwrap();
        assert_eq!(snapshot.spec, sample_spec());
        assert!(snapshot.summary.contains("Z88"));
        assert!(snapshot.summary.contains("advance gap: 199.40mm"));
    }
}
