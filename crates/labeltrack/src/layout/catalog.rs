//! Cylinder catalog: Z unit codes and the circumference each one prints.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Gear pitch of a print cylinder: one eighth of an inch, in millimeters.
pub const Z_PITCH_MM: f64 = 3.175;

/// Z units stocked by the plant.
pub const DEFAULT_UNITS: &[u16] = &[63, 70, 76, 80, 82, 84, 85, 88, 90, 96, 106, 114, 120, 130];

/// A single cylinder size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZUnit {
    /// Number of gear teeth.
    pub code: u16,
    /// Printed length of one revolution, rounded to the micron.
    pub circumference_mm: f64,
}

impl ZUnit {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            circumference_mm: circumference_for(code),
        }
    }
}

/// Circumference of a cylinder with `code` teeth.
pub fn circumference_for(code: u16) -> f64 {
    round_to(f64::from(code) * Z_PITCH_MM, 3)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Ordered set of admissible cylinders.
///
/// Units are kept sorted by code, so "catalog order" and "smallest code"
/// are the same thing when breaking ties.
#[derive(Debug, Clone, PartialEq)]
pub struct ZCatalog {
    units: Vec<ZUnit>,
}

impl ZCatalog {
    /// Builds a catalog from unit codes. Duplicates and zero codes are dropped.
    pub fn from_codes(codes: &[u16]) -> Self {
        let mut codes: Vec<u16> = codes.iter().copied().filter(|c| *c > 0).collect();
        codes.sort_unstable();
        codes.dedup();
        Self {
            units: codes.into_iter().map(ZUnit::new).collect(),
        }
    }

    pub fn units(&self) -> &[ZUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn first(&self) -> Option<ZUnit> {
        self.units.first().copied()
    }

    pub fn get(&self, code: u16) -> Option<ZUnit> {
        self.units.iter().find(|u| u.code == code).copied()
    }

    /// Looks up a unit, failing if the catalog does not stock it.
    pub fn require(&self, code: u16) -> Result<ZUnit, LayoutError> {
        self.get(code).ok_or(LayoutError::UnknownUnit(code))
    }
}

impl Default for ZCatalog {
    fn default() -> Self {
        Self::from_codes(DEFAULT_UNITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circumference_uses_eighth_inch_pitch() {
        assert_eq!(circumference_for(88), 279.4);
        assert_eq!(circumference_for(63), 200.025);
        assert_eq!(circumference_for(130), 412.75);
    }

    #[test]
    fn test_default_catalog_contents() {
        let catalog = ZCatalog::default();
        assert_eq!(catalog.len(), DEFAULT_UNITS.len());
        assert_eq!(catalog.first().unwrap().code, 63);
        assert!(catalog.get(88).is_some());
        assert!(catalog.get(87).is_none());
    }

    #[test]
    fn test_from_codes_sorts_and_dedups() {
        let catalog = ZCatalog::from_codes(&[96, 0, 70, 96, 63]);
        let codes: Vec<u16> = catalog.units().iter().map(|u| u.code).collect();
        assert_eq!(codes, vec![63, 70, 96]);
    }

    #[test]
    fn test_require_unknown_unit() {
        let catalog = ZCatalog::default();
        match catalog.require(99) {
            Err(LayoutError::UnknownUnit(99)) => {}
            other => panic!("expected UnknownUnit, got {:?}", other),
        }
    }
}
