//! Plain data structs describing where things are on Mars.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::BuildingCategory;
use crate::ids::BuildingId;

/// Spherical surface coordinates, in radians.
///
/// `phi` is the polar angle (0 at the north pole, pi at the south pole) and
/// `theta` the longitude measured eastward from the prime meridian, in
/// `[0, 2pi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinates {
    /// Polar angle in radians.
    pub phi: f64,
    /// Longitude in radians.
    pub theta: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    pub const fn new(phi: f64, theta: f64) -> Self {
        Self { phi, theta }
    }

    /// Fraction of a full rotation east of the prime meridian, in `[0, 1)`.
    ///
    /// A longitude of exactly `2pi` has gone round the planet and counts as 0.
    pub fn rotation_fraction(&self) -> f64 {
        let fraction = self.theta.rem_euclid(TAU) / TAU;
        if fraction >= 1.0 || !fraction.is_finite() {
            0.0
        } else {
            fraction
        }
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::new(std::f64::consts::FRAC_PI_2, 0.0)
    }
}

/// A building that can host a group activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Venue {
    /// Building identifier.
    pub id: BuildingId,
    /// Display name.
    pub name: String,
    /// Functional category.
    pub category: BuildingCategory,
    /// Number of people the building can hold at once.
    pub capacity: u32,
    /// Whether the building is pressurized and has life support.
    pub has_life_support: bool,
}
