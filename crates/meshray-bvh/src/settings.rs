//! Query settings.

use meshray_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{BvhError, Result};

/// Tunables for BVH queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhSettings {
    /// Directions of the two rays cast by the containment test.
    ///
    /// Neither should be axis aligned, and they must not be parallel.
    pub containment_probes: [[f64; 3]; 2],
    /// Tolerance of the ray-triangle test. Determinants below it count as
    /// parallel, and hits closer than it to the ray origin are ignored.
    pub triangle_epsilon: f64,
}

impl Default for BvhSettings {
    fn default() -> Self {
        Self {
            containment_probes: [[1.2, 1.1, 0.1], [0.2, -1.1, 0.1]],
            triangle_epsilon: 1e-9,
        }
    }
}

impl BvhSettings {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !self.triangle_epsilon.is_finite() || self.triangle_epsilon < 0.0 {
            return Err(BvhError::InvalidSettings(format!(
                "triangle_epsilon must be finite and non-negative, got {}",
                self.triangle_epsilon
            )));
        }
        let [a, b] = self.probe_directions();
        for (i, d) in [a, b].iter().enumerate() {
            if !d.iter().all(|c| c.is_finite()) || d.norm_squared() == 0.0 {
                return Err(BvhError::InvalidSettings(format!(
                    "containment probe {i} must be a finite non-zero vector"
                )));
            }
        }
        if a.cross(&b).norm() <= 1e-12 * a.norm() * b.norm() {
            return Err(BvhError::InvalidSettings(
                "containment probes must not be parallel".into(),
            ));
        }
        Ok(())
    }

    /// Containment probe directions as vectors.
    pub fn probe_directions(&self) -> [Vec3; 2] {
        self.containment_probes.map(Vec3::from)
    }
}
