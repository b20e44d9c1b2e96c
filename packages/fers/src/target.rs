//! Targets and RCS models (spec §4.3).

use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Gamma};

use fers_types::{InterpSet, S3};

use crate::error::RuntimeError;

/// Statistical RCS multiplier model, seeded independently from a master seed
/// at construction (spec §4.3).
pub enum RcsModel {
    Constant,
    /// Swerling I/II: exponential (chi-square, 2 DoF), mean 1.
    SwerlingExpo { dist: Exp<f64>, rng: rand::rngs::StdRng },
    /// Swerling III/IV: gamma, shape k=2, mean 1.
    SwerlingGamma2 { dist: Gamma<f64>, rng: rand::rngs::StdRng },
}

impl RcsModel {
    pub fn constant() -> Self {
        RcsModel::Constant
    }

    pub fn swerling_expo(seed: u64) -> Self {
        RcsModel::SwerlingExpo {
            dist: Exp::new(1.0).expect("rate 1.0 is valid"),
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    pub fn swerling_gamma2(seed: u64) -> Self {
        RcsModel::SwerlingGamma2 {
            // shape=2, scale=0.5 => mean 1
            dist: Gamma::new(2.0, 0.5).expect("shape/scale are valid"),
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    pub fn sample(&mut self) -> f64 {
        match self {
            RcsModel::Constant => 1.0,
            RcsModel::SwerlingExpo { dist, rng } => dist.sample(rng),
            RcsModel::SwerlingGamma2 { dist, rng } => dist.sample(rng),
        }
    }
}

pub trait Target {
    fn rcs(&mut self, in_angle: S3, out_angle: S3, platform_orientation: S3) -> Result<f64, RuntimeError>;
}

/// Isotropic target: `rcs = sigma0 * model.sample()` (model optional, default 1.0).
pub struct IsoTarget {
    pub sigma0: f64,
    pub model: Option<RcsModel>,
}

impl IsoTarget {
    pub fn new(sigma0: f64, model: Option<RcsModel>) -> Self {
        Self { sigma0, model }
    }
}

impl Target for IsoTarget {
    fn rcs(&mut self, _in_angle: S3, _out_angle: S3, _platform_orientation: S3) -> Result<f64, RuntimeError> {
        let mult = self.model.as_mut().map(RcsModel::sample).unwrap_or(1.0);
        Ok(self.sigma0 * mult)
    }
}

/// Bistatic file-backed target: separable azimuth/elevation RCS tables
/// looked up against the half-bisector angle in the target's local frame
/// (spec §4.3 steps 1-4).
pub struct FileTarget {
    az_table: InterpSet,
    el_table: InterpSet,
    az_range: Option<(f64, f64)>,
    el_range: Option<(f64, f64)>,
    /// When false, an angle outside the table range is `RcsUnavailable`
    /// rather than clamped to the nearest edge.
    pub clamp_outside_table: bool,
    pub model: Option<RcsModel>,
}

impl FileTarget {
    pub fn new(az_table: InterpSet, el_table: InterpSet, clamp_outside_table: bool, model: Option<RcsModel>) -> Self {
        Self { az_range: None, el_range: None, az_table, el_table, clamp_outside_table, model }
    }

    /// Record the table's x-range explicitly; required for `clamp_outside_table
    /// == false` to detect out-of-range lookups (InterpSet itself always clamps).
    pub fn with_ranges(mut self, az_range: (f64, f64), el_range: (f64, f64)) -> Self {
        self.az_range = Some(az_range);
        self.el_range = Some(el_range);
        self
    }

    fn lookup(table: &InterpSet, range: Option<(f64, f64)>, clamp: bool, x: f64) -> Result<f64, RuntimeError> {
        if !clamp {
            if let Some((lo, hi)) = range {
                if x < lo || x > hi {
                    return Err(RuntimeError::RcsUnavailable);
                }
            }
        }
        table.value(x).ok_or(RuntimeError::RcsUnavailable)
    }
}

impl Target for FileTarget {
    fn rcs(&mut self, in_angle: S3, out_angle: S3, platform_orientation: S3) -> Result<f64, RuntimeError> {
        let bisector = in_angle.add(&out_angle);
        let local = bisector.sub(&platform_orientation);

        let sigma_az = Self::lookup(&self.az_table, self.az_range, self.clamp_outside_table, local.azimuth / 2.0)?;
        let sigma_el = Self::lookup(&self.el_table, self.el_range, self.clamp_outside_table, local.elevation / 2.0)?;

        let mult = self.model.as_mut().map(RcsModel::sample).unwrap_or(1.0);
        Ok(sigma_az * sigma_el * mult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_target_default_multiplier_is_one() {
        let mut t = IsoTarget::new(4.0, None);
        let zero = S3::new(0.0, 0.0, 0.0);
        assert_eq!(t.rcs(zero, zero, zero).unwrap(), 4.0);
    }

    #[test]
    fn swerling_models_seeded_deterministically() {
        let mut a = RcsModel::swerling_expo(5);
        let mut b = RcsModel::swerling_expo(5);
        for _ in 0..10 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn file_target_out_of_range_without_clamp_is_unavailable() {
        let mut az = InterpSet::new();
        az.insert(-1.0, 1.0);
        az.insert(1.0, 1.0);
        let mut el = InterpSet::new();
        el.insert(-1.0, 1.0);
        el.insert(1.0, 1.0);
        let mut t = FileTarget::new(az, el, false, None).with_ranges((-1.0, 1.0), (-1.0, 1.0));
        let far = S3::new(1.0, 10.0, 0.0);
        let zero = S3::new(0.0, 0.0, 0.0);
        assert!(matches!(t.rcs(far, zero, zero), Err(RuntimeError::RcsUnavailable)));
    }
}
