//! Antenna patterns (spec §4.2): a pure function `(angle, reference,
//! wavelength) -> gain >= 0`. Off-boresight angle is the magnitude of the
//! spherical difference between the direction of interest and the antenna's
//! boresight orientation.

use fers_types::{InterpSet, S3};

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Scalar off-boresight angle (radians) combining azimuth and elevation offset.
fn off_boresight_angle(angle_to: &S3, reference: &S3) -> f64 {
    let diff = angle_to.sub(reference);
    (diff.azimuth * diff.azimuth + diff.elevation * diff.elevation).sqrt()
}

#[derive(Debug, Clone)]
pub enum AntennaPattern {
    Isotropic {
        gain: f64,
    },
    Sinc {
        g0: f64,
        alpha: f64,
        wavelength_dependent: bool,
    },
    Gauss {
        g0: f64,
        sigma: f64,
    },
    SquaredSinc {
        g0: f64,
        alpha: f64,
        wavelength_dependent: bool,
    },
    /// Tabulated elevation x azimuth from file: two separable 1-D tables
    /// keyed on off-boresight azimuth and elevation, combined multiplicatively.
    Tabulated {
        az: InterpSet,
        el: InterpSet,
        /// Per-off-boresight-angle receive noise temperature, when the source
        /// file carries one alongside its gain table.
        noise_temp: Option<InterpSet>,
    },
    /// A dense 2-D file pattern sampled on a rectangular az/el grid, bilinearly
    /// interpolated and clamped to the grid edges outside its range.
    File {
        table: Vec<Vec<f64>>,
        az_samples: Vec<f64>,
        el_samples: Vec<f64>,
        noise_temp: Option<InterpSet>,
    },
}

impl AntennaPattern {
    pub fn gain(&self, angle_to: &S3, reference: &S3, wavelength: f64) -> f64 {
        match self {
            AntennaPattern::Isotropic { gain } => gain.max(0.0),
            AntennaPattern::Sinc { g0, alpha, wavelength_dependent } => {
                let theta = off_boresight_angle(angle_to, reference);
                let a = if *wavelength_dependent { alpha / wavelength.max(1e-12) } else { *alpha };
                (g0 * sinc(a * theta).powi(2)).max(0.0)
            }
            AntennaPattern::Gauss { g0, sigma } => {
                let theta = off_boresight_angle(angle_to, reference);
                (g0 * (-(theta * theta) / (2.0 * sigma * sigma)).exp()).max(0.0)
            }
            AntennaPattern::SquaredSinc { g0, alpha, wavelength_dependent } => {
                let theta = off_boresight_angle(angle_to, reference);
                let a = if *wavelength_dependent { alpha / wavelength.max(1e-12) } else { *alpha };
                (g0 * sinc(a * theta).powi(4)).max(0.0)
            }
            AntennaPattern::Tabulated { az, el, .. } => {
                let diff = angle_to.sub(reference);
                let ga = az.value(diff.azimuth).unwrap_or(0.0);
                let ge = el.value(diff.elevation).unwrap_or(0.0);
                (ga * ge).max(0.0)
            }
            AntennaPattern::File { table, az_samples, el_samples, .. } => {
                let diff = angle_to.sub(reference);
                bilinear_table(table, az_samples, el_samples, diff.azimuth, diff.elevation).max(0.0)
            }
        }
    }

    /// Noise temperature at a given off-boresight angle (Kelvin). Flat
    /// unless the pattern carries its own per-angle table, keyed on the
    /// scalar off-boresight angle the same way `Sinc`/`Gauss` gain is.
    pub fn noise_temperature(&self, angle_to: &S3, reference: &S3, flat_temp: f64) -> f64 {
        let table = match self {
            AntennaPattern::Tabulated { noise_temp, .. } => noise_temp.as_ref(),
            AntennaPattern::File { noise_temp, .. } => noise_temp.as_ref(),
            _ => None,
        };
        match table {
            Some(t) => t.value(off_boresight_angle(angle_to, reference)).unwrap_or(flat_temp),
            None => flat_temp,
        }
    }
}

fn bilinear_table(table: &[Vec<f64>], az_samples: &[f64], el_samples: &[f64], az: f64, el: f64) -> f64 {
    if az_samples.is_empty() || el_samples.is_empty() {
        return 0.0;
    }
    let ai = clamped_index(az_samples, az);
    let ei = clamped_index(el_samples, el);
    let (a0, a1, au) = ai;
    let (e0, e1, eu) = ei;
    let v00 = table[a0][e0];
    let v01 = table[a0][e1];
    let v10 = table[a1][e0];
    let v11 = table[a1][e1];
    let v0 = v00 + (v01 - v00) * eu;
    let v1 = v10 + (v11 - v10) * eu;
    v0 + (v1 - v0) * au
}

/// Returns (lower index, upper index, fractional position) clamped to the
/// table's extent.
fn clamped_index(samples: &[f64], x: f64) -> (usize, usize, f64) {
    if x <= samples[0] {
        return (0, 0, 0.0);
    }
    let last = samples.len() - 1;
    if x >= samples[last] {
        return (last, last, 0.0);
    }
    let idx = samples.partition_point(|&s| s <= x);
    let lo = idx - 1;
    let u = (x - samples[lo]) / (samples[idx] - samples[lo]);
    (lo, idx, u)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isotropic_gain_constant_everywhere() {
        let a = AntennaPattern::Isotropic { gain: 2.0 };
        let boresight = S3::new(1.0, 0.0, 0.0);
        let off = S3::new(1.0, 1.2, 0.3);
        assert_eq!(a.gain(&boresight, &boresight, 0.03), 2.0);
        assert_eq!(a.gain(&off, &boresight, 0.03), 2.0);
    }

    #[test]
    fn sinc_peaks_at_boresight() {
        let a = AntennaPattern::Sinc { g0: 10.0, alpha: 4.0, wavelength_dependent: false };
        let boresight = S3::new(1.0, 0.0, 0.0);
        let off = S3::new(1.0, 0.3, 0.0);
        assert!((a.gain(&boresight, &boresight, 0.03) - 10.0).abs() < 1e-9);
        assert!(a.gain(&off, &boresight, 0.03) < 10.0);
    }

    #[test]
    fn gain_never_negative() {
        let a = AntennaPattern::Gauss { g0: 5.0, sigma: 0.1 };
        let boresight = S3::new(1.0, 0.0, 0.0);
        let far = S3::new(1.0, 3.0, 0.0);
        assert!(a.gain(&far, &boresight, 0.03) >= 0.0);
    }

    #[test]
    fn file_pattern_bilinear_interpolates_between_grid_points() {
        let a = AntennaPattern::File {
            table: vec![vec![0.0, 10.0], vec![20.0, 30.0]],
            az_samples: vec![0.0, 1.0],
            el_samples: vec![0.0, 1.0],
            noise_temp: None,
        };
        let boresight = S3::new(1.0, 0.0, 0.0);
        let mid = S3::new(1.0, 0.5, 0.5);
        assert!((a.gain(&mid, &boresight, 0.03) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn tabulated_noise_temperature_falls_back_to_flat_when_no_table() {
        let a = AntennaPattern::Tabulated { az: InterpSet::new(), el: InterpSet::new(), noise_temp: None };
        let boresight = S3::new(1.0, 0.0, 0.0);
        let off = S3::new(1.0, 0.7, 0.0);
        assert_eq!(a.noise_temperature(&off, &boresight, 290.0), 290.0);
    }

    #[test]
    fn tabulated_noise_temperature_uses_table_when_present() {
        let mut table = InterpSet::new();
        table.insert(0.0, 100.0);
        table.insert(1.0, 200.0);
        let a = AntennaPattern::Tabulated { az: InterpSet::new(), el: InterpSet::new(), noise_temp: Some(table) };
        let boresight = S3::new(1.0, 0.0, 0.0);
        let off = S3::new(1.0, 0.5, 0.0);
        assert!((a.noise_temperature(&off, &boresight, 290.0) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn isotropic_noise_temperature_is_always_flat() {
        let a = AntennaPattern::Isotropic { gain: 1.0 };
        let boresight = S3::new(1.0, 0.0, 0.0);
        let off = S3::new(1.0, 1.0, 0.0);
        assert_eq!(a.noise_temperature(&off, &boresight, 150.0), 150.0);
    }
}
