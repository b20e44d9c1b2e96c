//! Time-indexed sample paths (§4.1): static, linear, natural cubic spline,
//! and constant-rate interpolation over a fixed number of scalar channels.
//!
//! `Path<3>` backs platform motion (channels x, y, z); `Path<2>` backs
//! platform rotation (channels azimuth, elevation).

use crate::error::GeometryError;
use crate::geo::{normalize_angle_2pi, S3, V3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathMode {
    Static,
    Linear,
    Cubic,
    /// Rotation-only: `channel(t) = (t * rate[i] + start[i]) mod 2*PI`.
    Constant { start: [f64; 2], rate: [f64; 2] },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample<const N: usize> {
    t: f64,
    v: [f64; N],
}

/// A time-indexed sequence of `N`-channel samples with pluggable interpolation.
#[derive(Debug, Clone)]
pub struct Path<const N: usize> {
    mode: PathMode,
    samples: Vec<Sample<N>>,
    dd: Option<Vec<[f64; N]>>,
    finalized: bool,
}

impl<const N: usize> Path<N> {
    pub fn new(mode: PathMode) -> Self {
        Self { mode, samples: Vec::new(), dd: None, finalized: false }
    }

    pub fn mode(&self) -> PathMode {
        self.mode
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Insert a sample keeping `samples` sorted by time. Stable on ties
    /// (new sample lands after any existing sample with the same `t`).
    pub fn add_sample(&mut self, t: f64, v: [f64; N]) {
        let pos = self.samples.iter().position(|s| s.t > t).unwrap_or(self.samples.len());
        self.samples.insert(pos, Sample { t, v });
        self.finalized = false;
    }

    fn min_samples(&self) -> usize {
        match self.mode {
            PathMode::Cubic => 3,
            _ => 1,
        }
    }

    /// Idempotent: calling finalize() again without an intervening add_sample
    /// is a no-op and produces the same queryable state.
    pub fn finalize(&mut self) -> Result<(), GeometryError> {
        if self.finalized {
            return Ok(());
        }
        if self.samples.len() < self.min_samples() {
            return Err(GeometryError::Underdetermined {
                have: self.samples.len(),
                need: self.min_samples(),
            });
        }
        if matches!(self.mode, PathMode::Cubic) {
            self.dd = Some(natural_cubic_dd(&self.samples));
        }
        self.finalized = true;
        Ok(())
    }

    pub fn sample_at(&self, t: f64) -> Result<[f64; N], GeometryError> {
        if !self.finalized {
            return Err(GeometryError::NotFinalized);
        }
        match self.mode {
            PathMode::Static => Ok(self.samples[0].v),
            PathMode::Linear => Ok(self.linear_at(t)),
            PathMode::Cubic => Ok(self.cubic_at(t)),
            PathMode::Constant { start, rate } => {
                let mut out = [0.0; N];
                for i in 0..N.min(2) {
                    out[i] = normalize_angle_2pi(t * rate[i] + start[i]);
                }
                Ok(out)
            }
        }
    }

    fn linear_at(&self, t: f64) -> [f64; N] {
        let first = &self.samples[0];
        let last = self.samples.last().unwrap();
        if t <= first.t {
            return first.v;
        }
        if t >= last.t {
            return last.v;
        }
        let idx = self.samples.partition_point(|s| s.t <= t);
        let a = &self.samples[idx - 1];
        let b = &self.samples[idx];
        let u = (t - a.t) / (b.t - a.t);
        let mut out = [0.0; N];
        for i in 0..N {
            out[i] = (1.0 - u) * a.v[i] + u * b.v[i];
        }
        out
    }

    fn cubic_at(&self, t: f64) -> [f64; N] {
        let first = &self.samples[0];
        let last = self.samples.last().unwrap();
        if t <= first.t {
            return first.v;
        }
        if t >= last.t {
            return last.v;
        }
        let dd = self.dd.as_ref().expect("finalize() computes dd for Cubic mode");
        let idx = self.samples.partition_point(|s| s.t <= t);
        let a = &self.samples[idx - 1];
        let b = &self.samples[idx];
        let h = b.t - a.t;
        let u = (t - a.t) / h;
        let da = &dd[idx - 1];
        let db = &dd[idx];
        let mut out = [0.0; N];
        for i in 0..N {
            // Natural cubic spline evaluation from the precomputed second-derivative table.
            let term_a = a.v[i] * (1.0 - u);
            let term_b = b.v[i] * u;
            let term_c = ((1.0 - u).powi(3) - (1.0 - u)) * da[i] * h * h / 6.0;
            let term_d = (u.powi(3) - u) * db[i] * h * h / 6.0;
            out[i] = term_a + term_b + term_c + term_d;
        }
        out
    }
}

/// Standard tridiagonal solve for a natural cubic spline's second-derivative
/// table, done independently per channel.
fn natural_cubic_dd<const N: usize>(samples: &[Sample<N>]) -> Vec<[f64; N]> {
    let n = samples.len();
    let mut dd = vec![[0.0; N]; n];
    for ch in 0..N {
        let mut u = vec![0.0; n];
        // dd[0] and dd[n-1] stay 0.0 (natural boundary condition).
        for i in 1..n - 1 {
            let t_im1 = samples[i - 1].t;
            let t_i = samples[i].t;
            let t_ip1 = samples[i + 1].t;
            let sig = (t_i - t_im1) / (t_ip1 - t_im1);
            let p = sig * dd[i - 1][ch] + 2.0;
            dd[i][ch] = (sig - 1.0) / p;
            let d1 = (samples[i + 1].v[ch] - samples[i].v[ch]) / (t_ip1 - t_i);
            let d0 = (samples[i].v[ch] - samples[i - 1].v[ch]) / (t_i - t_im1);
            u[i] = (6.0 * (d1 - d0) / (t_ip1 - t_im1) - sig * u[i - 1]) / p;
        }
        for i in (0..n - 1).rev() {
            dd[i][ch] = dd[i][ch] * dd[i + 1][ch] + u[i];
        }
    }
    dd
}

pub type MotionPath = Path<3>;
pub type RotationPath = Path<2>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedCoord {
    pub t: f64,
    pub pos: V3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedRot {
    pub t: f64,
    pub az: f64,
    pub el: f64,
}

impl MotionPath {
    pub fn add_coord(&mut self, c: TimedCoord) {
        self.add_sample(c.t, [c.pos.x, c.pos.y, c.pos.z]);
    }

    pub fn position(&self, t: f64) -> Result<V3, GeometryError> {
        let v = self.sample_at(t)?;
        Ok(V3::new(v[0], v[1], v[2]))
    }
}

impl RotationPath {
    pub fn add_rot(&mut self, r: TimedRot) {
        self.add_sample(r.t, [r.az, r.el]);
    }

    pub fn orientation(&self, t: f64) -> Result<S3, GeometryError> {
        let v = self.sample_at(t)?;
        Ok(S3::new(1.0, v[0], v[1]))
    }
}
