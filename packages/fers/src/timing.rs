//! Per-radar timing source and colored-noise clock model (spec §4.4).
//!
//! `ClockModel` approximates a power-law phase-noise process as a weighted
//! sum of leaky-integrator components, one per `(alpha, weight)` pair: a
//! leak coefficient near 0 behaves like white noise (alpha ~ 0), a leak
//! coefficient near 1 behaves like a random walk (alpha ~ 2), interpolating
//! for the flicker-noise case in between. The generator's only source of
//! randomness is the seeded `rng`, so `skip_samples(n)` followed by
//! `get_next_sample()` is bit-for-bit identical to calling
//! `get_next_sample()` `n + 1` times (spec §8 clock determinism law).

use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::error::RuntimeError;

#[derive(Debug, Clone)]
pub struct ClockModelParams {
    pub alphas: Vec<f64>,
    pub weights: Vec<f64>,
    /// Stdev of the one-shot initial phase offset draw, radians.
    pub phase0_stdev: f64,
    /// Stdev of the one-shot initial frequency offset draw, Hz.
    pub freq0_stdev: f64,
}

impl ClockModelParams {
    pub fn new(alphas: Vec<f64>, weights: Vec<f64>, phase0_stdev: f64, freq0_stdev: f64) -> Self {
        Self { alphas, weights, phase0_stdev, freq0_stdev }
    }
}

#[derive(Debug)]
pub struct ClockModel {
    weights: Vec<f64>,
    coeffs: Vec<f64>,
    state: Vec<f64>,
    freq_offset: f64,
    phase: f64,
    normal: Normal<f64>,
    rng: rand::rngs::StdRng,
}

impl ClockModel {
    pub fn new(params: &ClockModelParams, seed: u64) -> Self {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).expect("unit normal is always valid");

        let phase0 = if params.phase0_stdev > 0.0 {
            normal.sample(&mut rng) * params.phase0_stdev
        } else {
            0.0
        };
        let freq0 = if params.freq0_stdev > 0.0 {
            normal.sample(&mut rng) * params.freq0_stdev
        } else {
            0.0
        };

        let coeffs = params.alphas.iter().map(|a| (a / 4.0).clamp(0.0, 0.999)).collect();

        Self {
            weights: params.weights.clone(),
            coeffs,
            state: vec![0.0; params.alphas.len()],
            freq_offset: freq0,
            phase: phase0,
            normal,
            rng,
        }
    }

    fn advance(&mut self) -> f64 {
        let mut dev = 0.0;
        for i in 0..self.state.len() {
            let white = self.normal.sample(&mut self.rng);
            self.state[i] = self.coeffs[i] * self.state[i] + white;
            dev += self.weights[i] * self.state[i];
        }
        self.phase += self.freq_offset + dev;
        self.phase
    }

    pub fn get_next_sample(&mut self) -> f64 {
        self.advance()
    }

    pub fn skip_samples(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }
}

/// One clock source per radar: owns its `ClockModel` instance plus the
/// prototype parameters and seed needed to reconstruct a fresh one.
#[derive(Debug)]
pub struct Timing {
    pub name: String,
    seed: Option<u64>,
    prototype: Option<ClockModelParams>,
    /// When true, the receiver rebases its clock noise state at the start
    /// of every window (spec §4.4 sync-on-pulse).
    pub sync_on_pulse: bool,
    model: Option<ClockModel>,
}

impl Timing {
    pub fn new(name: impl Into<String>, sync_on_pulse: bool) -> Self {
        Self { name: name.into(), seed: None, prototype: None, sync_on_pulse, model: None }
    }

    pub fn set_prototype(&mut self, params: ClockModelParams, seed: u64) {
        self.model = Some(ClockModel::new(&params, seed));
        self.prototype = Some(params);
        self.seed = Some(seed);
    }

    pub fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    pub fn next_sample(&mut self) -> Result<f64, RuntimeError> {
        self.model.as_mut().map(ClockModel::get_next_sample).ok_or(RuntimeError::UninitializedTiming)
    }

    /// Rebuild a fresh `ClockModel` from `(prototype, seed)` rather than
    /// copying the live model's state (spec §9 design note).
    pub fn clone_from_prototype(&self) -> Result<Timing, RuntimeError> {
        let (proto, seed) = match (&self.prototype, self.seed) {
            (Some(p), Some(s)) => (p.clone(), s),
            _ => return Err(RuntimeError::UninitializedTiming),
        };
        let mut t = Timing::new(self.name.clone(), self.sync_on_pulse);
        t.set_prototype(proto, seed);
        Ok(t)
    }

    /// Reset this timing's clock noise state from its own prototype, used at
    /// window open when `sync_on_pulse` is set.
    pub fn resync(&mut self) -> Result<(), RuntimeError> {
        let (proto, seed) = match (&self.prototype, self.seed) {
            (Some(p), Some(s)) => (p.clone(), s),
            _ => return Err(RuntimeError::UninitializedTiming),
        };
        self.model = Some(ClockModel::new(&proto, seed));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ClockModelParams {
        ClockModelParams::new(vec![0.0, 2.0], vec![1e-9, 1e-10], 0.0, 0.0)
    }

    #[test]
    fn identical_seed_and_params_are_deterministic() {
        let mut a = ClockModel::new(&params(), 42);
        let mut b = ClockModel::new(&params(), 42);
        for _ in 0..50 {
            assert_eq!(a.get_next_sample(), b.get_next_sample());
        }
    }

    #[test]
    fn skip_then_next_matches_repeated_next() {
        let mut a = ClockModel::new(&params(), 7);
        let mut b = ClockModel::new(&params(), 7);
        for _ in 0..10 {
            a.get_next_sample();
        }
        let a_next = a.get_next_sample();

        b.skip_samples(10);
        let b_next = b.get_next_sample();

        assert_eq!(a_next, b_next);
    }

    #[test]
    fn cloning_uninitialized_timing_fails() {
        let t = Timing::new("radar-a", false);
        assert_eq!(t.clone_from_prototype().unwrap_err(), RuntimeError::UninitializedTiming);
    }

    #[test]
    fn resync_rebases_clock_to_its_initial_state() {
        let mut t = Timing::new("radar-a", true);
        t.set_prototype(params(), 5);
        let fresh_first = t.next_sample().unwrap();
        for _ in 0..20 {
            t.next_sample().unwrap();
        }
        t.resync().unwrap();
        assert_eq!(t.next_sample().unwrap(), fresh_first);
    }

    #[test]
    fn resync_without_prototype_fails() {
        let mut t = Timing::new("radar-a", true);
        assert_eq!(t.resync().unwrap_err(), RuntimeError::UninitializedTiming);
    }

    #[test]
    fn clone_from_prototype_reproduces_stream() {
        let mut t = Timing::new("radar-a", false);
        t.set_prototype(params(), 99);
        let a0 = t.next_sample().unwrap();
        let a1 = t.next_sample().unwrap();

        let mut clone = t.clone_from_prototype().unwrap();
        let b0 = clone.next_sample().unwrap();
        let b1 = clone.next_sample().unwrap();

        assert_eq!(a0, b0);
        assert_eq!(a1, b1);
    }
}
