//! TOML scene configuration (spec §6): a flat, declarative description of
//! platforms, radar nodes, and targets, deserialized with `serde` +
//! `toml::from_str` (the same loading idiom the source's `FullConfig` uses)
//! and turned into a `World` arena by [`build_world`].

use std::collections::HashMap;
use std::sync::Arc;

use num_complex::Complex64;
use serde::Deserialize;

use fers_types::{MotionPath, PathMode, RotationPath, TimedCoord, TimedRot};

use crate::antenna::AntennaPattern;
use crate::error::{ConfigError, FersError};
use crate::platform::Platform;
use crate::radar::{Receiver, RxMode, Transmitter, TxMode};
use crate::signal::Signal;
use crate::target::{FileTarget, IsoTarget, RcsModel, Target};
use crate::timing::{ClockModelParams, Timing};
use crate::world::{ReceiverId, World, WorldConfig};

#[derive(Debug, Deserialize)]
pub struct SceneFile {
    pub world: WorldConfig,
    #[serde(default)]
    pub platforms: Vec<PlatformSpec>,
}

#[derive(Debug, Deserialize)]
pub struct PlatformSpec {
    pub name: String,
    pub motion: PathSpec,
    #[serde(default = "PathSpec::stationary_rotation")]
    pub rotation: PathSpec,
    #[serde(default)]
    pub transmitter: Option<TransmitterSpec>,
    #[serde(default)]
    pub receiver: Option<ReceiverSpec>,
    #[serde(default)]
    pub target: Option<TargetSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PathSpec {
    Static { waypoints: Vec<[f64; 2]> },
    Linear { waypoints: Vec<Vec<f64>> },
    Cubic { waypoints: Vec<Vec<f64>> },
    Constant { start: [f64; 2], rate: [f64; 2] },
}

impl PathSpec {
    fn stationary_rotation() -> Self {
        PathSpec::Static { waypoints: vec![[0.0, 0.0]] }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransmitterSpec {
    pub signal: SignalSpec,
    pub antenna: AntennaSpec,
    pub prf: f64,
    #[serde(default)]
    pub mode: TxModeSpec,
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default)]
    pub attached: Option<String>,
    #[serde(default)]
    pub cw_on_time: Option<f64>,
    #[serde(default)]
    pub cw_off_time: Option<f64>,
    pub timing: TimingSpec,
}

fn default_power() -> f64 {
    1.0
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxModeSpec {
    #[default]
    Pulsed,
    Cw,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalSpec {
    Cw { carrier: f64, duration: f64, amplitude: f64 },
    Chirp { carrier: f64, f0: f64, f1: f64, duration: f64, amplitude: f64 },
    /// A waveform prototype given sample-by-sample as `[re, im]` pairs,
    /// rather than generated from a canonical `cw`/`chirp` shape.
    Samples { samples: Vec<[f64; 2]>, rate: f64, carrier: f64 },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AntennaSpec {
    Isotropic { gain: f64 },
    Sinc { g0: f64, alpha: f64, #[serde(default)] wavelength_dependent: bool },
    Gauss { g0: f64, sigma: f64 },
    SquaredSinc { g0: f64, alpha: f64, #[serde(default)] wavelength_dependent: bool },
    Tabulated { az: Vec<[f64; 2]>, el: Vec<[f64; 2]>, #[serde(default)] noise_temp: Vec<[f64; 2]> },
    /// A dense 2-D file pattern: `table[i][j]` is the gain at
    /// `(az_samples[i], el_samples[j])`.
    File {
        table: Vec<Vec<f64>>,
        az_samples: Vec<f64>,
        el_samples: Vec<f64>,
        #[serde(default)]
        noise_temp: Vec<[f64; 2]>,
    },
}

fn interp_set_from_pairs(pairs: Vec<[f64; 2]>) -> Option<fers_types::InterpSet> {
    if pairs.is_empty() {
        return None;
    }
    let mut set = fers_types::InterpSet::new();
    for [x, y] in pairs {
        set.insert(x, y);
    }
    Some(set)
}

impl AntennaSpec {
    fn into_pattern(self) -> AntennaPattern {
        match self {
            AntennaSpec::Isotropic { gain } => AntennaPattern::Isotropic { gain },
            AntennaSpec::Sinc { g0, alpha, wavelength_dependent } => {
                AntennaPattern::Sinc { g0, alpha, wavelength_dependent }
            }
            AntennaSpec::Gauss { g0, sigma } => AntennaPattern::Gauss { g0, sigma },
            AntennaSpec::SquaredSinc { g0, alpha, wavelength_dependent } => {
                AntennaPattern::SquaredSinc { g0, alpha, wavelength_dependent }
            }
            AntennaSpec::Tabulated { az, el, noise_temp } => {
                let az = interp_set_from_pairs(az).unwrap_or_default();
                let el = interp_set_from_pairs(el).unwrap_or_default();
                AntennaPattern::Tabulated { az, el, noise_temp: interp_set_from_pairs(noise_temp) }
            }
            AntennaSpec::File { table, az_samples, el_samples, noise_temp } => AntennaPattern::File {
                table,
                az_samples,
                el_samples,
                noise_temp: interp_set_from_pairs(noise_temp),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TimingSpec {
    #[serde(default)]
    pub alphas: Vec<f64>,
    #[serde(default)]
    pub weights: Vec<f64>,
    #[serde(default)]
    pub phase0_stdev: f64,
    #[serde(default)]
    pub freq0_stdev: f64,
    pub seed: u64,
    #[serde(default)]
    pub sync_on_pulse: bool,
}

impl TimingSpec {
    fn into_timing(self, name: &str) -> Timing {
        let mut t = Timing::new(name, self.sync_on_pulse);
        t.set_prototype(ClockModelParams::new(self.alphas, self.weights, self.phase0_stdev, self.freq0_stdev), self.seed);
        t
    }
}

#[derive(Debug, Deserialize)]
pub struct ReceiverSpec {
    #[serde(default)]
    pub mode: RxModeSpec,
    pub noise_temperature: f64,
    pub window_length: f64,
    pub window_prf: f64,
    #[serde(default)]
    pub window_skip: f64,
    pub antenna: AntennaSpec,
    #[serde(default = "default_seed")]
    pub rng_seed: u64,
    pub timing: TimingSpec,
    #[serde(default)]
    pub snr_threshold: Option<f64>,
    #[serde(default)]
    pub high_water_mark: Option<usize>,
}

fn default_seed() -> u64 {
    0
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RxModeSpec {
    #[default]
    Monostatic,
    Bistatic,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSpec {
    Iso {
        sigma0: f64,
        #[serde(default)]
        rcs_model: RcsModelSpec,
    },
    File {
        az_table: Vec<[f64; 2]>,
        el_table: Vec<[f64; 2]>,
        #[serde(default)]
        clamp_outside_table: bool,
        #[serde(default)]
        rcs_model: RcsModelSpec,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RcsModelSpec {
    #[default]
    None,
    Constant,
    SwerlingExpo {
        seed: u64,
    },
    SwerlingGamma2 {
        seed: u64,
    },
}

impl RcsModelSpec {
    fn into_model(self) -> Option<RcsModel> {
        match self {
            RcsModelSpec::None => None,
            RcsModelSpec::Constant => Some(RcsModel::constant()),
            RcsModelSpec::SwerlingExpo { seed } => Some(RcsModel::swerling_expo(seed)),
            RcsModelSpec::SwerlingGamma2 { seed } => Some(RcsModel::swerling_gamma2(seed)),
        }
    }
}

/// Build a `World` from a parsed scene. Two passes: platforms + receivers
/// first (so transmitters can resolve `attached` by receiver name), then
/// transmitters and targets.
pub fn build_world(scene: SceneFile) -> Result<World, FersError> {
    let rate = scene.world.rate();
    let mut world = World::new(scene.world);

    let mut receiver_names: HashMap<String, ReceiverId> = HashMap::new();
    let mut platform_ids = Vec::with_capacity(scene.platforms.len());

    for spec in &scene.platforms {
        let motion = motion_path_from_spec(&spec.motion)?;
        let rotation = rotation_path_from_spec(&spec.rotation)?;
        let mut platform = Platform::new(spec.name.clone(), motion, rotation);
        platform.finalize()?;
        let pid = world.add_platform(platform);
        platform_ids.push(pid);

        if let Some(rx_spec) = &spec.receiver {
            let antenna = clone_antenna_spec(&rx_spec.antenna).into_pattern();
            let mode = match rx_spec.mode {
                RxModeSpec::Monostatic => RxMode::Monostatic,
                RxModeSpec::Bistatic => RxMode::Bistatic,
            };
            let mut rx = Receiver::new(
                spec.name.clone(),
                pid,
                mode,
                rx_spec.noise_temperature,
                rx_spec.window_length,
                rx_spec.window_prf,
                rx_spec.window_skip,
                antenna,
                rate,
                rx_spec.rng_seed,
            )?;
            if let Some(threshold) = rx_spec.snr_threshold {
                rx = rx.with_snr_threshold(threshold);
            }
            if let Some(mark) = rx_spec.high_water_mark {
                rx = rx.with_high_water_mark(mark);
            }
            *rx.timing.get_mut().unwrap() = clone_timing_spec(&rx_spec.timing).into_timing(&spec.name);
            let rid = world.add_receiver(rx);
            receiver_names.insert(spec.name.clone(), rid);
        }
    }

    for (i, spec) in scene.platforms.iter().enumerate() {
        let pid = platform_ids[i];

        if let Some(tx_spec) = &spec.transmitter {
            let signal = Arc::new(signal_from_spec(&tx_spec.signal));
            let antenna = clone_antenna_spec(&tx_spec.antenna).into_pattern();
            let mode = match tx_spec.mode {
                TxModeSpec::Pulsed => TxMode::Pulsed,
                TxModeSpec::Cw => TxMode::Cw,
            };
            let mut tx = Transmitter::new(spec.name.clone(), pid, signal, antenna, tx_spec.prf, rate, mode)?
                .with_power(tx_spec.power);
            tx.timing = Some(clone_timing_spec(&tx_spec.timing).into_timing(&spec.name));
            tx.cw_on_time = tx_spec.cw_on_time;
            tx.cw_off_time = tx_spec.cw_off_time;
            if let Some(name) = &tx_spec.attached {
                let rid = receiver_names
                    .get(name)
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownReceiver(name.clone()))?;
                tx.attached = Some(rid);
            }
            world.add_transmitter(tx);
        }

        if let Some(target_spec) = &spec.target {
            let target: Box<dyn Target> = match target_spec {
                TargetSpec::Iso { sigma0, rcs_model } => {
                    Box::new(IsoTarget::new(*sigma0, clone_rcs_spec(rcs_model).into_model()))
                }
                TargetSpec::File { az_table, el_table, clamp_outside_table, rcs_model } => {
                    let mut az = fers_types::InterpSet::new();
                    let mut az_lo = f64::INFINITY;
                    let mut az_hi = f64::NEG_INFINITY;
                    for [x, y] in az_table {
                        az.insert(*x, *y);
                        az_lo = az_lo.min(*x);
                        az_hi = az_hi.max(*x);
                    }
                    let mut el = fers_types::InterpSet::new();
                    let mut el_lo = f64::INFINITY;
                    let mut el_hi = f64::NEG_INFINITY;
                    for [x, y] in el_table {
                        el.insert(*x, *y);
                        el_lo = el_lo.min(*x);
                        el_hi = el_hi.max(*x);
                    }
                    Box::new(
                        FileTarget::new(az, el, *clamp_outside_table, clone_rcs_spec(rcs_model).into_model())
                            .with_ranges((az_lo, az_hi), (el_lo, el_hi)),
                    )
                }
            };
            world.add_target(pid, target);
        }
    }

    Ok(world)
}

fn motion_path_from_spec(spec: &PathSpec) -> Result<MotionPath, ConfigError> {
    match spec {
        PathSpec::Static { waypoints } => {
            let mut p = MotionPath::new(PathMode::Static);
            for w in waypoints {
                p.add_coord(TimedCoord { t: 0.0, pos: fers_types::V3::new(w[0], w[1], 0.0) });
            }
            Ok(p)
        }
        PathSpec::Linear { waypoints } => {
            let mut p = MotionPath::new(PathMode::Linear);
            for w in waypoints {
                p.add_coord(TimedCoord { t: w[0], pos: fers_types::V3::new(w[1], w[2], w[3]) });
            }
            Ok(p)
        }
        PathSpec::Cubic { waypoints } => {
            let mut p = MotionPath::new(PathMode::Cubic);
            for w in waypoints {
                p.add_coord(TimedCoord { t: w[0], pos: fers_types::V3::new(w[1], w[2], w[3]) });
            }
            Ok(p)
        }
        PathSpec::Constant { start, rate } => {
            let mut p = MotionPath::new(PathMode::Constant { start: *start, rate: *rate });
            p.add_coord(TimedCoord { t: 0.0, pos: fers_types::V3::ZERO });
            Ok(p)
        }
    }
}

fn rotation_path_from_spec(spec: &PathSpec) -> Result<RotationPath, ConfigError> {
    match spec {
        PathSpec::Static { waypoints } => {
            let mut p = RotationPath::new(PathMode::Static);
            for w in waypoints {
                p.add_rot(TimedRot { t: 0.0, az: w[0], el: w[1] });
            }
            Ok(p)
        }
        PathSpec::Linear { waypoints } => {
            let mut p = RotationPath::new(PathMode::Linear);
            for w in waypoints {
                p.add_rot(TimedRot { t: w[0], az: w[1], el: w[2] });
            }
            Ok(p)
        }
        PathSpec::Cubic { waypoints } => {
            let mut p = RotationPath::new(PathMode::Cubic);
            for w in waypoints {
                p.add_rot(TimedRot { t: w[0], az: w[1], el: w[2] });
            }
            Ok(p)
        }
        PathSpec::Constant { start, rate } => {
            let mut p = RotationPath::new(PathMode::Constant { start: *start, rate: *rate });
            p.add_rot(TimedRot { t: 0.0, az: 0.0, el: 0.0 });
            Ok(p)
        }
    }
}

fn signal_from_spec(spec: &SignalSpec) -> Signal {
    match spec {
        SignalSpec::Cw { carrier, duration, amplitude } => {
            Signal::cw(*carrier * 16.0, *carrier, *duration, *amplitude)
        }
        SignalSpec::Chirp { carrier, f0, f1, duration, amplitude } => {
            Signal::chirp(carrier.max(f0.max(*f1)) * 4.0, *carrier, *f0, *f1, *duration, *amplitude)
        }
        SignalSpec::Samples { samples, rate, carrier } => {
            let samples = samples.iter().map(|&[re, im]| Complex64::new(re, im)).collect();
            Signal::from_samples(samples, *rate, *carrier)
        }
    }
}

// `AntennaSpec`/`TimingSpec`/`RcsModelSpec` aren't `Clone` (no need for it in
// the deserialized value itself); these helpers exist only because the world
// is built from `&SceneFile` while the spec types are consumed by value below.
fn clone_antenna_spec(spec: &AntennaSpec) -> AntennaSpec {
    match spec {
        AntennaSpec::Isotropic { gain } => AntennaSpec::Isotropic { gain: *gain },
        AntennaSpec::Sinc { g0, alpha, wavelength_dependent } => {
            AntennaSpec::Sinc { g0: *g0, alpha: *alpha, wavelength_dependent: *wavelength_dependent }
        }
        AntennaSpec::Gauss { g0, sigma } => AntennaSpec::Gauss { g0: *g0, sigma: *sigma },
        AntennaSpec::SquaredSinc { g0, alpha, wavelength_dependent } => {
            AntennaSpec::SquaredSinc { g0: *g0, alpha: *alpha, wavelength_dependent: *wavelength_dependent }
        }
        AntennaSpec::Tabulated { az, el, noise_temp } => {
            AntennaSpec::Tabulated { az: az.clone(), el: el.clone(), noise_temp: noise_temp.clone() }
        }
        AntennaSpec::File { table, az_samples, el_samples, noise_temp } => AntennaSpec::File {
            table: table.clone(),
            az_samples: az_samples.clone(),
            el_samples: el_samples.clone(),
            noise_temp: noise_temp.clone(),
        },
    }
}

fn clone_timing_spec(spec: &TimingSpec) -> TimingSpec {
    TimingSpec {
        alphas: spec.alphas.clone(),
        weights: spec.weights.clone(),
        phase0_stdev: spec.phase0_stdev,
        freq0_stdev: spec.freq0_stdev,
        seed: spec.seed,
        sync_on_pulse: spec.sync_on_pulse,
    }
}

fn clone_rcs_spec(spec: &RcsModelSpec) -> RcsModelSpec {
    match spec {
        RcsModelSpec::None => RcsModelSpec::None,
        RcsModelSpec::Constant => RcsModelSpec::Constant,
        RcsModelSpec::SwerlingExpo { seed } => RcsModelSpec::SwerlingExpo { seed: *seed },
        RcsModelSpec::SwerlingGamma2 { seed } => RcsModelSpec::SwerlingGamma2 { seed: *seed },
    }
}
