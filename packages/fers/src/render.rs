//! Receiver rendering pipeline (spec §4.7, §5): per-receiver worker threads
//! drain the inbox and accumulate `Response`s into the receiver's I/Q
//! buffer; a single finalizer thread per receiver adds thermal noise,
//! decimates to the output sample rate, and hands the finished window to a
//! sink (the binary writer in [`crate::output`]).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use num_complex::Complex64;
use rand_distr::{Distribution, Normal};

use crate::radar::{InterferenceEntry, InterpPoint, Receiver, Response, ResponseKind};
use crate::world::WorldConfig;

/// Boltzmann constant, J/K.
const BOLTZMANN: f64 = 1.380649e-23;

/// A fully rendered, decimated window ready for the output sink.
pub struct RenderedWindow {
    pub window: u64,
    pub start: f64,
    pub rate: f64,
    pub samples: Vec<Complex64>,
}

/// Join handles for one receiver's worker pool plus its finalizer thread.
pub struct ReceiverRender {
    workers: Vec<JoinHandle<()>>,
    finalizer: JoinHandle<()>,
}

impl ReceiverRender {
    pub fn join(self) {
        for worker in self.workers {
            let _ = worker.join();
        }
        let _ = self.finalizer.join();
    }
}

/// Spawn `worker_count` renderer workers plus one finalizer thread for `rx`.
/// `sink` receives every finalized window and may be called from the
/// finalizer thread of any receiver started this way, so it must be
/// `Send + Sync`.
pub fn spawn<F>(rx: Arc<Receiver>, config: &WorldConfig, worker_count: usize, sink: F) -> ReceiverRender
where
    F: Fn(RenderedWindow) + Send + Sync + 'static,
{
    let rate = config.rate();
    let sink = Arc::new(sink);

    let workers = (0..worker_count.max(1))
        .map(|_| {
            let rx = Arc::clone(&rx);
            std::thread::spawn(move || worker_loop(rx, rate))
        })
        .collect();

    let finalizer = {
        let rx = Arc::clone(&rx);
        let sink = Arc::clone(&sink);
        let sample_rate = config.sample_rate;
        let oversample = config.oversample_ratio;
        std::thread::spawn(move || finalizer_loop(rx, rate, sample_rate, oversample, sink))
    };

    ReceiverRender { workers, finalizer }
}

/// Default worker count when the caller doesn't override it: hardware
/// concurrency, falling back to a single worker if it can't be read (spec §5).
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn worker_loop(rx: Arc<Receiver>, rate: f64) {
    loop {
        let responses = rx.drain_inbox();
        if responses.is_empty() {
            if rx.shutdown.load(Ordering::Acquire) {
                return;
            }
            continue;
        }
        for response in &responses {
            render_response(&rx, response, rate);
            rx.acknowledge(response.window);
        }
    }
}

/// Rendering steps 1-4 from spec §4.7, for one `Response` across its window's
/// output samples.
fn render_response(rx: &Receiver, response: &Response, rate: f64) {
    let samples = rx.window_sample_count(rate);
    let window_start = rx.window_start(response.window);
    let dt = 1.0 / rate;
    let signal_duration = response.signal.duration().max(1e-12);

    if let Some(threshold) = rx.snr_threshold() {
        check_interference(rx, response, window_start, threshold, rate);
    }

    for k in 0..samples {
        let t_k = window_start + k as f64 * dt;
        let Some((power, delay, phase)) = interpolate(&response.points, t_k) else { continue };
        if power <= 0.0 {
            continue;
        }

        let raw_local = t_k - delay - response.emit_time;
        let t_local = match response.kind {
            ResponseKind::Cw => raw_local.rem_euclid(signal_duration),
            ResponseKind::Pulse | ResponseKind::Direct => raw_local,
        };

        let waveform = response.signal.sample_at(t_local);
        let contribution = waveform * Complex64::from_polar(power.sqrt(), phase);
        rx.accumulate(response.window, samples, k, contribution);
    }
}

/// Record a response as interference when its peak SNR over the noise floor
/// (`kT·B`) falls below the receiver's configured threshold.
fn check_interference(rx: &Receiver, response: &Response, window_start: f64, threshold: f64, rate: f64) {
    let noise_floor = BOLTZMANN * rx.noise_temperature * rate;
    if noise_floor <= 0.0 {
        return;
    }
    let peak_power = response.points.iter().fold(0.0_f64, |acc, p| acc.max(p.power));
    if peak_power / noise_floor < threshold {
        rx.log_interference(InterferenceEntry { window: response.window, time: window_start, power: peak_power });
    }
}

/// Linearly interpolate `(power, delay, phase)` at `t`, clamping to the
/// nearest table endpoint outside `points`' span. `None` only when the
/// response carries no points at all (never emitted by the engine, but
/// guarded here rather than panicking on an empty table).
fn interpolate(points: &[InterpPoint], t: f64) -> Option<(f64, f64, f64)> {
    let first = points.first()?;
    let last = points.last()?;
    if t <= first.time {
        return Some((first.power, first.delay, first.phase));
    }
    if t >= last.time {
        return Some((last.power, last.delay, last.phase));
    }
    let idx = points.partition_point(|p| p.time <= t).saturating_sub(1).min(points.len() - 2);
    let a = &points[idx];
    let b = &points[idx + 1];
    let span = (b.time - a.time).max(1e-15);
    let frac = (t - a.time) / span;
    Some((
        a.power + (b.power - a.power) * frac,
        a.delay + (b.delay - a.delay) * frac,
        a.phase + (b.phase - a.phase) * frac,
    ))
}

fn finalizer_loop<F>(rx: Arc<Receiver>, rate: f64, sample_rate: f64, oversample: f64, sink: Arc<F>)
where
    F: Fn(RenderedWindow) + Send + Sync + 'static,
{
    loop {
        let job = rx.pop_finalizer_job();
        if job.is_shutdown() {
            return;
        }
        let raw_len = rx.window_sample_count(rate);
        let mut samples = rx.take_window(job.window, raw_len);
        add_thermal_noise(&rx, &mut samples, rate);
        let decimated = decimate(&samples, oversample);

        sink(RenderedWindow {
            window: job.window,
            start: rx.window_start(job.window),
            rate: sample_rate,
            samples: decimated,
        });
    }
}

/// Add complex thermal noise, `kT·B` with `B = rate` (spec §4.7).
fn add_thermal_noise(rx: &Receiver, samples: &mut [Complex64], rate: f64) {
    let power = BOLTZMANN * rx.noise_temperature * rate;
    if power <= 0.0 {
        return;
    }
    let sigma = (power / 2.0).sqrt();
    let normal = Normal::new(0.0, sigma).expect("positive sigma is always a valid normal");
    let mut rng = rx.rng.lock().unwrap();
    for sample in samples.iter_mut() {
        *sample += Complex64::new(normal.sample(&mut *rng), normal.sample(&mut *rng));
    }
}

/// Decimate an oversampled buffer down to the output sample rate by
/// boxcar-averaging each run of `oversample` samples (spec §4.7).
fn decimate(samples: &[Complex64], oversample: f64) -> Vec<Complex64> {
    let factor = oversample.round().max(1.0) as usize;
    if factor <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(factor)
        .map(|chunk| chunk.iter().sum::<Complex64>() / chunk.len() as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antenna::AntennaPattern;
    use crate::radar::RxMode;
    use crate::world::PlatformId;

    fn points(power: f64) -> Vec<InterpPoint> {
        (0..9)
            .map(|k| InterpPoint {
                time: k as f64 * 1e-5,
                power,
                delay: 1e-6,
                phase: 0.0,
                doppler: 0.0,
                noise_temperature: 290.0,
            })
            .collect()
    }

    #[test]
    fn interpolate_clamps_outside_table() {
        let p = points(4.0);
        assert_eq!(interpolate(&p, -1.0).unwrap().0, 4.0);
        assert_eq!(interpolate(&p, 1.0).unwrap().0, 4.0);
    }

    #[test]
    fn interpolate_is_linear_between_points() {
        let mut p = points(0.0);
        p[0].power = 0.0;
        p[1].power = 10.0;
        let (power, _, _) = interpolate(&p, 0.5e-5).unwrap();
        assert!((power - 5.0).abs() < 1e-9);
    }

    #[test]
    fn decimate_averages_contiguous_groups() {
        let samples = vec![Complex64::new(1.0, 0.0), Complex64::new(3.0, 0.0), Complex64::new(5.0, 0.0), Complex64::new(7.0, 0.0)];
        let out = decimate(&samples, 2.0);
        assert_eq!(out.len(), 2);
        assert!((out[0].re - 2.0).abs() < 1e-9);
        assert!((out[1].re - 6.0).abs() < 1e-9);
    }

    #[test]
    fn decimate_is_identity_for_unity_oversample() {
        let samples = vec![Complex64::new(1.0, 2.0)];
        assert_eq!(decimate(&samples, 1.0), samples);
    }

    #[test]
    fn render_response_accumulates_into_window_buffer() {
        let rx = Receiver::new(
            "rx",
            PlatformId(0),
            RxMode::Monostatic,
            0.0,
            1e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            1e7,
            1,
        )
        .unwrap();
        let signal = Arc::new(crate::signal::Signal::cw(1e7, 1e9, 1e-4, 1.0));
        let response = Response {
            transmitter: crate::world::TransmitterId(0),
            signal,
            window: 0,
            points: points(1.0),
            kind: ResponseKind::Direct,
            emit_time: 0.0,
        };
        render_response(&rx, &response, 1e7);
        let buf = rx.take_window(0, rx.window_sample_count(1e7));
        assert!(buf.iter().any(|s| s.norm() > 0.0));
    }

    #[test]
    fn thermal_noise_is_zero_at_zero_kelvin() {
        let rx = Receiver::new(
            "rx",
            PlatformId(0),
            RxMode::Monostatic,
            0.0,
            1e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            1e7,
            1,
        )
        .unwrap();
        let mut samples = vec![Complex64::new(0.0, 0.0); 4];
        add_thermal_noise(&rx, &mut samples, 1e7);
        assert!(samples.iter().all(|s| s.norm() == 0.0));
    }

    #[test]
    fn thermal_noise_is_nonzero_at_room_temperature() {
        let rx = Receiver::new(
            "rx",
            PlatformId(0),
            RxMode::Monostatic,
            290.0,
            1e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            1e7,
            1,
        )
        .unwrap();
        let mut samples = vec![Complex64::new(0.0, 0.0); 8];
        add_thermal_noise(&rx, &mut samples, 1e7);
        assert!(samples.iter().any(|s| s.norm() > 0.0));
    }

    fn assert_send_sync<T: Send + Sync>() {}
    #[test]
    fn rendered_window_is_send() {
        assert_send_sync::<RenderedWindow>();
    }

    #[test]
    fn weak_response_below_threshold_is_logged_as_interference() {
        let rx = Receiver::new(
            "rx",
            PlatformId(0),
            RxMode::Monostatic,
            290.0,
            1e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            1e7,
            1,
        )
        .unwrap()
        .with_snr_threshold(1e6);
        let signal = Arc::new(crate::signal::Signal::cw(1e7, 1e9, 1e-4, 1.0));
        let response = Response {
            transmitter: crate::world::TransmitterId(0),
            signal,
            window: 0,
            points: points(1e-30),
            kind: ResponseKind::Direct,
            emit_time: 0.0,
        };
        render_response(&rx, &response, 1e7);
        assert_eq!(rx.interference_log().len(), 1);
    }

    #[test]
    fn strong_response_above_threshold_is_not_logged() {
        let rx = Receiver::new(
            "rx",
            PlatformId(0),
            RxMode::Monostatic,
            290.0,
            1e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            1e7,
            1,
        )
        .unwrap()
        .with_snr_threshold(1e-6);
        let signal = Arc::new(crate::signal::Signal::cw(1e7, 1e9, 1e-4, 1.0));
        let response = Response {
            transmitter: crate::world::TransmitterId(0),
            signal,
            window: 0,
            points: points(1.0),
            kind: ResponseKind::Direct,
            emit_time: 0.0,
        };
        render_response(&rx, &response, 1e7);
        assert!(rx.interference_log().is_empty());
    }
}
