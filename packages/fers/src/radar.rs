//! Radar nodes (spec §4.5): pulsed/CW transmitters and receivers. Receivers
//! own the thread-safe inbox, interference log, CW I/Q buffer, and finalizer
//! queue the rendering pipeline (§5, §4.7) drains.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use num_complex::Complex64;
use rand::SeedableRng;

use crate::antenna::AntennaPattern;
use crate::error::ConfigError;
use crate::signal::Signal;
use crate::timing::Timing;
use crate::world::PlatformId;

/// `rate = sample_rate * oversample_ratio`. PRF is quantized to the nearest
/// value representable as an integer number of samples per period (spec §3).
pub fn quantize_prf(requested: f64, rate: f64) -> Result<f64, ConfigError> {
    if requested <= 0.0 {
        return Err(ConfigError::InvalidPrf(requested));
    }
    let periods_per_second = (rate / requested).floor().max(1.0);
    Ok(1.0 / (periods_per_second / rate))
}

/// Snap a time offset down to the nearest multiple of `1 / rate`.
pub fn snap_to_sample_grid(t: f64, rate: f64) -> f64 {
    (t * rate).floor() / rate
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    Pulsed,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxMode {
    Monostatic,
    Bistatic,
}

/// A single emitted pulse: the transmitter's signal prototype plus the time
/// at which it fired.
#[derive(Clone)]
pub struct Pulse {
    pub signal: Arc<Signal>,
    pub time: f64,
}

pub struct Transmitter {
    pub name: String,
    pub platform: PlatformId,
    pub signal: Arc<Signal>,
    pub antenna: AntennaPattern,
    prf: f64,
    pub mode: TxMode,
    pub timing: Option<Timing>,
    /// A monostatic radar's co-located receiver; direct-path contributions to
    /// this receiver are suppressed (spec §4.6, §8 CW monostatic suppression).
    pub attached: Option<crate::world::ReceiverId>,
    /// CW activation window; `None` means "active for the whole run" (spec §4.5).
    pub cw_on_time: Option<f64>,
    pub cw_off_time: Option<f64>,
    /// Transmit power, watts. Not named in the declarative radar equation
    /// text directly but required to evaluate it; defaults to unit power.
    pub power: f64,
}

impl Transmitter {
    pub fn new(
        name: impl Into<String>,
        platform: PlatformId,
        signal: Arc<Signal>,
        antenna: AntennaPattern,
        requested_prf: f64,
        rate: f64,
        mode: TxMode,
    ) -> Result<Self, ConfigError> {
        let prf = quantize_prf(requested_prf, rate)?;
        Ok(Self {
            name: name.into(),
            platform,
            signal,
            antenna,
            prf,
            mode,
            timing: None,
            attached: None,
            cw_on_time: None,
            cw_off_time: None,
            power: 1.0,
        })
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Is the CW carrier active at time `t`? Always `true` for pulsed mode.
    pub fn cw_active_at(&self, t: f64) -> bool {
        if self.mode != TxMode::Cw {
            return true;
        }
        let after_on = self.cw_on_time.map(|on| t >= on).unwrap_or(true);
        let before_off = self.cw_off_time.map(|off| t < off).unwrap_or(true);
        after_on && before_off
    }

    pub fn prf(&self) -> f64 {
        self.prf
    }

    /// Build the `n`th pulse. `pulse.time = n / prf` for pulsed transmitters,
    /// `0.0` for CW (spec §4.5).
    pub fn set_pulse(&self, n: u64) -> Result<Pulse, ConfigError> {
        if self.timing.is_none() {
            return Err(ConfigError::MissingTiming(self.name.clone()));
        }
        let time = match self.mode {
            TxMode::Pulsed => n as f64 / self.prf,
            TxMode::Cw => 0.0,
        };
        Ok(Pulse { signal: self.signal.clone(), time })
    }
}

/// Superset `InterpPoint`: the source carries two shapes (one with a
/// separate `doppler`/`noise_temperature` pair, one without); this keeps all
/// six fields to preserve both code paths (spec §9 open question).
#[derive(Debug, Clone, Copy)]
pub struct InterpPoint {
    pub time: f64,
    pub power: f64,
    pub delay: f64,
    pub phase: f64,
    pub doppler: f64,
    pub noise_temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Pulse,
    Direct,
    Cw,
}

#[derive(Clone)]
pub struct Response {
    pub transmitter: crate::world::TransmitterId,
    pub signal: Arc<Signal>,
    pub window: u64,
    pub points: Vec<InterpPoint>,
    pub kind: ResponseKind,
    /// Global time the signal prototype's own local clock reads zero: pulse
    /// emission time for `Direct`/`Pulse`, window start for `Cw` (spec §4.7
    /// step 3, "fetch waveform sample at local time t_k - delay").
    pub emit_time: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct InterferenceEntry {
    pub window: u64,
    pub time: f64,
    pub power: f64,
}

/// Sentinel job: `duration < 0.0` signals the finalizer thread to exit
/// (spec §4.7, §5 cancellation).
pub struct FinalizerJob {
    pub window: u64,
    pub duration: f64,
}

impl FinalizerJob {
    pub fn shutdown() -> Self {
        Self { window: 0, duration: -1.0 }
    }

    pub fn is_shutdown(&self) -> bool {
        self.duration < 0.0
    }
}

pub struct Receiver {
    pub name: String,
    pub platform: PlatformId,
    pub mode: RxMode,
    pub noise_temperature: f64,
    pub window_length: f64,
    window_prf: f64,
    pub window_skip: f64,
    pub antenna: AntennaPattern,
    pub timing: Mutex<Timing>,
    pub rng: Mutex<rand::rngs::StdRng>,

    inbox: Mutex<VecDeque<Response>>,
    inbox_cv: Condvar,
    interference_log: Mutex<Vec<InterferenceEntry>>,
    /// Per-window I/Q accumulation buffer, keyed by window index so that a
    /// still-draining window never clobbers the next one's samples.
    cw_iq_data: Mutex<std::collections::HashMap<u64, Vec<Complex64>>>,
    finalizer_queue: Mutex<VecDeque<FinalizerJob>>,
    finalizer_cv: Condvar,
    outstanding: Mutex<std::collections::HashMap<u64, usize>>,
    closed: Mutex<std::collections::HashSet<u64>>,
    pub shutdown: AtomicBool,
    high_water_mark: usize,
    /// Minimum acceptable SNR (linear) below which a response is recorded as
    /// interference rather than silently rendered; `None` disables logging.
    snr_threshold: Option<f64>,
}

/// Default inbox backpressure threshold (spec §4.7); `push_response` yields
/// the calling (engine) thread past this point rather than blocking on a lock.
const DEFAULT_HIGH_WATER_MARK: usize = 4096;

impl Receiver {
    pub fn new(
        name: impl Into<String>,
        platform: PlatformId,
        mode: RxMode,
        noise_temperature: f64,
        window_length: f64,
        requested_window_prf: f64,
        window_skip: f64,
        antenna: AntennaPattern,
        rate: f64,
        rng_seed: u64,
    ) -> Result<Self, ConfigError> {
        if noise_temperature < 0.0 {
            return Err(ConfigError::NegativeNoiseTemperature(noise_temperature));
        }
        let window_prf = quantize_prf(requested_window_prf, rate)?;
        Ok(Self {
            name: name.into(),
            platform,
            mode,
            noise_temperature,
            window_length,
            window_prf,
            window_skip: snap_to_sample_grid(window_skip, rate),
            antenna,
            timing: Mutex::new(Timing::new("rx-timing", false)),
            rng: Mutex::new(rand::rngs::StdRng::seed_from_u64(rng_seed)),
            inbox: Mutex::new(VecDeque::new()),
            inbox_cv: Condvar::new(),
            interference_log: Mutex::new(Vec::new()),
            cw_iq_data: Mutex::new(std::collections::HashMap::new()),
            finalizer_queue: Mutex::new(VecDeque::new()),
            finalizer_cv: Condvar::new(),
            outstanding: Mutex::new(std::collections::HashMap::new()),
            closed: Mutex::new(std::collections::HashSet::new()),
            shutdown: AtomicBool::new(false),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            snr_threshold: None,
        })
    }

    pub fn with_high_water_mark(mut self, mark: usize) -> Self {
        self.high_water_mark = mark;
        self
    }

    pub fn with_snr_threshold(mut self, threshold: f64) -> Self {
        self.snr_threshold = Some(threshold);
        self
    }

    pub fn snr_threshold(&self) -> Option<f64> {
        self.snr_threshold
    }

    pub fn window_prf(&self) -> f64 {
        self.window_prf
    }

    /// Noise figure in dB relative to a 290 K reference, derived from the
    /// receiver's own noise temperature (IEEE definition, `NF = 10 log10(1 + T/T0)`).
    pub fn noise_figure(&self) -> f64 {
        10.0 * (1.0 + self.noise_temperature / 290.0).log10()
    }

    /// Output samples per window at `rate = sample_rate * oversample_ratio`.
    pub fn window_sample_count(&self, rate: f64) -> usize {
        (self.window_length * rate).ceil().max(1.0) as usize
    }

    /// Accumulate one contribution into window `window`'s I/Q buffer at
    /// output index `index`, allocating the buffer on first touch.
    pub fn accumulate(&self, window: u64, samples: usize, index: usize, value: Complex64) {
        let mut buf = self.cw_iq_data.lock().unwrap();
        let entry = buf.entry(window).or_insert_with(|| vec![Complex64::new(0.0, 0.0); samples]);
        if let Some(slot) = entry.get_mut(index) {
            *slot += value;
        }
    }

    /// Remove and return window `window`'s accumulated buffer, or a
    /// freshly-zeroed one if nothing was ever accumulated into it (a
    /// window with no responses still gets a silent, all-noise output).
    pub fn take_window(&self, window: u64, samples: usize) -> Vec<Complex64> {
        let mut buf = self.cw_iq_data.lock().unwrap();
        buf.remove(&window).unwrap_or_else(|| vec![Complex64::new(0.0, 0.0); samples])
    }

    pub fn window_count(&self, start_time: f64, end_time: f64) -> u64 {
        ((end_time - start_time) * self.window_prf).ceil().max(0.0) as u64
    }

    pub fn window_start(&self, w: u64) -> f64 {
        w as f64 / self.window_prf + self.window_skip
    }

    /// Which window, if any, is open at time `t`. Responses arriving outside
    /// every window are silently dropped by the caller (spec §4.5).
    pub fn window_for_time(&self, t: f64) -> Option<u64> {
        if t < self.window_skip {
            return None;
        }
        let w = ((t - self.window_skip) * self.window_prf).floor() as u64;
        let start = self.window_start(w);
        if t >= start && t < start + self.window_length {
            Some(w)
        } else {
            None
        }
    }

    /// Record that `count` more responses are expected for `window` before it
    /// can be finalized. Called by the engine thread as it schedules work.
    pub fn expect_responses(&self, window: u64, count: usize) {
        let mut o = self.outstanding.lock().unwrap();
        *o.entry(window).or_insert(0) += count;
    }

    /// Engine -> renderer handoff. Past the high-water mark the engine
    /// thread yields (without holding any lock) until a worker re-drains,
    /// bounding inbox memory without ever blocking on the inbox lock itself
    /// (spec §4.7 backpressure).
    pub fn push_response(&self, response: Response) {
        {
            let mut inbox = self.inbox.lock().unwrap();
            inbox.push_back(response);
            self.inbox_cv.notify_all();
        }
        while self.inbox_len() > self.high_water_mark {
            std::thread::yield_now();
        }
    }

    /// Drain every currently-queued response, blocking until at least one is
    /// available or shutdown is observed.
    pub fn drain_inbox(&self) -> Vec<Response> {
        let mut inbox = self.inbox.lock().unwrap();
        while inbox.is_empty() && !self.shutdown.load(Ordering::Acquire) {
            inbox = self.inbox_cv.wait(inbox).unwrap();
        }
        inbox.drain(..).collect()
    }

    pub fn inbox_len(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }

    /// Called by the engine once a window's close event fires. If every
    /// response already expected for `window` has been acknowledged, the
    /// `FinalizerJob` is enqueued immediately; otherwise the window is
    /// marked `closed` and the last `acknowledge` call enqueues it instead.
    /// Covers the zero-response window case (a silent gap with no CW and
    /// no pulse echoes ever scheduled against it).
    pub fn close_window(&self, window: u64, duration: f64) {
        let mut o = self.outstanding.lock().unwrap();
        let remaining = o.get(&window).copied().unwrap_or(0);
        if remaining == 0 {
            o.remove(&window);
            drop(o);
            self.enqueue_finalizer_job(FinalizerJob { window, duration });
        } else {
            drop(o);
            self.closed.lock().unwrap().insert(window);
        }
    }

    /// Called by a renderer worker after finishing one `Response`. Enqueues
    /// the window's `FinalizerJob` once its count reaches zero, but only if
    /// the window has already been closed by the engine; otherwise it's
    /// left for `close_window` to pick up.
    pub fn acknowledge(&self, window: u64) {
        let mut o = self.outstanding.lock().unwrap();
        if let Some(remaining) = o.get_mut(&window) {
            *remaining -= 1;
            if *remaining == 0 {
                o.remove(&window);
                drop(o);
                let mut c = self.closed.lock().unwrap();
                if c.remove(&window) {
                    drop(c);
                    self.enqueue_finalizer_job(FinalizerJob { window, duration: self.window_length });
                }
            }
        }
    }

    pub fn log_interference(&self, entry: InterferenceEntry) {
        self.interference_log.lock().unwrap().push(entry);
    }

    pub fn interference_log(&self) -> Vec<InterferenceEntry> {
        self.interference_log.lock().unwrap().clone()
    }

    pub fn enqueue_finalizer_job(&self, job: FinalizerJob) {
        let mut q = self.finalizer_queue.lock().unwrap();
        q.push_back(job);
        self.finalizer_cv.notify_all();
    }

    /// FIFO pop, blocking until a job is available.
    pub fn pop_finalizer_job(&self) -> FinalizerJob {
        let mut q = self.finalizer_queue.lock().unwrap();
        while q.is_empty() {
            q = self.finalizer_cv.wait(q).unwrap();
        }
        q.pop_front().unwrap()
    }

    pub fn finalizer_queue_len(&self) -> usize {
        self.finalizer_queue.lock().unwrap().len()
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.inbox_cv.notify_all();
        self.enqueue_finalizer_job(FinalizerJob::shutdown());
    }
}
