//! Event-driven simulation engine (spec §4.6): a binary heap of timed events
//! advances simulated time through pulse emissions, CW activations, and
//! receiver window closes. Single-threaded; it produces `Response`s into
//! receivers' thread-safe inboxes without ever blocking on them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::f64::consts::PI;

use fers_types::V3;

use crate::error::{FersError, RuntimeError};
use crate::radar::{InterpPoint, Response, ResponseKind};
use crate::world::{PlatformId, ReceiverId, TargetId, TransmitterId, World};

/// Minimum InterpPoint density across a pulse's receive window (spec §4.6).
const PULSE_POINTS: usize = 9;
/// CW responses span a whole window; points are spaced closely enough to
/// resolve Doppler phase drift within it without tracking every output sample
/// as a discrete event (left to the renderer's own interpolation, spec §4.6).
const CW_POINTS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Event {
    time: f64,
    kind: EventKind,
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time.total_cmp(&other.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    PulseFire { tx: TransmitterId, n: u64 },
    CwOn { tx: TransmitterId },
    CwOff { tx: TransmitterId },
    WindowClose { rx: ReceiverId, w: u64 },
}

pub struct Engine {
    world: World,
    queue: BinaryHeap<Reverse<Event>>,
    active_cw: std::collections::HashSet<TransmitterId>,
}

impl Engine {
    pub fn new(world: World) -> Self {
        Self { world, queue: BinaryHeap::new(), active_cw: std::collections::HashSet::new() }
    }

    fn push(&mut self, time: f64, kind: EventKind) {
        if time <= self.world.config.end_time {
            self.queue.push(Reverse(Event { time, kind }));
        }
    }

    /// Run the engine to completion, consuming it, and return the `World` so
    /// the caller can hand receiver inboxes on to the rendering pipeline and
    /// eventually read back interference logs.
    pub fn run(mut self) -> Result<World, FersError> {
        let start = self.world.config.start_time;
        let end = self.world.config.end_time;

        let tx_ids: Vec<TransmitterId> = self.world.transmitters().map(|(id, _)| id).collect();
        let rx_ids: Vec<ReceiverId> = self.world.receivers().map(|(id, _)| id).collect();

        for &tx in &tx_ids {
            let t = self.world.transmitter(tx);
            let mode = t.mode;
            let cw_on_time = t.cw_on_time;
            let cw_off_time = t.cw_off_time;
            match mode {
                crate::radar::TxMode::Pulsed => self.push(start, EventKind::PulseFire { tx, n: 0 }),
                crate::radar::TxMode::Cw => {
                    let on = cw_on_time.unwrap_or(start);
                    self.push(on, EventKind::CwOn { tx });
                    if let Some(off) = cw_off_time {
                        self.push(off, EventKind::CwOff { tx });
                    }
                }
            }
        }

        for &rx in &rx_ids {
            let r = self.world.receiver(rx);
            let count = r.window_count(start, end);
            if count > 0 {
                self.resync_receiver_timing(rx)?;
                let w0_end = r.window_start(0) + r.window_length;
                self.push(w0_end, EventKind::WindowClose { rx, w: 0 });
            }
        }

        while let Some(Reverse(event)) = self.queue.pop() {
            if event.time > end {
                break;
            }
            self.handle(event)?;
        }

        for &rx in &rx_ids {
            self.world.receiver(rx).signal_shutdown();
        }

        Ok(self.world)
    }

    fn handle(&mut self, event: Event) -> Result<(), FersError> {
        match event.kind {
            EventKind::PulseFire { tx, n } => self.handle_pulse_fire(tx, n)?,
            EventKind::CwOn { tx } => {
                self.active_cw.insert(tx);
            }
            EventKind::CwOff { tx } => {
                self.active_cw.remove(&tx);
            }
            EventKind::WindowClose { rx, w } => self.handle_window_close(rx, w)?,
        }
        Ok(())
    }

    fn handle_pulse_fire(&mut self, tx_id: TransmitterId, n: u64) -> Result<(), FersError> {
        let end = self.world.config.end_time;
        let t_emit = {
            let tx = self.world.transmitter(tx_id);
            tx.set_pulse(n)?.time
        };

        if t_emit > end {
            return Ok(());
        }
        let next_time = {
            let tx = self.world.transmitter(tx_id);
            t_emit + 1.0 / tx.prf()
        };
        self.push(next_time, EventKind::PulseFire { tx: tx_id, n: n + 1 });

        let rx_ids: Vec<ReceiverId> = self.world.receivers().map(|(id, _)| id).collect();
        let target_ids: Vec<TargetId> = self.world.targets().map(|(id, _)| id).collect();

        for &rx_id in &rx_ids {
            for &target_id in &target_ids {
                self.emit_pulse_reflection(tx_id, target_id, rx_id, t_emit)?;
            }
            self.emit_direct_pulse(tx_id, rx_id, t_emit)?;
        }
        Ok(())
    }

    fn emit_direct_pulse(&mut self, tx_id: TransmitterId, rx_id: ReceiverId, t_emit: f64) -> Result<(), FersError> {
        let suppressed = self.world.transmitter(tx_id).attached == Some(rx_id);
        if suppressed {
            return Ok(());
        }
        let c = self.world.config.c;
        let tx_platform = self.world.transmitter(tx_id).platform;
        let rx_platform = self.world.receiver(rx_id).platform;

        let (d, t_arrival, tx_pos, rx_pos) = solve_direct(&self.world, tx_platform, rx_platform, t_emit, c)?;
        let window = match self.world.receiver(rx_id).window_for_time(t_arrival) {
            Some(w) => w,
            None => return Ok(()),
        };

        let tx_orient = self.world.platform(tx_platform).orientation(t_emit)?;
        let rx_orient = self.world.platform(rx_platform).orientation(t_arrival)?;
        let carrier = self.world.transmitter(tx_id).signal.carrier;
        let wavelength = c / carrier;

        let dir_tx = rx_pos.sub(&tx_pos).to_spherical();
        let dir_rx = tx_pos.sub(&rx_pos).to_spherical();
        let g_tx = self.world.transmitter(tx_id).antenna.gain(&dir_tx, &tx_orient, wavelength);
        let g_rx = self.world.receiver(rx_id).antenna.gain(&dir_rx, &rx_orient, wavelength);
        let power_tx = self.world.transmitter(tx_id).power;

        let power = friis_one_way(power_tx, g_tx, g_rx, wavelength, d);

        let signal = self.world.transmitter(tx_id).signal.clone();
        let points = self.sample_points(tx_id, rx_id, t_emit, d, 0.0, power, PULSE_POINTS, dir_rx, rx_orient)?;

        let rx = self.world.receiver(rx_id);
        rx.expect_responses(window, 1);
        rx.push_response(Response { transmitter: tx_id, signal, window, points, kind: ResponseKind::Direct, emit_time: t_emit });
        Ok(())
    }

    fn emit_pulse_reflection(
        &mut self,
        tx_id: TransmitterId,
        target_id: TargetId,
        rx_id: ReceiverId,
        t_emit: f64,
    ) -> Result<(), FersError> {
        let c = self.world.config.c;
        let tx_platform = self.world.transmitter(tx_id).platform;
        let rx_platform = self.world.receiver(rx_id).platform;
        let tgt_platform = self.world.target_mut(target_id).platform;

        let (d1, d2, t_tgt, t_arrival, tx_pos, tgt_pos, rx_pos) =
            solve_two_way(&self.world, tx_platform, tgt_platform, rx_platform, t_emit, c)?;

        let window = match self.world.receiver(rx_id).window_for_time(t_arrival) {
            Some(w) => w,
            None => return Ok(()),
        };

        let tx_orient = self.world.platform(tx_platform).orientation(t_emit)?;
        let rx_orient = self.world.platform(rx_platform).orientation(t_arrival)?;
        let tgt_orient = self.world.platform(tgt_platform).orientation(t_tgt)?;
        let carrier = self.world.transmitter(tx_id).signal.carrier;
        let wavelength = c / carrier;

        let dir_tx_to_tgt = tgt_pos.sub(&tx_pos).to_spherical();
        let dir_rx_to_tgt = tgt_pos.sub(&rx_pos).to_spherical();
        let g_tx = self.world.transmitter(tx_id).antenna.gain(&dir_tx_to_tgt, &tx_orient, wavelength);
        let g_rx = self.world.receiver(rx_id).antenna.gain(&dir_rx_to_tgt, &rx_orient, wavelength);
        let power_tx = self.world.transmitter(tx_id).power;

        let in_angle = tx_pos.sub(&tgt_pos).to_spherical();
        let out_angle = rx_pos.sub(&tgt_pos).to_spherical();
        let sigma = match self.world.target_mut(target_id).target.rcs(in_angle, out_angle, tgt_orient) {
            Ok(s) => s,
            Err(RuntimeError::RcsUnavailable) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let power = friis_two_way(power_tx, g_tx, g_rx, wavelength, sigma, d1, d2);

        let signal = self.world.transmitter(tx_id).signal.clone();
        let points =
            self.sample_points(tx_id, rx_id, t_emit, d1 + d2, 0.0, power, PULSE_POINTS, dir_rx_to_tgt, rx_orient)?;

        let rx = self.world.receiver(rx_id);
        rx.expect_responses(window, 1);
        rx.push_response(Response { transmitter: tx_id, signal, window, points, kind: ResponseKind::Pulse, emit_time: t_emit });
        Ok(())
    }

    /// Sample `InterpPoint`s evenly across the signal's duration starting at
    /// `t_emit`, computing delay/phase/doppler per point from the constant
    /// (for a single pulse, effectively frozen) propagation geometry plus the
    /// receiver's clock noise contribution. `angle_to`/`reference` locate the
    /// arriving energy against the receiver's boresight so its antenna's own
    /// per-angle noise temperature table (if any) applies instead of the
    /// receiver's flat figure.
    #[allow(clippy::too_many_arguments)]
    fn sample_points(
        &mut self,
        tx_id: TransmitterId,
        rx_id: ReceiverId,
        t_emit: f64,
        total_distance: f64,
        doppler_hint: f64,
        power: f64,
        count: usize,
        angle_to: fers_types::S3,
        reference: fers_types::S3,
    ) -> Result<Vec<InterpPoint>, FersError> {
        let c = self.world.config.c;
        let carrier = self.world.transmitter(tx_id).signal.carrier;
        let duration = self.world.transmitter(tx_id).signal.duration().max(1.0 / self.world.config.rate());

        let mut points = Vec::with_capacity(count.max(1));
        let signal = self.world.transmitter(tx_id).signal.clone();
        let rx = self.world.receiver(rx_id);
        let noise_temperature = rx.antenna.noise_temperature(&angle_to, &reference, rx.noise_temperature);
        let mut timing = rx.timing.lock().unwrap();
        if !timing.is_initialized() {
            return Err(RuntimeError::UninitializedTiming.into());
        }

        for k in 0..count.max(1) {
            let frac = if count > 1 { k as f64 / (count - 1) as f64 } else { 0.0 };
            let t_sig = frac * duration;
            let t_local = t_emit + t_sig;
            let clock_dev = timing.next_sample()?;
            let delay = total_distance / c + clock_dev / (2.0 * PI * carrier);
            let phase = -2.0 * PI * carrier * delay + signal.phase_at(t_sig);
            points.push(InterpPoint { time: t_local, power, delay, phase, doppler: doppler_hint, noise_temperature });
        }
        Ok(points)
    }

    fn handle_window_close(&mut self, rx_id: ReceiverId, w: u64) -> Result<(), FersError> {
        let (window_length, next_start) = {
            let rx = self.world.receiver(rx_id);
            (rx.window_length, rx.window_start(w + 1))
        };

        if !self.active_cw.is_empty() {
            self.emit_cw_contributions(rx_id, w)?;
        }

        self.world.receiver(rx_id).close_window(w, window_length);

        let end = self.world.config.end_time;
        let next_close = next_start + window_length;
        if next_start < end {
            self.resync_receiver_timing(rx_id)?;
            self.push(next_close, EventKind::WindowClose { rx: rx_id, w: w + 1 });
        }
        Ok(())
    }

    /// Rebase a receiver's clock noise state at the start of a new window,
    /// when its timing source is configured for it (spec §4.4 sync-on-pulse).
    fn resync_receiver_timing(&self, rx_id: ReceiverId) -> Result<(), FersError> {
        let rx = self.world.receiver(rx_id);
        let mut timing = rx.timing.lock().unwrap();
        if timing.sync_on_pulse {
            timing.resync()?;
        }
        Ok(())
    }

    fn emit_cw_contributions(&mut self, rx_id: ReceiverId, w: u64) -> Result<(), FersError> {
        let c = self.world.config.c;
        let window_start = self.world.receiver(rx_id).window_start(w);
        let window_length = self.world.receiver(rx_id).window_length;

        let active: Vec<TransmitterId> = self.active_cw.iter().copied().collect();
        let target_ids: Vec<TargetId> = self.world.targets().map(|(id, _)| id).collect();

        for &tx_id in &active {
            if !self.world.transmitter(tx_id).cw_active_at(window_start) {
                continue;
            }
            let suppressed = self.world.transmitter(tx_id).attached == Some(rx_id);
            if !suppressed {
                self.emit_cw_direct(tx_id, rx_id, w, window_start, window_length, c)?;
            }
            for &target_id in &target_ids {
                self.emit_cw_reflection(tx_id, target_id, rx_id, w, window_start, window_length, c)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_cw_direct(
        &mut self,
        tx_id: TransmitterId,
        rx_id: ReceiverId,
        window: u64,
        window_start: f64,
        window_length: f64,
        c: f64,
    ) -> Result<(), FersError> {
        let tx_platform = self.world.transmitter(tx_id).platform;
        let rx_platform = self.world.receiver(rx_id).platform;

        let (d, _t_arrival, tx_pos, rx_pos) = solve_direct(&self.world, tx_platform, rx_platform, window_start, c)?;

        let tx_orient = self.world.platform(tx_platform).orientation(window_start)?;
        let rx_orient = self.world.platform(rx_platform).orientation(window_start)?;
        let carrier = self.world.transmitter(tx_id).signal.carrier;
        let wavelength = c / carrier;

        let dir_tx = rx_pos.sub(&tx_pos).to_spherical();
        let dir_rx = tx_pos.sub(&rx_pos).to_spherical();
        let g_tx = self.world.transmitter(tx_id).antenna.gain(&dir_tx, &tx_orient, wavelength);
        let g_rx = self.world.receiver(rx_id).antenna.gain(&dir_rx, &rx_orient, wavelength);
        let power_tx = self.world.transmitter(tx_id).power;
        let power = friis_one_way(power_tx, g_tx, g_rx, wavelength, d);

        let signal = self.world.transmitter(tx_id).signal.clone();
        let points =
            self.sample_cw_points(tx_id, rx_id, window_start, window_length, d, 0.0, power, dir_rx, rx_orient)?;

        let rx = self.world.receiver(rx_id);
        rx.expect_responses(window, 1);
        rx.push_response(Response { transmitter: tx_id, signal, window, points, kind: ResponseKind::Cw, emit_time: window_start });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_cw_reflection(
        &mut self,
        tx_id: TransmitterId,
        target_id: TargetId,
        rx_id: ReceiverId,
        window: u64,
        window_start: f64,
        window_length: f64,
        c: f64,
    ) -> Result<(), FersError> {
        let tx_platform = self.world.transmitter(tx_id).platform;
        let rx_platform = self.world.receiver(rx_id).platform;
        let tgt_platform = self.world.target_mut(target_id).platform;

        let (d1, d2, t_tgt, _t_arrival, tx_pos, tgt_pos, rx_pos) =
            solve_two_way(&self.world, tx_platform, tgt_platform, rx_platform, window_start, c)?;

        let tx_orient = self.world.platform(tx_platform).orientation(window_start)?;
        let rx_orient = self.world.platform(rx_platform).orientation(window_start)?;
        let tgt_orient = self.world.platform(tgt_platform).orientation(t_tgt)?;
        let carrier = self.world.transmitter(tx_id).signal.carrier;
        let wavelength = c / carrier;

        let dir_tx_to_tgt = tgt_pos.sub(&tx_pos).to_spherical();
        let dir_rx_to_tgt = tgt_pos.sub(&rx_pos).to_spherical();
        let g_tx = self.world.transmitter(tx_id).antenna.gain(&dir_tx_to_tgt, &tx_orient, wavelength);
        let g_rx = self.world.receiver(rx_id).antenna.gain(&dir_rx_to_tgt, &rx_orient, wavelength);
        let power_tx = self.world.transmitter(tx_id).power;

        let in_angle = tx_pos.sub(&tgt_pos).to_spherical();
        let out_angle = rx_pos.sub(&tgt_pos).to_spherical();
        let sigma = match self.world.target_mut(target_id).target.rcs(in_angle, out_angle, tgt_orient) {
            Ok(s) => s,
            Err(RuntimeError::RcsUnavailable) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let power = friis_two_way(power_tx, g_tx, g_rx, wavelength, sigma, d1, d2);

        let doppler = radial_doppler(&self.world, tgt_platform, rx_platform, t_tgt, carrier, c)?;

        let signal = self.world.transmitter(tx_id).signal.clone();
        let points = self.sample_cw_points(
            tx_id,
            rx_id,
            window_start,
            window_length,
            d1 + d2,
            doppler,
            power,
            dir_rx_to_tgt,
            rx_orient,
        )?;

        let rx = self.world.receiver(rx_id);
        rx.expect_responses(window, 1);
        rx.push_response(Response { transmitter: tx_id, signal, window, points, kind: ResponseKind::Cw, emit_time: window_start });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn sample_cw_points(
        &mut self,
        tx_id: TransmitterId,
        rx_id: ReceiverId,
        window_start: f64,
        window_length: f64,
        total_distance: f64,
        doppler: f64,
        power: f64,
        angle_to: fers_types::S3,
        reference: fers_types::S3,
    ) -> Result<Vec<InterpPoint>, FersError> {
        let c = self.world.config.c;
        let carrier = self.world.transmitter(tx_id).signal.carrier;

        let mut points = Vec::with_capacity(CW_POINTS);
        let signal_duration = self.world.transmitter(tx_id).signal.duration().max(1e-12);
        let rx = self.world.receiver(rx_id);
        let noise_temperature = rx.antenna.noise_temperature(&angle_to, &reference, rx.noise_temperature);
        let mut timing = rx.timing.lock().unwrap();
        if !timing.is_initialized() {
            return Err(RuntimeError::UninitializedTiming.into());
        }
        let signal = self.world.transmitter(tx_id).signal.clone();

        for k in 0..CW_POINTS {
            let frac = k as f64 / (CW_POINTS - 1) as f64;
            let t_local = window_start + frac * window_length;
            let clock_dev = timing.next_sample()?;
            let doppler_distance = total_distance + doppler * (t_local - window_start) * c / carrier;
            let delay = doppler_distance / c + clock_dev / (2.0 * PI * carrier);
            let t_sig = t_local.rem_euclid(signal_duration);
            let phase = -2.0 * PI * carrier * delay + signal.phase_at(t_sig);
            points.push(InterpPoint { time: t_local, power, delay, phase, doppler, noise_temperature });
        }
        Ok(points)
    }
}

fn friis_one_way(power_tx: f64, g_tx: f64, g_rx: f64, wavelength: f64, d: f64) -> f64 {
    let d = d.max(1e-3);
    power_tx * g_tx * g_rx * wavelength * wavelength / (4.0 * PI * d).powi(2)
}

fn friis_two_way(power_tx: f64, g_tx: f64, g_rx: f64, wavelength: f64, sigma: f64, d1: f64, d2: f64) -> f64 {
    let d1 = d1.max(1e-3);
    let d2 = d2.max(1e-3);
    power_tx * g_tx * g_rx * wavelength * wavelength * sigma / ((4.0 * PI).powi(3) * d1 * d1 * d2 * d2)
}

/// Two-hop fixed-point propagation delay: tx -> target -> rx, 2 rounds of
/// position refinement at each hop (spec §4.6).
#[allow(clippy::type_complexity)]
fn solve_two_way(
    world: &World,
    tx_platform: PlatformId,
    tgt_platform: PlatformId,
    rx_platform: PlatformId,
    t_emit: f64,
    c: f64,
) -> Result<(f64, f64, f64, f64, V3, V3, V3), FersError> {
    let tx_pos = world.platform(tx_platform).position(t_emit)?;

    let mut t_tgt = t_emit;
    let mut tgt_pos = world.platform(tgt_platform).position(t_tgt)?;
    for _ in 0..2 {
        let d1 = tx_pos.sub(&tgt_pos).length();
        t_tgt = t_emit + d1 / c;
        tgt_pos = world.platform(tgt_platform).position(t_tgt)?;
    }
    let d1 = tx_pos.sub(&tgt_pos).length();

    let mut t_rx = t_tgt;
    let mut rx_pos = world.platform(rx_platform).position(t_rx)?;
    for _ in 0..2 {
        let d2 = tgt_pos.sub(&rx_pos).length();
        t_rx = t_tgt + d2 / c;
        rx_pos = world.platform(rx_platform).position(t_rx)?;
    }
    let d2 = tgt_pos.sub(&rx_pos).length();

    Ok((d1, d2, t_tgt, t_rx, tx_pos, tgt_pos, rx_pos))
}

/// One-hop fixed-point propagation delay: tx -> rx directly.
fn solve_direct(
    world: &World,
    tx_platform: PlatformId,
    rx_platform: PlatformId,
    t_emit: f64,
    c: f64,
) -> Result<(f64, f64, V3, V3), FersError> {
    let tx_pos = world.platform(tx_platform).position(t_emit)?;

    let mut t_rx = t_emit;
    let mut rx_pos = world.platform(rx_platform).position(t_rx)?;
    for _ in 0..2 {
        let d = tx_pos.sub(&rx_pos).length();
        t_rx = t_emit + d / c;
        rx_pos = world.platform(rx_platform).position(t_rx)?;
    }
    let d = tx_pos.sub(&rx_pos).length();

    Ok((d, t_rx, tx_pos, rx_pos))
}

/// Radial Doppler frequency shift of a moving target as seen bistatically,
/// via a small central-difference estimate of range-rate (spec §8 scenario 3:
/// `2 * v * f / c` for the monostatic case, this reduces to that when
/// `tgt_platform` and `rx_platform` coincide in range-rate direction).
fn radial_doppler(world: &World, tgt_platform: PlatformId, rx_platform: PlatformId, t: f64, carrier: f64, c: f64) -> Result<f64, FersError> {
    let dt = 1e-6;
    let rx_pos = world.platform(rx_platform).position(t)?;
    let range_now = world.platform(tgt_platform).position(t)?.sub(&rx_pos).length();
    let range_later = world.platform(tgt_platform).position(t + dt)?.sub(&rx_pos).length();
    let range_rate = (range_later - range_now) / dt;
    Ok(-2.0 * range_rate * carrier / c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fers_types::{PathMode, TimedCoord, TimedRot};

    use crate::antenna::AntennaPattern;
    use crate::platform::Platform;
    use crate::radar::{Receiver, RxMode, Transmitter, TxMode};
    use crate::signal::Signal;
    use crate::target::IsoTarget;
    use crate::timing::{ClockModelParams, Timing};
    use crate::world::WorldConfig;

    fn silent_timing() -> Timing {
        let mut t = Timing::new("clock", false);
        t.set_prototype(ClockModelParams::new(vec![], vec![], 0.0, 0.0), 1);
        t
    }

    fn stationary_platform(x: f64, y: f64, z: f64) -> Platform {
        let mut motion = fers_types::MotionPath::new(PathMode::Static);
        motion.add_coord(TimedCoord { t: 0.0, pos: fers_types::V3::new(x, y, z) });
        let mut rotation = fers_types::RotationPath::new(PathMode::Static);
        rotation.add_rot(TimedRot { t: 0.0, az: 0.0, el: 0.0 });
        let mut p = Platform::new("p", motion, rotation);
        p.finalize().unwrap();
        p
    }

    fn config(end_time: f64) -> WorldConfig {
        WorldConfig {
            sample_rate: 1.0e7,
            oversample_ratio: 1.0,
            start_time: 0.0,
            end_time,
            c: 299_792_458.0,
            random_seed: 1,
            adc_bits: None,
            export_binary: false,
            export_csv: false,
            export_xml: false,
        }
    }

    #[test]
    fn direct_path_produces_one_thousand_windows_worth_of_pulses() {
        // end_time stops just short of the 1001st pulse (t = 1.0 s) so the
        // window/pulse counts land on a clean 1000 without an edge-of-run pulse.
        let mut world = World::new(config(0.9995));
        let tx_p = world.add_platform(stationary_platform(0.0, 0.0, 0.0));
        let rx_p = world.add_platform(stationary_platform(100.0, 0.0, 0.0));

        let signal = Arc::new(Signal::cw(1.0e7, 1.0e9, 1.0e-6, 1.0));
        let mut tx = Transmitter::new(
            "tx",
            tx_p,
            signal,
            AntennaPattern::Isotropic { gain: 1.0 },
            1000.0,
            world.config.rate(),
            TxMode::Pulsed,
        )
        .unwrap();
        tx.timing = Some(silent_timing());
        world.add_transmitter(tx);

        let mut rx = Receiver::new(
            "rx",
            rx_p,
            RxMode::Bistatic,
            290.0,
            1.0e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            world.config.rate(),
            1,
        )
        .unwrap();
        *rx.timing.get_mut().unwrap() = silent_timing();
        let rx_id = world.add_receiver(rx);

        let world = Engine::new(world).run().unwrap();
        let rx = world.receiver(rx_id);
        assert_eq!(rx.window_count(0.0, 0.9995), 1000);
        let responses = rx.drain_inbox();
        assert_eq!(responses.len(), 1000, "one direct-path response per pulse window");
        for r in &responses {
            assert_eq!(r.kind, crate::radar::ResponseKind::Direct);
            assert!(r.points[0].power > 0.0);
        }
    }

    #[test]
    fn bistatic_iso_target_delay_matches_sum_of_ranges_over_c() {
        let mut world = World::new(config(0.01));
        let tx_p = world.add_platform(stationary_platform(0.0, 0.0, 0.0));
        let tgt_p = world.add_platform(stationary_platform(1500.0, 0.0, 0.0));
        let rx_p = world.add_platform(stationary_platform(3000.0, 0.0, 0.0));

        let signal = Arc::new(Signal::cw(1.0e7, 1.0e9, 1.0e-6, 1.0));
        let mut tx = Transmitter::new(
            "tx",
            tx_p,
            signal,
            AntennaPattern::Isotropic { gain: 1.0 },
            1000.0,
            world.config.rate(),
            TxMode::Pulsed,
        )
        .unwrap();
        tx.timing = Some(silent_timing());
        world.add_transmitter(tx);

        world.add_target(tgt_p, Box::new(IsoTarget::new(1.0, None)));

        let mut rx = Receiver::new(
            "rx",
            rx_p,
            RxMode::Bistatic,
            290.0,
            1.0e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            world.config.rate(),
            1,
        )
        .unwrap();
        *rx.timing.get_mut().unwrap() = silent_timing();
        let rx_id = world.add_receiver(rx);

        let world = Engine::new(world).run().unwrap();
        let rx = world.receiver(rx_id);
        let responses = rx.drain_inbox();
        let reflection = responses.iter().find(|r| r.kind == ResponseKind::Pulse).expect("one target reflection");

        let expected_delay = 3000.0 / config(0.01).c;
        let got_delay = reflection.points[0].delay;
        assert!((got_delay - expected_delay).abs() / expected_delay < 0.01, "got {got_delay}, want {expected_delay}");
    }

    #[test]
    fn sync_on_pulse_resets_clock_noise_each_window() {
        // end just short of the 4th pulse (t = 0.003 s) so exactly 3
        // one-pulse-per-window cycles run to completion.
        let mut world = World::new(config(0.0025));
        let tx_p = world.add_platform(stationary_platform(0.0, 0.0, 0.0));
        let rx_p = world.add_platform(stationary_platform(100.0, 0.0, 0.0));

        let signal = Arc::new(Signal::cw(1.0e7, 1.0e9, 1.0e-6, 1.0));
        let mut tx = Transmitter::new(
            "tx",
            tx_p,
            signal,
            AntennaPattern::Isotropic { gain: 1.0 },
            1000.0,
            world.config.rate(),
            TxMode::Pulsed,
        )
        .unwrap();
        tx.timing = Some(silent_timing());
        world.add_transmitter(tx);

        let mut rx = Receiver::new(
            "rx",
            rx_p,
            RxMode::Bistatic,
            290.0,
            1.0e-4,
            1000.0,
            0.0,
            AntennaPattern::Isotropic { gain: 1.0 },
            world.config.rate(),
            1,
        )
        .unwrap();
        let mut noisy_timing = Timing::new("rx-clock", true);
        noisy_timing.set_prototype(ClockModelParams::new(vec![2.0], vec![1e-6], 0.0, 0.0), 7);
        *rx.timing.get_mut().unwrap() = noisy_timing;
        let rx_id = world.add_receiver(rx);

        let world = Engine::new(world).run().unwrap();
        let rx = world.receiver(rx_id);
        let mut responses = rx.drain_inbox();
        responses.sort_by_key(|r| r.window);
        assert_eq!(responses.len(), 3, "one direct-path response per window");

        let first_delay = responses[0].points[0].delay;
        for r in &responses[1..] {
            let delay = r.points[0].delay;
            assert!(
                (delay - first_delay).abs() < 1e-15,
                "window {} started from a different clock-noise state than window 0 ({delay} vs {first_delay})",
                r.window
            );
        }
    }

    #[test]
    fn monostatic_moving_target_doppler_matches_two_v_f_over_c() {
        let c = config(0.1002).c;
        let v = 300.0; // m/s: (0,0,0) -> (300,0,0) over 1 s
        let carrier = 1.0e10;

        let mut world = World::new(config(0.1002));
        let radar_p = world.add_platform(stationary_platform(0.0, 0.0, 0.0));

        let mut motion = fers_types::MotionPath::new(PathMode::Linear);
        motion.add_coord(TimedCoord { t: 0.0, pos: fers_types::V3::new(0.0, 0.0, 0.0) });
        motion.add_coord(TimedCoord { t: 1.0, pos: fers_types::V3::new(v, 0.0, 0.0) });
        let mut rotation = fers_types::RotationPath::new(PathMode::Static);
        rotation.add_rot(TimedRot { t: 0.0, az: 0.0, el: 0.0 });
        let mut tgt_platform = Platform::new("target", motion, rotation);
        tgt_platform.finalize().unwrap();
        let tgt_p = world.add_platform(tgt_platform);

        let signal = Arc::new(Signal::cw(1.0e7, carrier, 1.0e-6, 1.0));
        let mut tx = Transmitter::new(
            "tx",
            radar_p,
            signal,
            AntennaPattern::Isotropic { gain: 1.0 },
            1000.0,
            world.config.rate(),
            TxMode::Cw,
        )
        .unwrap();
        tx.timing = Some(silent_timing());

        world.add_target(tgt_p, Box::new(IsoTarget::new(1.0, None)));

        let mut rx = Receiver::new(
            "rx",
            radar_p,
            RxMode::Monostatic,
            290.0,
            1.0e-4,
            1000.0,
            0.1,
            AntennaPattern::Isotropic { gain: 1.0 },
            world.config.rate(),
            1,
        )
        .unwrap();
        *rx.timing.get_mut().unwrap() = silent_timing();
        let rx_id = world.add_receiver(rx);

        tx.attached = Some(rx_id);
        world.add_transmitter(tx);

        let world = Engine::new(world).run().unwrap();
        let rx = world.receiver(rx_id);
        let responses = rx.drain_inbox();
        let reflection = responses.iter().find(|r| r.kind == ResponseKind::Cw).expect("one target reflection");

        let expected = 2.0 * v * carrier / c;
        let got = reflection.points[0].doppler.abs();
        assert!((got - expected).abs() / expected < 0.01, "got {got}, want {expected}");
    }
}
