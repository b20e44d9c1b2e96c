//! World: the owning arena of every entity, read-only after construction
//! (spec §3, §9). Entities are referred to by stable index rather than raw
//! pointer, so Responses never need to outlive the entities they reference.

use serde::Deserialize;

use crate::platform::Platform;
use crate::radar::{Receiver, Transmitter};
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransmitterId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub usize);

pub struct TargetEntry {
    pub platform: PlatformId,
    pub target: Box<dyn Target>,
}

fn default_speed_of_light() -> f64 {
    299_792_458.0
}

/// Flat World configuration options (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    pub sample_rate: f64,
    pub oversample_ratio: f64,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default = "default_speed_of_light")]
    pub c: f64,
    pub random_seed: u64,
    #[serde(default)]
    pub adc_bits: Option<u32>,
    #[serde(default)]
    pub export_binary: bool,
    #[serde(default)]
    pub export_csv: bool,
    #[serde(default)]
    pub export_xml: bool,
}

impl WorldConfig {
    /// `rate = sample_rate * oversample_ratio`, the grid PRFs and window
    /// skips are quantized against (spec §3).
    pub fn rate(&self) -> f64 {
        self.sample_rate * self.oversample_ratio
    }
}

pub struct World {
    pub config: WorldConfig,
    platforms: Vec<Platform>,
    transmitters: Vec<Transmitter>,
    receivers: Vec<std::sync::Arc<Receiver>>,
    targets: Vec<TargetEntry>,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self { config, platforms: Vec::new(), transmitters: Vec::new(), receivers: Vec::new(), targets: Vec::new() }
    }

    pub fn add_platform(&mut self, platform: Platform) -> PlatformId {
        self.platforms.push(platform);
        PlatformId(self.platforms.len() - 1)
    }

    pub fn add_transmitter(&mut self, tx: Transmitter) -> TransmitterId {
        self.transmitters.push(tx);
        TransmitterId(self.transmitters.len() - 1)
    }

    pub fn add_receiver(&mut self, rx: Receiver) -> ReceiverId {
        self.receivers.push(std::sync::Arc::new(rx));
        ReceiverId(self.receivers.len() - 1)
    }

    pub fn add_target(&mut self, platform: PlatformId, target: Box<dyn Target>) -> TargetId {
        self.targets.push(TargetEntry { platform, target });
        TargetId(self.targets.len() - 1)
    }

    pub fn platform(&self, id: PlatformId) -> &Platform {
        &self.platforms[id.0]
    }

    pub fn transmitter(&self, id: TransmitterId) -> &Transmitter {
        &self.transmitters[id.0]
    }

    pub fn receiver(&self, id: ReceiverId) -> &std::sync::Arc<Receiver> {
        &self.receivers[id.0]
    }

    pub fn transmitters(&self) -> impl Iterator<Item = (TransmitterId, &Transmitter)> {
        self.transmitters.iter().enumerate().map(|(i, t)| (TransmitterId(i), t))
    }

    pub fn receivers(&self) -> impl Iterator<Item = (ReceiverId, &std::sync::Arc<Receiver>)> {
        self.receivers.iter().enumerate().map(|(i, r)| (ReceiverId(i), r))
    }

    pub fn targets(&self) -> impl Iterator<Item = (TargetId, &TargetEntry)> {
        self.targets.iter().enumerate().map(|(i, t)| (TargetId(i), t))
    }

    pub fn target_mut(&mut self, id: TargetId) -> &mut TargetEntry {
        &mut self.targets[id.0]
    }
}
