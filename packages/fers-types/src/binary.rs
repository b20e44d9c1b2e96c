//! Packed wire layout for the binary record header the renderer's finalizer
//! writes per receiver window (spec §6). Defined here, rather than in the
//! `fers` crate, because it is a data-format contract shared with whatever
//! external consumer reads the simulator's output.

use bytemuck::{Pod, Zeroable};

pub const FILE_MAGIC: u32 = 0xFE12_5C00;
pub const PULSE_RESPONSE_MAGIC: u32 = 0xFE12_5C01;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u16,
    pub float_size: u16,
}

impl FileHeader {
    pub fn new(float_size: u16) -> Self {
        Self { magic: FILE_MAGIC, version: 1, float_size }
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PulseResponseHeader {
    pub magic: u32,
    pub count: u32,
    pub rate: f64,
    pub start: f64,
}

impl PulseResponseHeader {
    pub fn new(count: u32, rate: f64, start: f64) -> Self {
        Self { magic: PULSE_RESPONSE_MAGIC, count, rate, start }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes_match_spec() {
        assert_eq!(std::mem::size_of::<FileHeader>(), 8);
        assert_eq!(std::mem::size_of::<PulseResponseHeader>(), 24);
    }

    #[test]
    fn bytes_round_trip() {
        let h = PulseResponseHeader::new(1000, 1.0e7, 0.0);
        let bytes = bytemuck::bytes_of(&h);
        let back: &PulseResponseHeader = bytemuck::from_bytes(bytes);
        let count = back.count;
        assert_eq!(count, 1000);
    }
}
