use thiserror::Error;

/// Errors raised by the geometry/interpolation layer (spec §7 `GeometryError`).
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("path queried before finalize()")]
    NotFinalized,

    #[error("path has {have} sample(s), need at least {need} for this interpolation mode")]
    Underdetermined { have: usize, need: usize },

    #[error("angle {angle} is outside the clamped lookup table and clamping is disabled")]
    AngleOutOfRange { angle: f64 },
}
