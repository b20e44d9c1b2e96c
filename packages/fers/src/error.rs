//! Error taxonomy (spec §7). Each subsystem gets its own `thiserror` enum;
//! `FersError` rolls them up for callers that cross subsystem boundaries
//! (the engine, the CLI), mirroring the per-module `*Error` + top-level
//! `MwalibError` pattern.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("PRF must be positive, got {0}")]
    InvalidPrf(f64),

    #[error("noise temperature must be non-negative, got {0}")]
    NegativeNoiseTemperature(f64),

    #[error("radar '{0}' has no timing source attached and is used by the engine")]
    MissingTiming(String),

    #[error("unknown interpolation mode '{0}'")]
    UnknownInterpolationMode(String),

    #[error("attached receiver '{0}' not found among this scene's platforms")]
    UnknownReceiver(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("cannot clone an uninitialized timing source")]
    UninitializedTiming,

    /// Defensive cap for an open question the declarative interpolation
    /// format leaves unspecified: an out-of-range index is silently dropped
    /// by the caller rather than panicking. No call site can currently
    /// produce one (indices are always derived from the same sample count
    /// the buffer was sized with); this variant exists for a future caller
    /// that computes the index independently.
    #[error("CW sample index {index} out of range (buffer len {len})")]
    CwSampleIndexOutOfRange { index: usize, len: usize },

    #[error("RCS lookup unavailable for this target at the requested angle")]
    RcsUnavailable,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to open '{path}': {source}")]
    Open { path: String, source: std::io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: String, source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum FersError {
    #[error(transparent)]
    Geometry(#[from] fers_types::GeometryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Io(#[from] IoError),
}
