//! Shared geometry, interpolation, and wire-format types for the FERS
//! bistatic/monostatic radar scene simulator. This crate has no engine or
//! concurrency dependency so it can be reused by the scenario parser, the
//! KML exporter, and other collaborators that the core engine (`fers`)
//! never links against.

pub mod binary;
pub mod error;
pub mod geo;
pub mod interp_set;
pub mod path;

pub use error::GeometryError;
pub use geo::{normalize_angle_2pi, normalize_angle_pi, EPSILON, S3, V3};
pub use interp_set::InterpSet;
pub use path::{MotionPath, Path, PathMode, RotationPath, TimedCoord, TimedRot};
