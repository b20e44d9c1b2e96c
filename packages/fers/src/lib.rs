//! FERS: an event-driven bistatic/monostatic radar scene simulator.
//!
//! A [`world::World`] holds every platform, radar node, and target. An
//! [`engine::Engine`] walks the event queue it implies (pulse fires, CW
//! on/off transitions, receiver window closes) and produces per-receiver
//! [`radar::Response`]s; a pool of renderer threads (see [`render`]) turns
//! those into complex baseband I/Q streams, which [`output`] writes to disk.

pub mod antenna;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod platform;
pub mod radar;
pub mod render;
pub mod signal;
pub mod target;
pub mod timing;
pub mod world;

pub use error::{ConfigError, FersError, IoError, RuntimeError};
pub use world::{World, WorldConfig};
