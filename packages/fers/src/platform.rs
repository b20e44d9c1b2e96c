//! Named platforms owning one motion path and one rotation path (spec §2
//! item 4, §4.5's "platform" references). Radars and targets attach to a
//! platform by index rather than owning it directly (§9 owning-graph note).

use fers_types::{GeometryError, MotionPath, RotationPath, S3, V3};

#[derive(Debug, Clone)]
pub struct Platform {
    pub name: String,
    motion: MotionPath,
    rotation: RotationPath,
}

impl Platform {
    pub fn new(name: impl Into<String>, motion: MotionPath, rotation: RotationPath) -> Self {
        Self { name: name.into(), motion, rotation }
    }

    pub fn finalize(&mut self) -> Result<(), GeometryError> {
        self.motion.finalize()?;
        self.rotation.finalize()?;
        Ok(())
    }

    pub fn position(&self, t: f64) -> Result<V3, GeometryError> {
        self.motion.position(t)
    }

    pub fn orientation(&self, t: f64) -> Result<S3, GeometryError> {
        self.rotation.orientation(t)
    }
}
