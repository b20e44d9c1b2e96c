//! Binary output sink (spec §6): one file per receiver, a `FileHeader`
//! written once followed by one `PulseResponseHeader` + interleaved complex
//! samples per finalized window. CSV/XML/KML export are collaborators this
//! core only produces data for; they aren't implemented here.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fers_types::binary::{FileHeader, PulseResponseHeader};

use crate::error::IoError;
use crate::render::RenderedWindow;

/// Appends windows to a single receiver's output file in arrival order.
/// Windows may arrive out of order across receivers but never within one
/// receiver's own finalizer thread, so no window-level buffering is needed.
pub struct BinarySink {
    writer: BufWriter<File>,
    path: PathBuf,
    header_written: bool,
    float_size: u16,
}

impl BinarySink {
    pub fn create(path: impl AsRef<Path>, float_size: u16) -> Result<Self, IoError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| IoError::Open { path: path.display().to_string(), source })?;
        Ok(Self { writer: BufWriter::new(file), path, header_written: false, float_size })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.writer.write_all(bytes).map_err(|source| IoError::Write { path: self.path.display().to_string(), source })
    }

    fn ensure_file_header(&mut self) -> Result<(), IoError> {
        if self.header_written {
            return Ok(());
        }
        let header = FileHeader::new(self.float_size);
        self.write_bytes(bytemuck::bytes_of(&header))?;
        self.header_written = true;
        Ok(())
    }

    pub fn write_window(&mut self, window: &RenderedWindow) -> Result<(), IoError> {
        self.ensure_file_header()?;
        let header = PulseResponseHeader::new(window.samples.len() as u32, window.rate, window.start);
        self.write_bytes(bytemuck::bytes_of(&header))?;
        for sample in &window.samples {
            if self.float_size == 4 {
                self.write_bytes(&(sample.re as f32).to_le_bytes())?;
                self.write_bytes(&(sample.im as f32).to_le_bytes())?;
            } else {
                self.write_bytes(&sample.re.to_le_bytes())?;
                self.write_bytes(&sample.im.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), IoError> {
        self.writer.flush().map_err(|source| IoError::Write { path: self.path.display().to_string(), source })
    }
}

/// Build a `render::spawn`-compatible sink closure writing to `path`.
/// `float_size` must be 4 or 8; anything else is treated as 8 (spec §6 gives
/// no explicit default, the engine's internal precision is f64).
pub fn binary_sink(
    path: impl AsRef<Path>,
    float_size: u16,
) -> Result<impl Fn(RenderedWindow) + Send + Sync + 'static, IoError> {
    let sink = Mutex::new(BinarySink::create(path, float_size)?);
    Ok(move |window: RenderedWindow| {
        let mut sink = sink.lock().unwrap();
        if let Err(err) = sink.write_window(&window) {
            tracing::error!(%err, "failed to write receiver window");
        }
    })
}
