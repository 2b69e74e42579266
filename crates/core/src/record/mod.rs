use std::io::Write;

use crate::{
    render::{FrameSink, RenderFrame},
    Result,
};

/// Writes presented frames as JSON lines while recording is active.
#[derive(Debug)]
pub struct FrameRecorder<W: Write> {
    writer: W,
    is_recording: bool,
    frames_written: u64,
}

impl<W: Write> FrameRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            is_recording: false,
            frames_written: 0,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.is_recording = true;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.is_recording = false;
        self.writer.flush()?;
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for FrameRecorder<W> {
    fn present(&mut self, frame: &RenderFrame) -> Result<()> {
        if !self.is_recording {
            return Ok(());
        }
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")?;
        self.frames_written += 1;
        Ok(())
    }
}
