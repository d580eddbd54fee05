//! Detection sources.
//!
//! Real detectors (model inference, video capture and decode) are external
//! collaborators; the daemon only needs a seam that yields one fully-formed
//! detection list per frame. The scripted source stands in for a live
//! detector in demos and tests.

use anyhow::Result;

use crate::detect::Detection;

/// One frame's worth of detector output.
#[derive(Clone, Debug, Default)]
pub struct FrameDetections {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

/// Produces per-frame detection lists for the daemon loop.
pub trait DetectionSource {
    /// Next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<FrameDetections>>;
}

/// Replays a fixed sequence of frames, optionally looping forever.
pub struct ScriptedSource {
    frames: Vec<FrameDetections>,
    cursor: usize,
    looping: bool,
}

impl ScriptedSource {
    pub fn new(frames: Vec<FrameDetections>) -> Self {
        Self {
            frames,
            cursor: 0,
            looping: false,
        }
    }

    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }
}

impl DetectionSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<FrameDetections>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(frame))
    }
}
