use image::RgbImage;

/// Captured frames and their capture times, kept in lockstep.
///
/// Timestamps are seconds since the session start instant. A timestamp that
/// would go backwards is clamped to the previous one, so the sequence is
/// always non-decreasing.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    frames: Vec<RgbImage>,
    timestamps: Vec<f64>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: RgbImage, timestamp_secs: f64) {
        let timestamp = match self.timestamps.last() {
            Some(&last) if timestamp_secs < last => last,
            _ => timestamp_secs,
        };
        self.frames.push(frame);
        self.timestamps.push(timestamp);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    pub fn into_parts(self) -> (Vec<RgbImage>, Vec<f64>) {
        (self.frames, self.timestamps)
    }
}
