use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Writes buffered frames to an intermediate video file
pub trait VideoEncoder: Send + Sync {
    fn encode(&self, frames: &[RgbImage], fps: f64, path: &Path) -> Result<()>;
}

/// Pipes raw RGB frames into an ffmpeg process
#[derive(Debug, Clone)]
pub struct FfmpegVideoEncoder {
    binary: String,
    codec: String,
    preset: String,
}

impl Default for FfmpegVideoEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegVideoEncoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn build_args(&self, width: u32, height: u32, fps: f64, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            format!("{:.3}", fps),
            "-i".to_string(),
            "-".to_string(),
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            output.display().to_string(),
        ]
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn encode(&self, frames: &[RgbImage], fps: f64, path: &Path) -> Result<()> {
        let Some(first) = frames.first() else {
            bail!("no frames to encode");
        };
        let (width, height) = first.dimensions();
        let args = self.build_args(width, height, fps, path);
        debug!("{} {}", self.binary, args.join(" "));

        let mut process = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.binary))?;

        let stdin = process
            .stdin
            .take()
            .context("Failed to open ffmpeg stdin")?;
        let mut writer = BufWriter::with_capacity(8 * 1024 * 1024, stdin);

        let written: Result<()> = frames.iter().try_for_each(|frame| {
            if frame.dimensions() != (width, height) {
                bail!(
                    "frame size changed mid-recording: {:?} vs {}x{}",
                    frame.dimensions(),
                    width,
                    height
                );
            }
            writer
                .write_all(frame.as_raw())
                .context("Failed to write frame to ffmpeg")
        });
        let flushed = writer.flush().context("Failed to flush ffmpeg input");
        drop(writer);

        let status = process.wait().context("Failed to wait for ffmpeg")?;
        written?;
        flushed?;
        if !status.success() {
            bail!("ffmpeg exited with {}", status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rawvideo_args() {
        let args = FfmpegVideoEncoder::default().build_args(1280, 720, 18.5, Path::new("out.mp4"));
        assert_eq!(args[0], "-y");
        assert_eq!(args[2], "rawvideo");
        assert_eq!(args[6], "1280x720");
        assert_eq!(args[8], "18.500");
        assert_eq!(args[10], "-");
        assert_eq!(args[12], "libx264");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_custom_codec() {
        let args = FfmpegVideoEncoder::new("ffmpeg")
            .with_codec("mpeg4")
            .build_args(4, 4, 20.0, Path::new("out.mp4"));
        assert_eq!(args[12], "mpeg4");
    }

    #[test]
    fn test_empty_frames_rejected() {
        let result = FfmpegVideoEncoder::default().encode(&[], 20.0, Path::new("unused.mp4"));
        assert!(result.is_err());
    }
}
