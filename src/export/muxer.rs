use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between checks on a running mux process
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Combines the intermediate video and audio into the final container
pub trait Muxer: Send + Sync {
    /// `audio_offset` is the delay, in seconds, applied to the audio input
    fn mux(&self, video: &Path, audio: &Path, audio_offset: f64, output: &Path) -> Result<PathBuf>;
}

/// Argument list for one ffmpeg mux invocation
#[derive(Debug, Clone)]
pub struct MuxCommandBuilder {
    video: PathBuf,
    audio: PathBuf,
    output: PathBuf,
    audio_offset: f64,
    video_codec: String,
    preset: String,
    crf: u32,
    audio_codec: String,
    audio_bitrate: String,
}

impl MuxCommandBuilder {
    pub fn new(video: &Path, audio: &Path, output: &Path) -> Self {
        Self {
            video: video.to_path_buf(),
            audio: audio.to_path_buf(),
            output: output.to_path_buf(),
            audio_offset: 0.0,
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }

    pub fn with_audio_offset(mut self, offset: f64) -> Self {
        self.audio_offset = offset.max(0.0);
        self
    }

    pub fn with_video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = codec.into();
        self
    }

    pub fn build(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            self.video.display().to_string(),
            "-itsoffset".to_string(),
            format!("{:.3}", self.audio_offset),
            "-i".to_string(),
            self.audio.display().to_string(),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-shortest".to_string(),
            self.output.display().to_string(),
        ]
    }
}

/// Runs ffmpeg as a child process, killing it after `timeout`
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    binary: String,
    timeout: Duration,
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new("ffmpeg", Duration::from_secs(60))
    }
}

impl FfmpegMuxer {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Muxer for FfmpegMuxer {
    fn mux(&self, video: &Path, audio: &Path, audio_offset: f64, output: &Path) -> Result<PathBuf> {
        let args = MuxCommandBuilder::new(video, audio, output)
            .with_audio_offset(audio_offset)
            .build();
        debug!("{} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.binary))?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait().context("Failed to poll ffmpeg")? {
                Some(status) => break status,
                None if started.elapsed() >= self.timeout => {
                    if let Err(e) = child.kill() {
                        warn!("Failed to kill ffmpeg: {}", e);
                    }
                    let _ = child.wait();
                    bail!("ffmpeg timed out after {:?}", self.timeout);
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        if !status.success() {
            bail!("ffmpeg exited with {}", status);
        }
        if !output.exists() {
            bail!("ffmpeg reported success but {:?} is missing", output);
        }
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let args = MuxCommandBuilder::new(
            Path::new("rec_temp.mp4"),
            Path::new("rec_audio.wav"),
            Path::new("loom_rec.mp4"),
        )
        .with_audio_offset(0.12345)
        .build();

        assert_eq!(args[0], "-y");
        assert_eq!(args[2], "rec_temp.mp4");
        assert_eq!(args[3], "-itsoffset");
        assert_eq!(args[4], "0.123");
        assert_eq!(args[6], "rec_audio.wav");
        assert_eq!(args[8], "libx264");
        assert_eq!(args[10], "ultrafast");
        assert_eq!(args[12], "23");
        assert_eq!(args[14], "aac");
        assert_eq!(args[16], "192k");
        assert_eq!(args[17], "-shortest");
        assert_eq!(args.last().unwrap(), "loom_rec.mp4");
    }

    #[test]
    fn test_negative_offset_clamped() {
        let args = MuxCommandBuilder::new(Path::new("v"), Path::new("a"), Path::new("o"))
            .with_audio_offset(-1.0)
            .build();
        assert_eq!(args[4], "0.000");
    }

    #[test]
    fn test_missing_binary_fails() {
        let muxer = FfmpegMuxer::new("screenloom-no-such-ffmpeg", Duration::from_secs(1));
        let result = muxer.mux(Path::new("v.mp4"), Path::new("a.wav"), 0.0, Path::new("o.mp4"));
        assert!(result.is_err());
    }
}
