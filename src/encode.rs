use std::{
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    error::{ReelforgeError, ReelforgeResult},
    frame::FrameRGBA,
    media::{ensure_parent_dir, is_ffmpeg_on_path},
};

/// Raw PCM side input muxed into the output container.
#[derive(Clone, Debug)]
pub struct AudioInputConfig {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub preset: String,
    pub audio: Option<AudioInputConfig>,
}

impl EncodeConfig {
    pub fn validate(&self) -> ReelforgeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelforgeError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(ReelforgeError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // The default settings target yuv420p output for maximum compatibility.
            return Err(ReelforgeError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if let Some(audio) = &self.audio {
            if audio.sample_rate == 0 {
                return Err(ReelforgeError::validation(
                    "audio sample_rate must be non-zero when audio is enabled",
                ));
            }
            if audio.channels == 0 {
                return Err(ReelforgeError::validation(
                    "audio channels must be non-zero when audio is enabled",
                ));
            }
        }
        Ok(())
    }
}

/// Streams raw RGBA frames into the system `ffmpeg` binary, producing an
/// H.264/AAC MP4 (yuv420p, `+faststart`).
///
/// The encode targets `<out_path>.part` and only renames to the final path
/// when ffmpeg exits cleanly, so an interrupted worker never leaves a corrupt
/// "final" artifact. Dropping an unfinished encoder kills the child process
/// and removes the partial file.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    part_path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    frames_written: u64,
}

fn part_path_for(out_path: &Path) -> PathBuf {
    let mut name = out_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    out_path.with_file_name(name)
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> ReelforgeResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(ReelforgeError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(ReelforgeError::encoding(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let part_path = part_path_for(&cfg.out_path);

        // The system `ffmpeg` binary is used rather than linking FFmpeg
        // libraries, which keeps native dev headers out of the build.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
        ]);

        if let Some(audio) = cfg.audio.as_ref() {
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&audio.path)
            .args(["-c:a", "aac", "-b:a", &cfg.audio_bitrate, "-shortest"]);
        } else {
            cmd.arg("-an");
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-preset",
            &cfg.preset,
            "-b:v",
            &cfg.video_bitrate,
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
        ])
        .arg(&part_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReelforgeError::encoding(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelforgeError::encoding("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelforgeError::encoding("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(Self {
            cfg,
            part_path,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn encode_frame(&mut self, frame: &FrameRGBA) -> ReelforgeResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(ReelforgeError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        frame.validate_len()?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelforgeError::encoding("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&frame.data).map_err(|e| {
            ReelforgeError::encoding(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close stdin, wait for ffmpeg, and atomically move the finished file
    /// into place.
    pub fn finish(mut self) -> ReelforgeResult<PathBuf> {
        drop(self.stdin.take());

        let mut child = self
            .child
            .take()
            .ok_or_else(|| ReelforgeError::encoding("ffmpeg encoder not started"))?;
        let status = child.wait().map_err(|e| {
            ReelforgeError::encoding(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelforgeError::encoding("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelforgeError::encoding(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ReelforgeError::encoding(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        std::fs::rename(&self.part_path, &self.cfg.out_path).map_err(|e| {
            ReelforgeError::encoding(format!(
                "failed to move encoded file into place '{}': {e}",
                self.cfg.out_path.display()
            ))
        })?;
        tracing::debug!(
            frames = self.frames_written,
            out = %self.cfg.out_path.display(),
            "encode finished"
        );
        Ok(self.cfg.out_path.clone())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Abandoned encode: release the child and never leave a stale .part
        // behind.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            let _ = std::fs::remove_file(&self.part_path);
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}
