use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    audio::AudioMixer,
    cost::{CostCalculator, UsageMetrics},
    encode::{AudioInputConfig, EncodeConfig, FfmpegEncoder},
    error::{ReelforgeError, ReelforgeResult},
    fit,
    frame::FrameRGBA,
    media::{self, VideoSourceInfo},
    model::{
        AudioTimestamps, RenderJob, RenderProgress, RenderResult, RenderStage, RenderSettings,
        SceneData, SceneKind, TransitionKind, WordTimestamp,
    },
    subtitle::{CaptionRenderer, SubtitleClip, SubtitleStyle, group::group_words, srt},
};

pub type ProgressCallback = Box<dyn Fn(&RenderProgress) + Send + Sync>;

/// Cooperative cancellation flag shared between the worker and the engine.
/// Observed at stage transitions and per exported frame.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Soft deadline and cancellation for one render run. The hard time limit is
/// the hosting worker's concern, not the engine's.
#[derive(Clone, Debug, Default)]
pub struct RenderControl {
    pub deadline: Option<Instant>,
    pub cancel: CancelToken,
}

impl RenderControl {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_soft_limit(limit: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + limit),
            cancel: CancelToken::new(),
        }
    }
}

/// A failed render: the typed error for retry classification plus the
/// failure result (partial cost included) for publication.
#[derive(Debug)]
pub struct RenderFailure {
    pub error: ReelforgeError,
    pub result: RenderResult,
}

/// The scene compositor. Builds per-scene footage with karaoke captions,
/// concatenates with crossfades, attaches mixed audio, and streams the
/// result into ffmpeg.
pub struct RenderEngine {
    settings: RenderSettings,
    mixer: AudioMixer,
    cost: CostCalculator,
    captions: CaptionRenderer,
    progress: Option<ProgressCallback>,
}

impl RenderEngine {
    pub fn new(settings: RenderSettings) -> Self {
        let mixer = AudioMixer::new(settings.bgm_volume_db);
        let captions = CaptionRenderer::new(
            settings.width,
            settings.height,
            SubtitleStyle::from_settings(&settings),
        );
        tracing::info!(
            resolution = %settings.resolution(),
            fps = settings.fps,
            preset = %settings.preset,
            "render engine initialized"
        );
        Self {
            settings,
            mixer,
            cost: CostCalculator::from_env(),
            captions,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cost(mut self, cost: CostCalculator) -> Self {
        self.cost = cost;
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn cost_calculator(&self) -> &CostCalculator {
        &self.cost
    }

    /// Execute the full pipeline. Never panics and never returns `Err`: any
    /// failure becomes a `success = false` result carrying a partial cost.
    pub fn render(&self, job: &RenderJob, ctrl: &RenderControl) -> RenderResult {
        match self.render_classified(job, ctrl) {
            Ok(result) => result,
            Err(failure) => failure.result,
        }
    }

    /// Like [`render`](Self::render) but keeps the typed error alongside the
    /// failure result so callers can classify it for retries.
    pub fn render_classified(
        &self,
        job: &RenderJob,
        ctrl: &RenderControl,
    ) -> Result<RenderResult, RenderFailure> {
        let started = Instant::now();
        match self.render_inner(job, ctrl, started) {
            Ok(result) => Ok(result),
            Err(error) => {
                let elapsed = started.elapsed().as_secs_f64();
                let partial = self.cost.calculate_partial(elapsed, None);
                tracing::error!(job_id = %job.job_id, %error, "render failed");

                let mut result = RenderResult::failure(&job.job_id, error.to_string());
                result.duration_seconds = elapsed;
                result.cost_usd = Some(partial.total_cost_usd);
                result.cost_breakdown = Some(partial);
                Err(RenderFailure { error, result })
            }
        }
    }

    fn render_inner(
        &self,
        job: &RenderJob,
        ctrl: &RenderControl,
        started: Instant,
    ) -> ReelforgeResult<RenderResult> {
        let job_id = job.job_id.as_str();
        let fps = self.settings.fps;

        self.emit(RenderProgress::new(
            job_id,
            RenderStage::Initializing,
            0.0,
            "Validating inputs",
        ));
        self.checkpoint(job_id, ctrl)?;
        job.validate()?;

        let audio_path = validate_file_exists(Path::new(&job.audio_path), "audio file")?;
        let bgm_path = job
            .bgm_path
            .as_ref()
            .map(|p| validate_file_exists(Path::new(p), "bgm file"))
            .transpose()?;
        for scene in &job.script.scenes {
            validate_file_exists(
                Path::new(&scene.background_path),
                &format!("background for scene '{}'", scene.scene_id),
            )?;
        }

        let job_dir = job.job_dir();
        std::fs::create_dir_all(&job_dir).map_err(|e| {
            ReelforgeError::encoding(format!(
                "failed to create job directory '{}': {e}",
                job_dir.display()
            ))
        })?;
        let output_path = job.output_path();

        let total_scenes = job.script.scenes.len();
        self.emit(RenderProgress::new(
            job_id,
            RenderStage::BuildingScenes,
            10.0,
            format!("Building {total_scenes} scenes"),
        ));

        let mut scene_clips = Vec::with_capacity(total_scenes);
        for (i, scene) in job.script.scenes.iter().enumerate() {
            self.checkpoint(job_id, ctrl)?;
            self.emit(
                RenderProgress::new(
                    job_id,
                    RenderStage::BuildingScene,
                    10.0 + (i as f64 / total_scenes as f64) * 40.0,
                    format!("Building scene {}/{total_scenes}", i + 1),
                )
                .with_scene(i + 1, total_scenes),
            );
            scene_clips.push(self.build_scene_clip(job, i)?);
        }

        self.emit(RenderProgress::new(
            job_id,
            RenderStage::Concatenating,
            55.0,
            "Assembling final video",
        ));
        self.checkpoint(job_id, ctrl)?;

        let total_frames: u64 = scene_clips.iter().map(|c| c.frames).sum();
        let video_duration = total_frames as f64 / f64::from(fps);
        tracing::info!(job_id, video_duration, total_frames, "video assembled");

        self.emit(RenderProgress::new(
            job_id,
            RenderStage::MixingAudio,
            65.0,
            "Mixing audio tracks",
        ));
        self.checkpoint(job_id, ctrl)?;

        let mixed = self.mixer.mix(
            &audio_path,
            bgm_path.as_deref(),
            video_duration,
            1.0,
            2.0,
        )?;
        let mix_path = job_dir.join("narration_mix.f32le");
        crate::audio::write_mix_to_f32le_file(&mixed.interleaved_f32, &mix_path)?;
        let _mix_guard = TempFileGuard(Some(mix_path.clone()));

        self.emit(RenderProgress::new(
            job_id,
            RenderStage::Exporting,
            70.0,
            format!("Encoding video (libx264, {})", self.settings.preset),
        ));

        let mut encoder = FfmpegEncoder::new(EncodeConfig {
            width: self.settings.width,
            height: self.settings.height,
            fps,
            out_path: output_path.clone(),
            overwrite: true,
            video_bitrate: self.settings.video_bitrate.clone(),
            audio_bitrate: self.settings.audio_bitrate.clone(),
            preset: self.settings.preset.clone(),
            audio: Some(AudioInputConfig {
                path: mix_path,
                sample_rate: mixed.sample_rate,
                channels: mixed.channels,
            }),
        })?;

        let mut scratch = FrameRGBA::solid(self.settings.width, self.settings.height, [0, 0, 0]);
        for clip in &mut scene_clips {
            for local_frame in 0..clip.frames {
                self.checkpoint(job_id, ctrl)?;
                let t = local_frame as f64 / f64::from(fps);

                match &mut clip.source {
                    SceneSource::Image(fitted) => scratch.copy_from(fitted)?,
                    SceneSource::Video(decoder) => {
                        let src_t = decoder.source_time(t, clip.duration);
                        let frame = decoder.frame_at(src_t)?;
                        scratch.copy_from(&frame)?;
                    }
                }

                for caption in &mut clip.captions {
                    if caption.covers(t) {
                        let bitmap = caption.frame_at(&self.captions, t);
                        scratch.overlay(&bitmap, caption.x, caption.y);
                    }
                }

                let fade = boundary_fade_factor(t, clip.duration, clip.fade_in, clip.fade_out);
                scratch.scale_brightness(fade);

                encoder.encode_frame(&scratch)?;
            }
        }

        let output_path = encoder.finish()?;

        let srt_path = if job.generate_srt {
            self.emit(RenderProgress::new(
                job_id,
                RenderStage::GeneratingSrt,
                95.0,
                "Generating subtitle file",
            ));
            let style = self.captions.style();
            let groups = group_words(
                &job.timestamps,
                style.max_words_per_group,
                style.max_chars_per_line,
            );
            let path = job.srt_path();
            srt::write_srt(&groups, &path, style.max_chars_per_line)?;
            Some(path)
        } else {
            None
        };

        let file_size_bytes = std::fs::metadata(&output_path)
            .map_err(|e| {
                ReelforgeError::encoding(format!(
                    "failed to stat output '{}': {e}",
                    output_path.display()
                ))
            })?
            .len();
        let file_size_mb = (file_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

        let render_duration = started.elapsed().as_secs_f64();
        let usage = UsageMetrics::new(
            render_duration,
            video_duration,
            total_scenes,
            self.settings.width,
            self.settings.height,
            fps,
            Some(file_size_mb),
        );
        let breakdown = self.cost.calculate(&usage, false, false);

        self.emit(RenderProgress::new(
            job_id,
            RenderStage::Completed,
            100.0,
            format!(
                "Render complete: {file_size_mb}MB in {render_duration:.1}s, cost=${:.6}",
                breakdown.total_cost_usd
            ),
        ));
        tracing::info!(
            job_id,
            output = %output_path.display(),
            size_mb = file_size_mb,
            cost_usd = breakdown.total_cost_usd,
            "render complete"
        );

        Ok(RenderResult {
            job_id: job_id.to_string(),
            success: true,
            output_path: Some(output_path.display().to_string()),
            srt_path: srt_path.map(|p| p.display().to_string()),
            duration_seconds: render_duration,
            file_size_mb: Some(file_size_mb),
            error: None,
            video_duration_seconds: Some(video_duration),
            scenes_count: Some(total_scenes),
            resolution: Some(self.settings.resolution()),
            fps: Some(fps),
            cost_usd: Some(breakdown.total_cost_usd),
            cost_breakdown: Some(breakdown),
            usage_metrics: Some(usage),
        })
    }

    /// Load and fit one scene's background and attach its rebased captions.
    fn build_scene_clip(&self, job: &RenderJob, index: usize) -> ReelforgeResult<SceneClip> {
        let scene = &job.script.scenes[index];
        let duration = scene.duration();
        let frames = scene_frame_count(duration, self.settings.fps);

        let source = match scene.kind {
            SceneKind::Image => {
                let img = image::open(&scene.background_path)
                    .map_err(|e| {
                        ReelforgeError::encoding(format!(
                            "failed to decode image '{}': {e}",
                            scene.background_path
                        ))
                    })?
                    .to_rgba8();
                let fitted =
                    fit::fit_rgba_image(&img, self.settings.width, self.settings.height)?;
                SceneSource::Image(Arc::new(FrameRGBA::from_rgba_image(&fitted)))
            }
            SceneKind::Video => {
                let info = media::probe_video(Path::new(&scene.background_path))?;
                SceneSource::Video(VideoFrameDecoder::new(
                    info,
                    self.settings.width,
                    self.settings.height,
                ))
            }
        };

        let captions = self.build_scene_captions(&job.timestamps, scene);

        Ok(SceneClip {
            duration,
            frames,
            source,
            captions,
            fade_in: incoming_fade(&job.script.scenes, index),
            fade_out: outgoing_fade(&job.script.scenes, index),
        })
    }

    /// Rebase caption words overlapping the scene to scene-local time and
    /// build their clips.
    fn build_scene_captions(
        &self,
        timestamps: &AudioTimestamps,
        scene: &SceneData,
    ) -> Vec<SubtitleClip> {
        let duration = scene.duration();
        let words: Vec<WordTimestamp> = timestamps
            .words_in_range(scene.start_time, scene.end_time)
            .into_iter()
            .filter_map(|w| {
                let start = (w.start - scene.start_time).max(0.0);
                let end = (w.end - scene.start_time).min(duration);
                (end > start).then(|| WordTimestamp {
                    word: w.word.clone(),
                    start,
                    end,
                })
            })
            .collect();

        if words.is_empty() {
            return Vec::new();
        }

        self.captions.build_clips(&AudioTimestamps {
            words,
            total_duration: duration,
        })
    }

    fn checkpoint(&self, job_id: &str, ctrl: &RenderControl) -> ReelforgeResult<()> {
        if ctrl.cancel.is_cancelled() {
            return Err(ReelforgeError::cancelled(format!(
                "job '{job_id}' received a termination signal"
            )));
        }
        if let Some(deadline) = ctrl.deadline
            && Instant::now() >= deadline
        {
            return Err(ReelforgeError::timeout(format!("job '{job_id}' render")));
        }
        Ok(())
    }

    fn emit(&self, progress: RenderProgress) {
        tracing::info!(
            job_id = %progress.job_id,
            stage = %progress.stage,
            percent = progress.progress,
            message = %progress.message,
            "render progress"
        );
        if let Some(callback) = &self.progress {
            callback(&progress);
        }
    }
}

fn validate_file_exists(path: &Path, what: &str) -> ReelforgeResult<PathBuf> {
    if !path.exists() {
        return Err(ReelforgeError::not_found(format!(
            "{what} '{}'",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

pub(crate) fn scene_frame_count(duration: f64, fps: u32) -> u64 {
    ((duration * f64::from(fps)).round() as u64).max(1)
}

/// Brightness multiplier implementing crossfade boundaries: ramp from black
/// over the first `fade_in` seconds and back to black over the last
/// `fade_out` seconds. Fades live inside existing footage; nothing shortens.
pub(crate) fn boundary_fade_factor(t: f64, duration: f64, fade_in: f64, fade_out: f64) -> f32 {
    let mut factor = 1.0f64;
    if fade_in > 0.0 && t < fade_in {
        factor *= (t / fade_in).clamp(0.0, 1.0);
    }
    if fade_out > 0.0 {
        let remaining = duration - t;
        if remaining < fade_out {
            factor *= (remaining / fade_out).clamp(0.0, 1.0);
        }
    }
    factor as f32
}

fn incoming_fade(scenes: &[SceneData], index: usize) -> f64 {
    if index == 0 {
        return 0.0;
    }
    crossfade_duration(&scenes[index - 1])
}

fn outgoing_fade(scenes: &[SceneData], index: usize) -> f64 {
    if index + 1 >= scenes.len() {
        return 0.0;
    }
    crossfade_duration(&scenes[index])
}

fn crossfade_duration(scene: &SceneData) -> f64 {
    match scene.transition_out {
        Some(TransitionKind::Crossfade) if scene.transition_duration > 0.0 => {
            scene.transition_duration
        }
        _ => 0.0,
    }
}

enum SceneSource {
    Image(Arc<FrameRGBA>),
    Video(VideoFrameDecoder),
}

struct SceneClip {
    duration: f64,
    frames: u64,
    source: SceneSource,
    captions: Vec<SubtitleClip>,
    fade_in: f64,
    fade_out: f64,
}

/// Decodes video frames through ffmpeg in small batches and caches them
/// fitted to the target canvas, keyed by source millisecond with LRU
/// eviction.
struct VideoFrameDecoder {
    info: VideoSourceInfo,
    dst_w: u32,
    dst_h: u32,
    frame_cache: HashMap<u64, Arc<FrameRGBA>>,
    lru: VecDeque<u64>,
    capacity: usize,
    prefetch_frames: u32,
}

impl VideoFrameDecoder {
    fn new(info: VideoSourceInfo, dst_w: u32, dst_h: u32) -> Self {
        let capacity = std::env::var("REELFORGE_VIDEO_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(64);
        let prefetch_frames = std::env::var("REELFORGE_VIDEO_PREFETCH_FRAMES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(12);
        Self {
            info,
            dst_w,
            dst_h,
            frame_cache: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
            prefetch_frames,
        }
    }

    /// Map scene-local time to source time: loop when the source is shorter
    /// than the scene, trim when it is longer.
    fn source_time(&self, local_t: f64, scene_duration: f64) -> f64 {
        let dur = self.info.duration_sec;
        if dur <= 0.0 {
            return 0.0;
        }
        // Stay strictly inside the source so the decoder always has a frame.
        let max_t = (dur - 0.5 / self.info.source_fps().max(1.0)).max(0.0);
        if dur >= scene_duration {
            local_t.min(max_t)
        } else {
            (local_t % dur).min(max_t)
        }
    }

    fn frame_at(&mut self, source_time_s: f64) -> ReelforgeResult<Arc<FrameRGBA>> {
        let key = self.key_for_time(source_time_s);
        if let Some(frame) = self.frame_cache.get(&key).cloned() {
            self.touch(key);
            return Ok(frame);
        }

        if self.prefetch_for_key(key).is_ok()
            && let Some(frame) = self.frame_cache.get(&key).cloned()
        {
            self.touch(key);
            return Ok(frame);
        }

        // Sparse request the batch prefetch did not cover.
        let mut frames = media::decode_video_frames_rgba8(&self.info, source_time_s, 1)?;
        let raw = frames.pop().ok_or_else(|| {
            ReelforgeError::encoding(format!(
                "ffmpeg returned no video frames for '{}'",
                self.info.source_path.display()
            ))
        })?;
        let frame = self.fit_raw(&raw)?;
        self.insert_frame(key, frame.clone());
        Ok(frame)
    }

    fn key_for_time(&self, source_time_s: f64) -> u64 {
        (source_time_s.max(0.0) * 1000.0).round() as u64
    }

    fn prefetch_for_key(&mut self, key_ms: u64) -> ReelforgeResult<()> {
        let source_fps = self.info.source_fps();
        let step_ms = if source_fps.is_finite() && source_fps > 0.0 {
            1000.0 / source_fps
        } else {
            1.0
        };
        let window_ms = (step_ms * f64::from(self.prefetch_frames)).max(step_ms);
        let bucket = (key_ms as f64 / window_ms).floor();
        let start_key_ms = (bucket * window_ms).round().max(0.0) as u64;
        let start_time_s = start_key_ms as f64 / 1000.0;
        let frames =
            media::decode_video_frames_rgba8(&self.info, start_time_s, self.prefetch_frames)?;

        for (offset, raw) in frames.iter().enumerate() {
            let key = (start_key_ms as f64 + offset as f64 * step_ms).round() as u64;
            if self.frame_cache.contains_key(&key) {
                self.touch(key);
                continue;
            }
            let frame = self.fit_raw(raw)?;
            self.insert_frame(key, frame);
        }
        Ok(())
    }

    fn fit_raw(&self, raw: &[u8]) -> ReelforgeResult<Arc<FrameRGBA>> {
        let fitted =
            fit::fit_rgba_buffer(raw, self.info.width, self.info.height, self.dst_w, self.dst_h)?;
        Ok(Arc::new(FrameRGBA::from_rgba_image(&fitted)))
    }

    fn insert_frame(&mut self, key: u64, frame: Arc<FrameRGBA>) {
        self.frame_cache.insert(key, frame);
        self.touch(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.frame_cache.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.lru.iter().position(|&k| k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RenderSettings, SceneData, SceneKind, VideoScript};

    fn scene(id: &str, start: f64, end: f64, transition: Option<TransitionKind>) -> SceneData {
        SceneData {
            scene_id: id.to_string(),
            kind: SceneKind::Video,
            background_path: "/nonexistent/bg.mp4".to_string(),
            start_time: start,
            end_time: end,
            text: String::new(),
            transition_out: transition,
            transition_duration: 0.5,
        }
    }

    fn job_with_missing_files() -> RenderJob {
        RenderJob {
            job_id: "job-missing".to_string(),
            script: VideoScript::new("s", "t", vec![scene("a", 0.0, 5.0, None)], 5.0).unwrap(),
            audio_path: "/nonexistent/voice.wav".to_string(),
            timestamps: AudioTimestamps {
                words: vec![WordTimestamp {
                    word: "hi".to_string(),
                    start: 0.0,
                    end: 1.0,
                }],
                total_duration: 5.0,
            },
            bgm_path: None,
            output_dir: "target/engine_tests".to_string(),
            output_filename: "output.mp4".to_string(),
            generate_srt: false,
            settings: RenderSettings::default(),
        }
    }

    #[test]
    fn scene_frame_counts_round_to_fps_grid() {
        assert_eq!(scene_frame_count(5.0, 30), 150);
        assert_eq!(scene_frame_count(0.016, 30), 1);
        assert_eq!(scene_frame_count(1.0 / 30.0, 30), 1);
        assert_eq!(scene_frame_count(10.0, 30), 300);
    }

    #[test]
    fn fade_factor_ramps_at_boundaries_only() {
        // No fades configured.
        assert_eq!(boundary_fade_factor(2.5, 5.0, 0.0, 0.0), 1.0);
        // Fade-in ramp.
        assert_eq!(boundary_fade_factor(0.0, 5.0, 0.5, 0.0), 0.0);
        assert!((boundary_fade_factor(0.25, 5.0, 0.5, 0.0) - 0.5).abs() < 1e-6);
        assert_eq!(boundary_fade_factor(0.5, 5.0, 0.5, 0.0), 1.0);
        // Fade-out ramp.
        assert!((boundary_fade_factor(4.75, 5.0, 0.0, 0.5) - 0.5).abs() < 1e-6);
        assert!(boundary_fade_factor(5.0, 5.0, 0.0, 0.5) < 1e-6);
        // Middle is untouched by both.
        assert_eq!(boundary_fade_factor(2.5, 5.0, 0.5, 0.5), 1.0);
    }

    #[test]
    fn crossfade_fades_apply_to_adjacent_scenes() {
        let scenes = vec![
            scene("a", 0.0, 5.0, Some(TransitionKind::Crossfade)),
            scene("b", 5.0, 10.0, None),
            scene("c", 10.0, 15.0, None),
        ];
        // Scene a fades out into b; b fades in from a; the b->c boundary is a
        // straight cut.
        assert_eq!(incoming_fade(&scenes, 0), 0.0);
        assert_eq!(outgoing_fade(&scenes, 0), 0.5);
        assert_eq!(incoming_fade(&scenes, 1), 0.5);
        assert_eq!(outgoing_fade(&scenes, 1), 0.0);
        assert_eq!(incoming_fade(&scenes, 2), 0.0);
        // The last scene never fades out, even when it requests a transition.
        let scenes = vec![scene("a", 0.0, 5.0, Some(TransitionKind::Crossfade))];
        assert_eq!(outgoing_fade(&scenes, 0), 0.0);
    }

    #[test]
    fn missing_audio_fails_with_not_found_and_partial_cost() {
        let engine = RenderEngine::new(RenderSettings::default());
        let job = job_with_missing_files();

        let failure = engine
            .render_classified(&job, &RenderControl::unbounded())
            .unwrap_err();
        assert!(matches!(failure.error, ReelforgeError::NotFound(_)));
        assert!(!failure.result.success);
        assert!(failure.result.error.as_ref().unwrap().contains("not found"));
        assert!(failure.result.cost_usd.unwrap() >= 0.0);
        assert!(failure.result.cost_breakdown.is_some());

        // The lenient entry point folds the failure into a result.
        let result = engine.render(&job, &RenderControl::unbounded());
        assert!(!result.success);
    }

    #[test]
    fn cancelled_token_aborts_before_any_work() {
        let engine = RenderEngine::new(RenderSettings::default());
        let job = job_with_missing_files();
        let ctrl = RenderControl::unbounded();
        ctrl.cancel.cancel();

        let failure = engine.render_classified(&job, &ctrl).unwrap_err();
        assert!(matches!(failure.error, ReelforgeError::Cancelled(_)));
    }

    #[test]
    fn expired_deadline_aborts_with_timeout() {
        let engine = RenderEngine::new(RenderSettings::default());
        let job = job_with_missing_files();
        let ctrl = RenderControl {
            deadline: Some(Instant::now() - Duration::from_secs(1)),
            cancel: CancelToken::new(),
        };

        let failure = engine.render_classified(&job, &ctrl).unwrap_err();
        assert!(matches!(failure.error, ReelforgeError::Timeout(_)));
        assert!(
            failure
                .result
                .error
                .as_ref()
                .unwrap()
                .contains("exceeded soft time limit")
        );
    }
}
