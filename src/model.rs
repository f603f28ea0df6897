use std::path::PathBuf;

use crate::{
    cost::{CostBreakdown, UsageMetrics},
    error::{ReelforgeError, ReelforgeResult},
};

/// A single narrated word with its timing, in seconds from narration start.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl WordTimestamp {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> ReelforgeResult<Self> {
        let w = Self {
            word: word.into(),
            start,
            end,
        };
        w.validate()?;
        Ok(w)
    }

    pub fn validate(&self) -> ReelforgeResult<()> {
        if self.word.is_empty() {
            return Err(ReelforgeError::validation("word must be non-empty"));
        }
        if !self.start.is_finite() || !self.end.is_finite() || self.start < 0.0 {
            return Err(ReelforgeError::validation(
                "word timing must be finite and start >= 0",
            ));
        }
        if self.end < self.start {
            return Err(ReelforgeError::validation(format!(
                "word end ({}) must be >= start ({})",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

/// Ordered word-level timing for a full narration track.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AudioTimestamps {
    pub words: Vec<WordTimestamp>,
    pub total_duration: f64,
}

impl AudioTimestamps {
    pub fn new(words: Vec<WordTimestamp>, total_duration: f64) -> ReelforgeResult<Self> {
        let ts = Self {
            words,
            total_duration,
        };
        ts.validate()?;
        Ok(ts)
    }

    pub fn validate(&self) -> ReelforgeResult<()> {
        if self.words.is_empty() {
            return Err(ReelforgeError::validation("timestamps must be non-empty"));
        }
        if !(self.total_duration > 0.0) {
            return Err(ReelforgeError::validation("total_duration must be > 0"));
        }
        for w in &self.words {
            w.validate()?;
        }
        Ok(())
    }

    /// Words whose `[start, end)` overlaps `[start, end)`.
    pub fn words_in_range(&self, start: f64, end: f64) -> Vec<&WordTimestamp> {
        self.words
            .iter()
            .filter(|w| w.end > start && w.start < end)
            .collect()
    }

    /// The word being spoken at `time`, if any.
    pub fn active_word_at(&self, time: f64) -> Option<&WordTimestamp> {
        self.words.iter().find(|w| w.start <= time && time < w.end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Video,
    Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Crossfade,
}

impl TransitionKind {
    /// Map a wire-level transition tag to a kind. Anything unrecognized is a
    /// straight cut (`None`), not an error.
    pub fn parse(tag: Option<&str>) -> Option<Self> {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("crossfade") => Some(Self::Crossfade),
            _ => None,
        }
    }
}

/// One timed scene of the script. `transition_out` governs the boundary into
/// the following scene.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneData {
    pub scene_id: String,
    pub kind: SceneKind,
    pub background_path: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub transition_out: Option<TransitionKind>,
    #[serde(default = "default_transition_duration")]
    pub transition_duration: f64,
}

fn default_transition_duration() -> f64 {
    0.5
}

impl SceneData {
    pub fn validate(&self) -> ReelforgeResult<()> {
        if self.scene_id.is_empty() {
            return Err(ReelforgeError::validation("scene_id must be non-empty"));
        }
        if self.background_path.is_empty() {
            return Err(ReelforgeError::validation(format!(
                "scene '{}' background_path must be non-empty",
                self.scene_id
            )));
        }
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(ReelforgeError::validation(format!(
                "scene '{}' start_time must be finite and >= 0",
                self.scene_id
            )));
        }
        if !self.end_time.is_finite() || self.end_time <= self.start_time {
            return Err(ReelforgeError::validation(format!(
                "scene '{}' end_time must be > start_time",
                self.scene_id
            )));
        }
        if !(0.0..=2.0).contains(&self.transition_duration) {
            return Err(ReelforgeError::validation(format!(
                "scene '{}' transition_duration must be within [0, 2] seconds",
                self.scene_id
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// The full declarative script: scenes ordered by start time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct VideoScript {
    pub script_id: String,
    #[serde(default = "default_title")]
    pub title: String,
    pub scenes: Vec<SceneData>,
    pub total_duration: f64,
}

fn default_title() -> String {
    "Untitled".to_string()
}

impl VideoScript {
    /// Build a script, sorting scenes by start time and validating the whole.
    pub fn new(
        script_id: impl Into<String>,
        title: impl Into<String>,
        mut scenes: Vec<SceneData>,
        total_duration: f64,
    ) -> ReelforgeResult<Self> {
        scenes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let script = Self {
            script_id: script_id.into(),
            title: title.into(),
            scenes,
            total_duration,
        };
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> ReelforgeResult<()> {
        if self.script_id.is_empty() {
            return Err(ReelforgeError::validation("script_id must be non-empty"));
        }
        if self.scenes.is_empty() {
            return Err(ReelforgeError::validation("script must contain scenes"));
        }
        if !(self.total_duration > 0.0) {
            return Err(ReelforgeError::validation(
                "script total_duration must be > 0",
            ));
        }
        for scene in &self.scenes {
            scene.validate()?;
        }
        for pair in self.scenes.windows(2) {
            if pair[1].start_time < pair[0].start_time {
                return Err(ReelforgeError::validation(
                    "scenes must be ordered by start_time",
                ));
            }
        }
        Ok(())
    }
}

/// Strongly-typed render settings. Every field is named, bounded, and
/// defaulted; there is no loosely-typed settings map anywhere downstream.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    pub preset: String,
    pub bgm_volume_db: f64,
    pub subtitle_font_path: Option<PathBuf>,
    pub subtitle_font_size: f32,
    pub subtitle_color: String,
    pub subtitle_active_color: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            video_bitrate: "8M".to_string(),
            audio_bitrate: "192k".to_string(),
            preset: "medium".to_string(),
            bgm_volume_db: -20.0,
            subtitle_font_path: None,
            subtitle_font_size: 70.0,
            subtitle_color: "white".to_string(),
            subtitle_active_color: "#FFD700".to_string(),
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> ReelforgeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelforgeError::validation(
                "render width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output requires even dimensions.
            return Err(ReelforgeError::validation(
                "render width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps == 0 {
            return Err(ReelforgeError::validation("render fps must be non-zero"));
        }
        if self.subtitle_font_size <= 0.0 {
            return Err(ReelforgeError::validation("subtitle_font_size must be > 0"));
        }
        Ok(())
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Everything the compositor needs to render one video. Constructed once at
/// submission, consumed exactly once, never mutated.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderJob {
    pub job_id: String,
    pub script: VideoScript,
    pub audio_path: String,
    pub timestamps: AudioTimestamps,
    pub bgm_path: Option<String>,
    pub output_dir: String,
    pub output_filename: String,
    pub generate_srt: bool,
    pub settings: RenderSettings,
}

impl RenderJob {
    pub fn validate(&self) -> ReelforgeResult<()> {
        if self.job_id.is_empty() {
            return Err(ReelforgeError::validation("job_id must be non-empty"));
        }
        if self.audio_path.is_empty() {
            return Err(ReelforgeError::validation("audio_path must be non-empty"));
        }
        if self.output_filename.is_empty() {
            return Err(ReelforgeError::validation(
                "output_filename must be non-empty",
            ));
        }
        self.script.validate()?;
        self.timestamps.validate()?;
        self.settings.validate()?;
        Ok(())
    }

    /// All artifacts for a job live under `output_dir/job_id/`; re-running the
    /// same job id overwrites the same directory.
    pub fn job_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.job_id)
    }

    pub fn output_path(&self) -> PathBuf {
        self.job_dir().join(&self.output_filename)
    }

    pub fn srt_path(&self) -> PathBuf {
        self.output_path().with_extension("srt")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Initializing,
    BuildingScenes,
    BuildingScene,
    Concatenating,
    MixingAudio,
    Exporting,
    GeneratingSrt,
    Completed,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::BuildingScenes => "building_scenes",
            Self::BuildingScene => "building_scene",
            Self::Concatenating => "concatenating",
            Self::MixingAudio => "mixing_audio",
            Self::Exporting => "exporting",
            Self::GeneratingSrt => "generating_srt",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress snapshot. Published repeatedly; last write wins.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderProgress {
    pub job_id: String,
    pub stage: RenderStage,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_scene: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_scenes: Option<usize>,
    pub message: String,
}

impl RenderProgress {
    pub fn new(
        job_id: impl Into<String>,
        stage: RenderStage,
        progress: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            stage,
            progress: progress.clamp(0.0, 100.0),
            current_scene: None,
            total_scenes: None,
            message: message.into(),
        }
    }

    pub fn with_scene(mut self, current: usize, total: usize) -> Self {
        self.current_scene = Some(current);
        self.total_scenes = Some(total);
        self
    }
}

/// Final outcome of one render attempt. Produced exactly once per attempt,
/// success or failure; failures still carry a best-effort cost.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderResult {
    pub job_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srt_path: Option<String>,
    /// Wall-clock render time in seconds.
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenes_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_breakdown: Option<CostBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metrics: Option<UsageMetrics>,
}

impl RenderResult {
    /// A failure skeleton: no output; the caller attaches partial cost.
    pub fn failure(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            success: false,
            output_path: None,
            srt_path: None,
            duration_seconds: 0.0,
            file_size_mb: None,
            error: Some(error.into()),
            video_duration_seconds: None,
            scenes_count: None,
            resolution: None,
            fps: None,
            cost_usd: None,
            cost_breakdown: None,
            usage_metrics: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, start: f64, end: f64) -> SceneData {
        SceneData {
            scene_id: id.to_string(),
            kind: SceneKind::Video,
            background_path: "bg.mp4".to_string(),
            start_time: start,
            end_time: end,
            text: String::new(),
            transition_out: None,
            transition_duration: 0.5,
        }
    }

    #[test]
    fn scene_duration_is_end_minus_start() {
        let s = scene("s0", 1.5, 4.0);
        assert!((s.duration() - 2.5).abs() < 1e-12);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn scene_rejects_end_before_start() {
        assert!(scene("s0", 4.0, 4.0).validate().is_err());
        assert!(scene("s0", 4.0, 1.0).validate().is_err());
    }

    #[test]
    fn scene_rejects_out_of_bounds_transition_duration() {
        let mut s = scene("s0", 0.0, 5.0);
        s.transition_duration = 2.5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn word_rejects_reversed_timing() {
        assert!(WordTimestamp::new("hi", 2.0, 1.0).is_err());
        assert!(WordTimestamp::new("hi", 1.0, 1.0).is_ok());
    }

    #[test]
    fn script_sorts_scenes_by_start_time() {
        let script = VideoScript::new(
            "sc0",
            "t",
            vec![scene("b", 5.0, 10.0), scene("a", 0.0, 5.0)],
            10.0,
        )
        .unwrap();
        assert_eq!(script.scenes[0].scene_id, "a");
        assert_eq!(script.scenes[1].scene_id, "b");
    }

    #[test]
    fn timestamps_range_and_point_queries() {
        let ts = AudioTimestamps::new(
            vec![
                WordTimestamp::new("one", 0.0, 1.0).unwrap(),
                WordTimestamp::new("two", 1.0, 2.0).unwrap(),
                WordTimestamp::new("three", 2.0, 3.0).unwrap(),
            ],
            3.0,
        )
        .unwrap();

        let hits = ts.words_in_range(0.5, 2.0);
        assert_eq!(
            hits.iter().map(|w| w.word.as_str()).collect::<Vec<_>>(),
            vec!["one", "two"]
        );
        assert_eq!(ts.active_word_at(1.5).unwrap().word, "two");
        // End bound is exclusive.
        assert_eq!(ts.active_word_at(3.0), None);
    }

    #[test]
    fn transition_parse_falls_back_to_cut() {
        assert_eq!(
            TransitionKind::parse(Some("crossfade")),
            Some(TransitionKind::Crossfade)
        );
        assert_eq!(
            TransitionKind::parse(Some("Crossfade ")),
            Some(TransitionKind::Crossfade)
        );
        assert_eq!(TransitionKind::parse(Some("slide")), None);
        assert_eq!(TransitionKind::parse(None), None);
    }

    #[test]
    fn settings_reject_odd_dimensions() {
        let mut s = RenderSettings::default();
        assert!(s.validate().is_ok());
        s.width = 1081;
        assert!(s.validate().is_err());
    }

    #[test]
    fn job_paths_are_scoped_by_job_id() {
        let job = RenderJob {
            job_id: "job-1".to_string(),
            script: VideoScript::new("sc0", "t", vec![scene("a", 0.0, 5.0)], 5.0).unwrap(),
            audio_path: "voice.wav".to_string(),
            timestamps: AudioTimestamps::new(
                vec![WordTimestamp::new("hi", 0.0, 1.0).unwrap()],
                5.0,
            )
            .unwrap(),
            bgm_path: None,
            output_dir: "/tmp/out".to_string(),
            output_filename: "output.mp4".to_string(),
            generate_srt: true,
            settings: RenderSettings::default(),
        };
        assert_eq!(
            job.output_path(),
            PathBuf::from("/tmp/out/job-1/output.mp4")
        );
        assert_eq!(job.srt_path(), PathBuf::from("/tmp/out/job-1/output.srt"));
    }

    #[test]
    fn progress_clamps_percent() {
        let p = RenderProgress::new("j", RenderStage::Exporting, 120.0, "");
        assert_eq!(p.progress, 100.0);
        let p = RenderProgress::new("j", RenderStage::Initializing, -3.0, "");
        assert_eq!(p.progress, 0.0);
    }

    #[test]
    fn result_json_roundtrip() {
        let res = RenderResult::failure("j1", "not found: bg.mp4");
        let s = serde_json::to_string(&res).unwrap();
        let de: RenderResult = serde_json::from_str(&s).unwrap();
        assert!(!de.success);
        assert!(de.error.unwrap().contains("not found"));
    }
}
