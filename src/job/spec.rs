use crate::{
    error::{ReelforgeError, ReelforgeResult},
    model::{
        AudioTimestamps, RenderJob, RenderSettings, SceneData, SceneKind, TransitionKind,
        VideoScript, WordTimestamp,
    },
};

/// Wire format of a job submission. Deserialization plus [`into_job`]
/// validation is the schema gate: anything that fails here is a permanent
/// validation error and is never retried.
///
/// [`into_job`]: RenderJobSpec::into_job
#[derive(Debug, serde::Deserialize)]
pub struct RenderJobSpec {
    pub job_id: String,
    pub script: ScriptSpec,
    pub audio_path: String,
    pub timestamps: TimestampsSpec,
    #[serde(default)]
    pub bgm_path: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_output_filename")]
    pub output_filename: String,
    #[serde(default = "default_generate_srt")]
    pub generate_srt: bool,
    #[serde(default)]
    pub settings: RenderSettings,
}

fn default_output_dir() -> String {
    "/tmp/video_output".to_string()
}

fn default_output_filename() -> String {
    "output.mp4".to_string()
}

fn default_generate_srt() -> bool {
    true
}

#[derive(Debug, serde::Deserialize)]
pub struct ScriptSpec {
    pub script_id: String,
    #[serde(default = "default_title")]
    pub title: String,
    pub scenes: Vec<SceneSpec>,
    pub total_duration: f64,
}

fn default_title() -> String {
    "Untitled".to_string()
}

#[derive(Debug, serde::Deserialize)]
pub struct SceneSpec {
    pub scene_id: String,
    #[serde(default = "default_scene_kind")]
    pub scene_type: SceneKind,
    pub background_path: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "transition_in")]
    pub transition: Option<String>,
    #[serde(default = "default_transition_duration")]
    pub transition_duration: f64,
}

fn default_scene_kind() -> SceneKind {
    SceneKind::Video
}

fn default_transition_duration() -> f64 {
    0.5
}

#[derive(Debug, serde::Deserialize)]
pub struct TimestampsSpec {
    pub words: Vec<WordSpec>,
    pub total_duration: f64,
}

#[derive(Debug, serde::Deserialize)]
pub struct WordSpec {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl RenderJobSpec {
    /// Convert the wire spec into a validated [`RenderJob`].
    pub fn into_job(self) -> ReelforgeResult<RenderJob> {
        let scenes = self
            .script
            .scenes
            .into_iter()
            .map(|s| SceneData {
                scene_id: s.scene_id,
                kind: s.scene_type,
                background_path: s.background_path,
                start_time: s.start_time,
                end_time: s.end_time,
                text: s.text,
                transition_out: TransitionKind::parse(s.transition.as_deref()),
                transition_duration: s.transition_duration,
            })
            .collect();

        let script = VideoScript::new(
            self.script.script_id,
            self.script.title,
            scenes,
            self.script.total_duration,
        )?;

        let words = self
            .timestamps
            .words
            .into_iter()
            .map(|w| WordTimestamp::new(w.word, w.start, w.end))
            .collect::<ReelforgeResult<Vec<_>>>()?;
        let timestamps = AudioTimestamps::new(words, self.timestamps.total_duration)?;

        let job = RenderJob {
            job_id: self.job_id,
            script,
            audio_path: self.audio_path,
            timestamps,
            bgm_path: self.bgm_path,
            output_dir: self.output_dir,
            output_filename: self.output_filename,
            generate_srt: self.generate_srt,
            settings: self.settings,
        };
        job.validate()?;
        Ok(job)
    }
}

/// Deserialize and validate a JSON job payload.
pub fn parse_job(payload: &str) -> ReelforgeResult<RenderJob> {
    let spec: RenderJobSpec = serde_json::from_str(payload)
        .map_err(|e| ReelforgeError::validation(format!("invalid job spec: {e}")))?;
    spec.into_job()
}
