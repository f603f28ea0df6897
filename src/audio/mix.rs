use std::path::Path;

use crate::{
    error::{ReelforgeError, ReelforgeResult},
    media::{self, AudioPcm, MIX_SAMPLE_RATE},
};

/// Extensions the mixer accepts. Checked before any decoding work starts.
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "ogg", "flac", "aac"];

/// Convert decibels to an amplitude multiplier.
///
/// -20 dB ~ 0.1, -6 dB ~ 0.5, 0 dB = 1.0.
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Inverse of [`db_to_amplitude`]. Zero amplitude maps to negative infinity.
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    20.0 * amplitude.log10()
}

fn target_frames(duration_sec: f64, sample_rate: u32) -> usize {
    (duration_sec * f64::from(sample_rate)).round().max(0.0) as usize
}

fn trim_to_frames(pcm: &AudioPcm, frames: usize) -> AudioPcm {
    let samples = frames * usize::from(pcm.channels);
    AudioPcm {
        sample_rate: pcm.sample_rate,
        channels: pcm.channels,
        interleaved_f32: pcm.interleaved_f32[..samples.min(pcm.interleaved_f32.len())].to_vec(),
    }
}

/// Loop `pcm` so its duration equals `target_sec` within one sample: trim when
/// already long enough, otherwise concatenate whole copies plus a trimmed head.
pub fn loop_to_duration(pcm: &AudioPcm, target_sec: f64) -> AudioPcm {
    let frames = target_frames(target_sec, pcm.sample_rate);
    if pcm.frame_count() == 0 {
        return AudioPcm::silence(target_sec, pcm.sample_rate, pcm.channels);
    }
    if pcm.frame_count() >= frames {
        return trim_to_frames(pcm, frames);
    }

    let samples = frames * usize::from(pcm.channels);
    let mut out = Vec::with_capacity(samples);
    while out.len() < samples {
        let remaining = samples - out.len();
        let take = remaining.min(pcm.interleaved_f32.len());
        out.extend_from_slice(&pcm.interleaved_f32[..take]);
    }
    AudioPcm {
        sample_rate: pcm.sample_rate,
        channels: pcm.channels,
        interleaved_f32: out,
    }
}

/// Pad `pcm` with trailing silence to `target_sec`, or trim when longer.
pub fn pad_to_duration(pcm: &AudioPcm, target_sec: f64) -> AudioPcm {
    let frames = target_frames(target_sec, pcm.sample_rate);
    if pcm.frame_count() >= frames {
        return trim_to_frames(pcm, frames);
    }
    let samples = frames * usize::from(pcm.channels);
    let mut out = pcm.interleaved_f32.clone();
    out.resize(samples, 0.0);
    AudioPcm {
        sample_rate: pcm.sample_rate,
        channels: pcm.channels,
        interleaved_f32: out,
    }
}

/// Apply linear fade-in/out ramps. A fade only applies when strictly shorter
/// than the clip, which keeps degenerate fades from silencing whole tracks.
pub fn apply_fades(pcm: &mut AudioPcm, fade_in_sec: f64, fade_out_sec: f64) {
    let duration = pcm.duration_sec();
    let channels = usize::from(pcm.channels);
    let total_frames = pcm.frame_count();

    if fade_in_sec > 0.0 && fade_in_sec < duration {
        let fade_frames = target_frames(fade_in_sec, pcm.sample_rate).min(total_frames);
        for frame in 0..fade_frames {
            let gain = frame as f32 / fade_frames as f32;
            for c in 0..channels {
                pcm.interleaved_f32[frame * channels + c] *= gain;
            }
        }
    }

    if fade_out_sec > 0.0 && fade_out_sec < duration {
        let fade_frames = target_frames(fade_out_sec, pcm.sample_rate).min(total_frames);
        for i in 0..fade_frames {
            let frame = total_frames - 1 - i;
            let gain = i as f32 / fade_frames as f32;
            for c in 0..channels {
                pcm.interleaved_f32[frame * channels + c] *= gain;
            }
        }
    }
}

/// Multiply every sample by `amplitude`.
pub fn apply_gain(pcm: &mut AudioPcm, amplitude: f64) {
    if (amplitude - 1.0).abs() < f64::EPSILON {
        return;
    }
    let gain = amplitude as f32;
    for s in &mut pcm.interleaved_f32 {
        *s *= gain;
    }
}

/// Normalize peak amplitude to `target_db`. Silence is returned unchanged.
pub fn normalize(pcm: &mut AudioPcm, target_db: f64) {
    let peak = pcm
        .interleaved_f32
        .iter()
        .fold(0f32, |acc, s| acc.max(s.abs()));
    if peak == 0.0 {
        return;
    }
    let current_db = amplitude_to_db(f64::from(peak));
    apply_gain(pcm, db_to_amplitude(target_db - current_db));
}

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub fn write_mix_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> ReelforgeResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ReelforgeError::encoding(format!(
                "failed to create audio mix output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        ReelforgeError::encoding(format!(
            "failed to write mixed audio file '{}': {e}",
            out_path.display()
        ))
    })
}

/// Mixes voice narration with looped background music at a configured dB
/// offset. Pure PCM work; file IO happens only in [`AudioMixer::load`].
#[derive(Clone, Debug)]
pub struct AudioMixer {
    pub bgm_volume_db: f64,
    pub voice_volume_db: f64,
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self {
            bgm_volume_db: -20.0,
            voice_volume_db: 0.0,
        }
    }
}

impl AudioMixer {
    pub fn new(bgm_volume_db: f64) -> Self {
        Self {
            bgm_volume_db,
            ..Self::default()
        }
    }

    /// Load and decode an audio file to the mix format. Unsupported extension
    /// or missing file fails here, before any signal processing.
    pub fn load(&self, path: &Path) -> ReelforgeResult<AudioPcm> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ReelforgeError::validation(format!(
                "unsupported audio format '.{ext}' for '{}'",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(ReelforgeError::not_found(format!(
                "audio file '{}'",
                path.display()
            )));
        }
        media::decode_audio_f32_stereo(path, MIX_SAMPLE_RATE)
    }

    /// Mix voice with optional BGM into one track of exactly `total_duration`.
    pub fn mix(
        &self,
        voice_path: &Path,
        bgm_path: Option<&Path>,
        total_duration: f64,
        bgm_fade_in: f64,
        bgm_fade_out: f64,
    ) -> ReelforgeResult<AudioPcm> {
        tracing::info!(
            voice = %voice_path.display(),
            bgm = bgm_path.map(|p| p.display().to_string()),
            total_duration,
            "mixing audio"
        );

        let voice = self.load(voice_path)?;
        let bgm = bgm_path.map(|p| self.load(p)).transpose()?;
        Ok(self.mix_tracks(voice, bgm, total_duration, bgm_fade_in, bgm_fade_out))
    }

    /// PCM-only mixing core: pad voice, loop/attenuate/fade BGM, sum, clamp.
    pub fn mix_tracks(
        &self,
        voice: AudioPcm,
        bgm: Option<AudioPcm>,
        total_duration: f64,
        bgm_fade_in: f64,
        bgm_fade_out: f64,
    ) -> AudioPcm {
        let mut voice = pad_to_duration(&voice, total_duration);
        apply_gain(&mut voice, db_to_amplitude(self.voice_volume_db));

        let Some(bgm) = bgm else {
            return voice;
        };

        let mut bgm = loop_to_duration(&bgm, total_duration);
        apply_gain(&mut bgm, db_to_amplitude(self.bgm_volume_db));
        apply_fades(&mut bgm, bgm_fade_in, bgm_fade_out);

        for (v, b) in voice
            .interleaved_f32
            .iter_mut()
            .zip(bgm.interleaved_f32.iter())
        {
            *v = (*v + *b).clamp(-1.0, 1.0);
        }
        voice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MIX_CHANNELS;

    fn tone(duration_sec: f64, value: f32) -> AudioPcm {
        let frames = (duration_sec * f64::from(MIX_SAMPLE_RATE)).round() as usize;
        AudioPcm {
            sample_rate: MIX_SAMPLE_RATE,
            channels: MIX_CHANNELS,
            interleaved_f32: vec![value; frames * usize::from(MIX_CHANNELS)],
        }
    }

    #[test]
    fn db_round_trips_within_epsilon() {
        let mut db = -60.0;
        while db <= 0.0 {
            let back = amplitude_to_db(db_to_amplitude(db));
            assert!((back - db).abs() < 1e-9, "db={db} back={back}");
            db += 0.5;
        }
        assert!((db_to_amplitude(-20.0) - 0.1).abs() < 1e-12);
        assert!((db_to_amplitude(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn loop_reaches_target_for_short_and_long_sources() {
        let short = tone(0.7, 0.5);
        let looped = loop_to_duration(&short, 2.0);
        assert!((looped.duration_sec() - 2.0).abs() < 1.0 / f64::from(MIX_SAMPLE_RATE));

        let long = tone(3.0, 0.5);
        let trimmed = loop_to_duration(&long, 2.0);
        assert!((trimmed.duration_sec() - 2.0).abs() < 1.0 / f64::from(MIX_SAMPLE_RATE));

        let exact = tone(2.0, 0.5);
        assert_eq!(loop_to_duration(&exact, 2.0).frame_count(), exact.frame_count());
    }

    #[test]
    fn loop_of_empty_source_is_silence() {
        let empty = AudioPcm {
            sample_rate: MIX_SAMPLE_RATE,
            channels: MIX_CHANNELS,
            interleaved_f32: Vec::new(),
        };
        let looped = loop_to_duration(&empty, 1.0);
        assert_eq!(looped.frame_count(), MIX_SAMPLE_RATE as usize);
        assert!(looped.interleaved_f32.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn pad_appends_exact_silence() {
        let voice = tone(1.0, 0.5);
        let padded = pad_to_duration(&voice, 2.5);
        assert!((padded.duration_sec() - 2.5).abs() < 1.0 / f64::from(MIX_SAMPLE_RATE));
        // Tail is silent; head is untouched.
        assert_eq!(padded.interleaved_f32[0], 0.5);
        assert_eq!(*padded.interleaved_f32.last().unwrap(), 0.0);

        let trimmed = pad_to_duration(&voice, 0.5);
        assert!((trimmed.duration_sec() - 0.5).abs() < 1.0 / f64::from(MIX_SAMPLE_RATE));
    }

    #[test]
    fn degenerate_fades_are_skipped() {
        let mut clip = tone(1.0, 0.8);
        // Fade longer than the clip leaves it untouched.
        apply_fades(&mut clip, 2.0, 0.0);
        assert_eq!(clip.interleaved_f32[0], 0.8);

        apply_fades(&mut clip, 0.0, 1.0);
        assert_eq!(clip.interleaved_f32[0], 0.8);
    }

    #[test]
    fn fades_ramp_to_silence_at_edges() {
        let mut clip = tone(2.0, 1.0);
        apply_fades(&mut clip, 0.5, 0.5);
        assert_eq!(clip.interleaved_f32[0], 0.0);
        let last = *clip.interleaved_f32.last().unwrap();
        assert!(last.abs() < 1e-3);
        // Middle is untouched.
        let mid = clip.frame_count() / 2 * usize::from(MIX_CHANNELS);
        assert_eq!(clip.interleaved_f32[mid], 1.0);
    }

    #[test]
    fn normalize_hits_target_peak() {
        let mut clip = tone(0.1, 0.25);
        normalize(&mut clip, -6.0);
        let peak = clip
            .interleaved_f32
            .iter()
            .fold(0f32, |acc, s| acc.max(s.abs()));
        assert!((amplitude_to_db(f64::from(peak)) - -6.0).abs() < 1e-3);

        let mut silent = tone(0.1, 0.0);
        normalize(&mut silent, -6.0);
        assert!(silent.interleaved_f32.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mix_without_bgm_is_padded_voice() {
        let mixer = AudioMixer::default();
        let out = mixer.mix_tracks(tone(1.0, 0.5), None, 3.0, 1.0, 2.0);
        assert!((out.duration_sec() - 3.0).abs() < 1.0 / f64::from(MIX_SAMPLE_RATE));
        assert_eq!(out.interleaved_f32[0], 0.5);
    }

    #[test]
    fn mix_attenuates_bgm_by_configured_db() {
        let mixer = AudioMixer::new(-20.0);
        // Silent voice, constant bgm: output equals attenuated bgm.
        let out = mixer.mix_tracks(tone(1.0, 0.0), Some(tone(1.0, 1.0)), 1.0, 0.0, 0.0);
        let mid = out.frame_count() / 2 * usize::from(MIX_CHANNELS);
        assert!((f64::from(out.interleaved_f32[mid]) - 0.1).abs() < 1e-3);
    }

    #[test]
    fn mix_clamps_sum() {
        let mixer = AudioMixer::new(0.0);
        let out = mixer.mix_tracks(tone(0.5, 0.9), Some(tone(0.5, 0.9)), 0.5, 0.0, 0.0);
        assert!(out.interleaved_f32.iter().all(|&s| s <= 1.0));
    }

    #[test]
    fn load_rejects_unsupported_extension() {
        let mixer = AudioMixer::default();
        let err = mixer.load(Path::new("/tmp/whatever.txt")).unwrap_err();
        assert!(matches!(err, ReelforgeError::Validation(_)));

        let err = mixer.load(Path::new("/tmp/missing.wav")).unwrap_err();
        assert!(matches!(err, ReelforgeError::NotFound(_)));
    }
}
