use std::path::Path;

use crate::{
    error::{ReelforgeError, ReelforgeResult},
    subtitle::group::WordGroup,
};

/// Format seconds as a SubRip timestamp: `HH:MM:SS,mmm`. Negative inputs
/// clamp to zero.
pub fn format_srt_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Greedy word wrap at `width` characters. A single overlong word stays on
/// its own line unbroken.
fn wrap_text(text: &str, width: usize) -> String {
    let mut lines = Vec::<String>::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Render groups as SubRip blocks. The groups are the same ones used for
/// on-screen rendering, which keeps file and video captions consistent.
pub fn srt_content(groups: &[WordGroup], wrap_width: usize) -> String {
    let mut out = String::new();
    for (i, group) in groups.iter().enumerate() {
        out.push_str(&format!("{}\n", i + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(group.start_time),
            format_srt_timestamp(group.end_time),
        ));
        out.push_str(&wrap_text(&group.text(), wrap_width));
        out.push_str("\n\n");
    }
    out
}

pub fn write_srt(groups: &[WordGroup], path: &Path, wrap_width: usize) -> ReelforgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ReelforgeError::encoding(format!(
                "failed to create srt output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    std::fs::write(path, srt_content(groups, wrap_width)).map_err(|e| {
        ReelforgeError::encoding(format!("failed to write srt '{}': {e}", path.display()))
    })?;
    tracing::info!(path = %path.display(), segments = groups.len(), "generated srt file");
    Ok(())
}

/// SubRip with `<font>` markup: one block per word, the active word colored.
/// For players that support styled subtitles.
pub fn write_srt_highlighted(
    groups: &[WordGroup],
    path: &Path,
    active_color: &str,
) -> ReelforgeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ReelforgeError::encoding(format!(
                "failed to create srt output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut out = String::new();
    let mut index = 1usize;
    for group in groups {
        for (active, word) in group.words.iter().enumerate() {
            let line = group
                .words
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    if i == active {
                        format!("<font color=\"{active_color}\">{}</font>", w.word)
                    } else {
                        w.word.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");

            out.push_str(&format!("{index}\n"));
            out.push_str(&format!(
                "{} --> {}\n{line}\n\n",
                format_srt_timestamp(word.start),
                format_srt_timestamp(word.end),
            ));
            index += 1;
        }
    }

    std::fs::write(path, out).map_err(|e| {
        ReelforgeError::encoding(format!("failed to write srt '{}': {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioTimestamps, WordTimestamp};
    use crate::subtitle::group::group_words;

    fn groups() -> Vec<WordGroup> {
        let ts = AudioTimestamps {
            words: vec![
                WordTimestamp {
                    word: "hello".to_string(),
                    start: 0.0,
                    end: 1.25,
                },
                WordTimestamp {
                    word: "there.".to_string(),
                    start: 1.25,
                    end: 2.5,
                },
                WordTimestamp {
                    word: "bye".to_string(),
                    start: 2.5,
                    end: 3.0,
                },
            ],
            total_duration: 3.0,
        };
        group_words(&ts, 6, 35)
    }

    #[test]
    fn timestamp_format_matches_subrip() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(1.25), "00:00:01,250");
        assert_eq!(format_srt_timestamp(3661.5), "01:01:01,500");
        assert_eq!(format_srt_timestamp(-4.0), "00:00:00,000");
    }

    #[test]
    fn blocks_are_indexed_and_timed() {
        let content = srt_content(&groups(), 35);
        assert!(content.contains("1\n00:00:00,000 --> 00:00:02,500\nhello there."));
        assert!(content.contains("2\n00:00:02,500 --> 00:00:03,000\nbye"));
    }

    #[test]
    fn wrap_breaks_long_lines_between_words() {
        let wrapped = wrap_text("aaaa bbbb cccc dddd", 9);
        assert_eq!(wrapped, "aaaa bbbb\ncccc dddd");
        // Overlong single word survives unbroken.
        assert_eq!(wrap_text("abcdefghijkl", 5), "abcdefghijkl");
    }

    #[test]
    fn highlighted_variant_emits_one_block_per_word() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        write_srt_highlighted(&groups(), &path, "#FFD700").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("-->").count(), 3);
        assert!(content.contains("<font color=\"#FFD700\">hello</font> there."));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("out.srt");
        write_srt(&groups(), &path, 35).unwrap();
        assert!(path.exists());
    }
}
