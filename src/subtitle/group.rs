use crate::model::{AudioTimestamps, WordTimestamp};

/// A contiguous run of words rendered together as one caption, with one
/// highlighted word at a time.
#[derive(Clone, Debug, PartialEq)]
pub struct WordGroup {
    pub words: Vec<WordTimestamp>,
    pub start_time: f64,
    pub end_time: f64,
}

impl WordGroup {
    fn from_words(words: Vec<WordTimestamp>) -> Self {
        let start_time = words.first().map(|w| w.start).unwrap_or(0.0);
        let end_time = words.last().map(|w| w.end).unwrap_or(0.0);
        Self {
            words,
            start_time,
            end_time,
        }
    }

    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Index of the word being spoken at `time` (same clock as the words).
    pub fn active_word_index(&self, time: f64) -> Option<usize> {
        self.words
            .iter()
            .position(|w| w.start <= time && time < w.end)
    }
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end();
    trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?')
}

/// Partition a word stream into caption groups.
///
/// A group closes when it holds `max_words` words, its joined text exceeds
/// `max_chars`, or the last word ends a sentence; a trailing partial group is
/// flushed. The output covers the input with no gaps, overlaps, or
/// reordering, and a single long word is never split.
pub fn group_words(
    timestamps: &AudioTimestamps,
    max_words: usize,
    max_chars: usize,
) -> Vec<WordGroup> {
    let mut groups = Vec::new();
    let mut current: Vec<WordTimestamp> = Vec::new();
    let mut current_len = 0usize;

    for word in &timestamps.words {
        if !current.is_empty() {
            current_len += 1; // joining space
        }
        current_len += word.word.chars().count();
        current.push(word.clone());

        let should_break = current.len() >= max_words
            || current_len > max_chars
            || ends_sentence(&word.word);

        if should_break {
            groups.push(WordGroup::from_words(std::mem::take(&mut current)));
            current_len = 0;
        }
    }

    if !current.is_empty() {
        groups.push(WordGroup::from_words(current));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AudioTimestamps;

    fn ts(words: &[&str]) -> AudioTimestamps {
        let words = words
            .iter()
            .enumerate()
            .map(|(i, w)| WordTimestamp {
                word: (*w).to_string(),
                start: i as f64 * 0.5,
                end: (i + 1) as f64 * 0.5,
            })
            .collect::<Vec<_>>();
        let total = words.len() as f64 * 0.5;
        AudioTimestamps {
            words,
            total_duration: total,
        }
    }

    fn flatten(groups: &[WordGroup]) -> Vec<String> {
        groups
            .iter()
            .flat_map(|g| g.words.iter().map(|w| w.word.clone()))
            .collect()
    }

    #[test]
    fn groups_partition_without_gaps_or_reordering() {
        let input = ts(&[
            "the", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog", "today",
        ]);
        let groups = group_words(&input, 6, 35);

        let words = flatten(&groups);
        let expected: Vec<String> = input.words.iter().map(|w| w.word.clone()).collect();
        assert_eq!(words, expected);

        for pair in groups.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn group_closes_at_word_limit() {
        let input = ts(&["a", "b", "c", "d", "e", "f", "g"]);
        let groups = group_words(&input, 6, 35);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].words.len(), 6);
        assert_eq!(groups[1].words.len(), 1);
    }

    #[test]
    fn group_closes_on_sentence_terminal_word() {
        let input = ts(&["hello", "world.", "next", "bit!", "tail?"]);
        let groups = group_words(&input, 6, 35);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].text(), "hello world.");
        assert_eq!(groups[1].text(), "next bit!");
        assert_eq!(groups[2].text(), "tail?");
    }

    #[test]
    fn group_closes_when_text_exceeds_char_limit() {
        let input = ts(&["aaaaaaaaaa", "bbbbbbbbbb", "cccccccccc", "dddddddddd"]);
        let groups = group_words(&input, 6, 35);
        assert!(groups.len() >= 2);
        for g in &groups {
            if g.words.len() > 1 {
                // A multi-word group only exceeds the limit by the word that
                // closed it; the preceding prefix stayed within bounds.
                let prefix: Vec<&str> = g.words[..g.words.len() - 1]
                    .iter()
                    .map(|w| w.word.as_str())
                    .collect();
                assert!(prefix.join(" ").chars().count() <= 35);
            }
        }
    }

    #[test]
    fn single_long_word_is_never_split() {
        let long = "supercalifragilisticexpialidociousword";
        let input = ts(&[long]);
        let groups = group_words(&input, 6, 35);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].words.len(), 1);
        assert_eq!(groups[0].text(), long);
    }

    #[test]
    fn trailing_partial_group_is_flushed() {
        let input = ts(&["one", "two"]);
        let groups = group_words(&input, 6, 35);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].words.len(), 2);
    }

    #[test]
    fn active_index_follows_word_timing() {
        let input = ts(&["one", "two", "three"]);
        let groups = group_words(&input, 6, 35);
        let g = &groups[0];
        assert_eq!(g.active_word_index(0.25), Some(0));
        assert_eq!(g.active_word_index(0.75), Some(1));
        assert_eq!(g.active_word_index(1.25), Some(2));
        assert_eq!(g.active_word_index(9.0), None);
    }
}
