//! Heuristic mention detection over segment text.
//!
//! Two surface patterns are scanned for, each an explicit tagged case:
//! - CapitalizedRun: maximal runs of `Xxxx` words joined by single spaces
//! - Acronym: whole words of three or more uppercase letters
//!
//! Candidates pass closed-class stop-word and sentence-start filters and
//! receive a heuristic confidence. No cross-segment state is kept, and
//! overlapping spans from the two patterns are both emitted; only
//! identical spans are deduplicated.

use uuid::Uuid;

use crate::domain::{Mention, Segment};

/// Segments shorter than this yield no mentions
const MIN_SEGMENT_CHARS: usize = 3;

/// Closed-class words that never form a mention on their own: pronouns,
/// articles, conjunctions, WH-words, honorifics, and structural words.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those",
    "i", "you", "he", "she", "it", "we", "they",
    "my", "your", "his", "her", "its", "our", "their",
    "me", "him", "us", "them",
    "what", "when", "where", "why", "how", "who",
    "which", "whose", "whom",
    "but", "or", "and", "nor", "for", "yet", "so",
    "at", "in", "on", "by", "to", "from", "with",
    "mr", "mrs", "ms", "dr", "prof", "rev",
    "chapter", "part", "section", "book", "volume",
];

/// Which scanner produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// A run of capitalized words ("Alice Smith")
    CapitalizedRun,

    /// An all-uppercase word of three or more letters ("NASA")
    Acronym,
}

/// Shape of a single word, decided once during scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordShape {
    /// Uppercase letter followed by lowercase letters
    Capitalized,

    /// Two or more uppercase letters
    Uppercase,

    /// Anything else
    Other,
}

struct Word<'a> {
    start: usize,
    end: usize,
    text: &'a str,
    shape: WordShape,
}

struct Candidate {
    pattern: PatternKind,
    start: usize,
    end: usize,
}

/// Fixed confidence for acronym candidates
const ACRONYM_CONFIDENCE: f64 = 0.8;

/// Stateless scanner that turns one segment into unlinked mention
/// candidates. Safe to share across tasks; segments are independent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MentionDetector;

impl MentionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect mention candidates in a single segment.
    ///
    /// Every returned mention is Unresolved with no entity link, and its
    /// span satisfies `0 <= start < end <= text.len()`.
    pub fn detect(&self, segment: &Segment, universe_id: Uuid) -> Vec<Mention> {
        let text = segment.text.as_str();
        if text.trim().is_empty() || text.chars().count() < MIN_SEGMENT_CHARS {
            return Vec::new();
        }

        let words = scan_words(text);
        let mut candidates = Vec::new();
        collect_capitalized_runs(text, &words, &mut candidates);
        collect_acronyms(&words, &mut candidates);

        let mut scored: Vec<(Candidate, f64)> = candidates
            .into_iter()
            .map(|c| {
                let confidence = match c.pattern {
                    PatternKind::CapitalizedRun => capitalized_confidence(text, c.start, c.end),
                    PatternKind::Acronym => ACRONYM_CONFIDENCE,
                };
                (c, confidence)
            })
            .collect();

        // identical spans keep the higher-confidence candidate
        scored.sort_by(|(a, ca), (b, cb)| {
            (a.start, a.end)
                .cmp(&(b.start, b.end))
                .then_with(|| cb.partial_cmp(ca).unwrap_or(std::cmp::Ordering::Equal))
        });
        scored.dedup_by_key(|(c, _)| (c.start, c.end));

        scored
            .into_iter()
            .map(|(c, confidence)| {
                Mention::detected(
                    universe_id,
                    segment.id,
                    &text[c.start..c.end],
                    c.start,
                    c.end,
                    confidence,
                )
            })
            .collect()
    }

    /// Detect mentions across a batch of segments.
    ///
    /// Segments are processed independently; the result is the
    /// concatenation of per-segment results.
    pub fn detect_batch(&self, segments: &[Segment], universe_id: Uuid) -> Vec<Mention> {
        segments
            .iter()
            .flat_map(|segment| self.detect(segment, universe_id))
            .collect()
    }
}

/// Split text into maximal alphanumeric runs, classifying each once
fn scan_words(text: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            if start.is_none() {
                start = Some(idx);
            }
        } else if let Some(s) = start.take() {
            words.push(make_word(text, s, idx));
        }
    }
    if let Some(s) = start {
        words.push(make_word(text, s, text.len()));
    }
    words
}

fn make_word(text: &str, start: usize, end: usize) -> Word<'_> {
    let word = &text[start..end];
    Word {
        start,
        end,
        text: word,
        shape: classify(word),
    }
}

fn classify(word: &str) -> WordShape {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return WordShape::Other;
    };
    let rest = chars.as_str();

    if first.is_ascii_uppercase() {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_lowercase()) {
            return WordShape::Capitalized;
        }
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_uppercase()) {
            return WordShape::Uppercase;
        }
    }
    WordShape::Other
}

fn collect_capitalized_runs(text: &str, words: &[Word<'_>], out: &mut Vec<Candidate>) {
    let mut i = 0;
    while i < words.len() {
        if words[i].shape != WordShape::Capitalized {
            i += 1;
            continue;
        }

        // extend across single-space separators only
        let mut j = i;
        while j + 1 < words.len()
            && words[j + 1].shape == WordShape::Capitalized
            && &text[words[j].end..words[j + 1].start] == " "
        {
            j += 1;
        }

        let start = words[i].start;
        let end = words[j].end;
        let word_count = j - i + 1;
        let run = &words[i..=j];
        i = j + 1;

        if run.iter().all(|w| is_stop_word(w.text)) {
            continue;
        }
        // a lone capitalized word opening a sentence is usually just
        // capitalization; a multi-word run is kept but forfeits the
        // mid-sentence confidence bonus
        if word_count == 1 && likely_sentence_start(text, start) {
            continue;
        }

        out.push(Candidate {
            pattern: PatternKind::CapitalizedRun,
            start,
            end,
        });
    }
}

fn collect_acronyms(words: &[Word<'_>], out: &mut Vec<Candidate>) {
    for word in words {
        if word.shape == WordShape::Uppercase && word.text.chars().count() >= 3 {
            out.push(Candidate {
                pattern: PatternKind::Acronym,
                start: word.start,
                end: word.end,
            });
        }
    }
}

/// Base 0.6, +0.2 for multi-word runs, +0.1 away from a sentence start,
/// +0.1 when a possessive marker follows; capped at 1.0.
fn capitalized_confidence(text: &str, start: usize, end: usize) -> f64 {
    let surface = &text[start..end];
    let mut confidence: f64 = 0.6;
    if surface.split(' ').count() >= 2 {
        confidence += 0.2;
    }
    if !likely_sentence_start(text, start) {
        confidence += 0.1;
    }
    if followed_by_possessive(text, end) {
        confidence += 0.1;
    }
    confidence.min(1.0)
}

fn is_stop_word(word: &str) -> bool {
    let lowered = word.to_lowercase();
    STOP_WORDS.contains(&lowered.as_str())
}

/// A candidate looks like it merely opens a sentence when it sits in the
/// first three bytes of the segment, or the three bytes before it hold
/// terminal punctuation followed by a space, or a newline.
fn likely_sentence_start(text: &str, position: usize) -> bool {
    if position < 3 {
        return true;
    }
    let mut window_start = position - 3;
    while !text.is_char_boundary(window_start) {
        window_start -= 1;
    }
    let window = &text[window_start..position];
    window.contains(". ")
        || window.contains("! ")
        || window.contains("? ")
        || window.contains('\n')
}

fn followed_by_possessive(text: &str, end: usize) -> bool {
    let rest = &text[end..];
    rest.starts_with("'s") || rest.starts_with("\u{2019}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResolutionStatus, SourceLocator};

    fn segment(text: &str) -> Segment {
        Segment::new(
            Uuid::new_v4(),
            0,
            text,
            SourceLocator {
                offset: 0,
                length: text.len(),
            },
        )
    }

    fn surfaces(mentions: &[Mention]) -> Vec<&str> {
        mentions.iter().map(|m| m.surface_form.as_str()).collect()
    }

    #[test]
    fn test_detects_names_and_skips_prose() {
        let detector = MentionDetector::new();
        let seg = segment("Alice Smith walked into the cafe where Bob was waiting.");
        let mentions = detector.detect(&seg, Uuid::new_v4());

        assert_eq!(surfaces(&mentions), vec!["Alice Smith", "Bob"]);

        let alice = &mentions[0];
        assert!(alice.confidence > 0.7);
        for m in &mentions {
            assert_eq!(m.status, ResolutionStatus::Unresolved);
            assert!(m.entity_id.is_none());
        }
    }

    #[test]
    fn test_spans_index_the_segment_text() {
        let detector = MentionDetector::new();
        let seg = segment("Alice Smith walked into the cafe where Bob was waiting.");
        let mentions = detector.detect(&seg, Uuid::new_v4());

        for m in &mentions {
            assert!(m.span_start < m.span_end);
            assert!(m.span_end <= seg.text.len());
            assert_eq!(&seg.text[m.span_start..m.span_end], m.surface_form);
        }
    }

    #[test]
    fn test_empty_and_short_segments_yield_nothing() {
        let detector = MentionDetector::new();
        assert!(detector.detect(&segment(""), Uuid::new_v4()).is_empty());
        assert!(detector.detect(&segment("  "), Uuid::new_v4()).is_empty());
        assert!(detector.detect(&segment("Ab"), Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_stop_word_runs_are_discarded() {
        let detector = MentionDetector::new();
        // "The" opens the sentence; "But She" is all closed-class words
        let seg = segment("The wind howled. But She waited near Bram.");
        let mentions = detector.detect(&seg, Uuid::new_v4());
        assert_eq!(surfaces(&mentions), vec!["Bram"]);
    }

    #[test]
    fn test_sentence_start_single_word_is_discarded() {
        let detector = MentionDetector::new();
        let seg = segment("Bram left the harbor. Selka stayed behind with Bram.");
        let mentions = detector.detect(&seg, Uuid::new_v4());

        // first "Bram" opens the text, "Selka" opens a sentence; only the
        // mid-sentence "Bram" survives
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].surface_form, "Bram");
        assert!(mentions[0].span_start > 0);
    }

    #[test]
    fn test_multiword_run_at_sentence_start_survives_without_bonus() {
        let detector = MentionDetector::new();
        let seg = segment("Alice Smith waved from the pier.");
        let mentions = detector.detect(&seg, Uuid::new_v4());

        assert_eq!(surfaces(&mentions), vec!["Alice Smith"]);
        // base 0.6 + multiword 0.2, no mid-sentence bonus
        assert!((mentions[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_possessive_bonus() {
        let detector = MentionDetector::new();
        let seg = segment("They borrowed Selka's lantern at dusk.");
        let mentions = detector.detect(&seg, Uuid::new_v4());

        assert_eq!(surfaces(&mentions), vec!["Selka"]);
        // base 0.6 + mid-sentence 0.1 + possessive 0.1
        assert!((mentions[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_acronyms_detected_with_fixed_confidence() {
        let detector = MentionDetector::new();
        let seg = segment("The probe reported back to NASA before dawn.");
        let mentions = detector.detect(&seg, Uuid::new_v4());

        assert_eq!(surfaces(&mentions), vec!["NASA"]);
        assert!((mentions[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_short_acronyms_discarded() {
        let detector = MentionDetector::new();
        let seg = segment("The ship sailed to the AB outpost with Selka.");
        let mentions = detector.detect(&seg, Uuid::new_v4());
        assert_eq!(surfaces(&mentions), vec!["Selka"]);
    }

    #[test]
    fn test_double_space_breaks_a_run() {
        let detector = MentionDetector::new();
        let seg = segment("He saw Alice  Smith across the square.");
        let mentions = detector.detect(&seg, Uuid::new_v4());
        // two spaces: two independent single-word candidates
        assert_eq!(surfaces(&mentions), vec!["Alice", "Smith"]);
    }

    #[test]
    fn test_mixed_case_words_do_not_match() {
        let detector = MentionDetector::new();
        let seg = segment("The retrofit used iPhones and McDonald standards.");
        let mentions = detector.detect(&seg, Uuid::new_v4());
        assert!(mentions.is_empty());
    }

    #[test]
    fn test_results_ordered_by_start_offset() {
        let detector = MentionDetector::new();
        let seg = segment("Far away, Selka wrote to NASA about Bram and the Hollow City.");
        let mentions = detector.detect(&seg, Uuid::new_v4());

        let starts: Vec<usize> = mentions.iter().map(|m| m.span_start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn test_batch_concatenates_per_segment_results() {
        let detector = MentionDetector::new();
        let segments = vec![
            segment("They followed Selka north."),
            segment(""),
            segment("Soon after, Bram waited."),
        ];
        let mentions = detector.detect_batch(&segments, Uuid::new_v4());

        assert_eq!(surfaces(&mentions), vec!["Selka", "Bram"]);
        assert_eq!(mentions[0].segment_id, segments[0].id);
        assert_eq!(mentions[1].segment_id, segments[2].id);
    }
}
