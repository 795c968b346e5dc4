//! Sentence assembly from raw transcription segments.
//!
//! Runs exactly once per job, after the last chunk has been transcribed
//! and committed. Consecutive segments are merged into sentence units,
//! closing at sentence-terminal punctuation or at a word-count cap.
//! Timing is boundary-preserving: a sentence spans exactly the covered
//! segments' range.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::AssemblyError;
use crate::transcribe::Segment;

/// The assembled, user-facing unit: text plus absolute timing. Indexed by
/// insertion order when persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Sentence-terminal punctuation, tolerating trailing closing quotes or
/// brackets ("Hij zei: 'Kom.'" still closes the sentence).
fn ends_sentence(text: &str) -> bool {
    static TERMINAL_RE: OnceLock<Regex> = OnceLock::new();
    let re = TERMINAL_RE
        .get_or_init(|| Regex::new(r#"[.!?][\"'\u{201d}\u{2019})\]]*$"#).expect("valid terminal regex"));
    re.is_match(text.trim_end())
}

pub struct SentenceAssembler {
    max_words: usize,
}

impl SentenceAssembler {
    pub fn new(max_words: usize) -> Self {
        Self {
            max_words: max_words.max(1),
        }
    }

    /// Merges ordered segments into the ordered sentence sequence.
    /// Degenerate segments (blank text or zero duration) are dropped first;
    /// an input with nothing left is an [`AssemblyError`].
    pub fn assemble(&self, segments: &[Segment]) -> Result<Vec<Sentence>, AssemblyError> {
        let usable: Vec<&Segment> = segments
            .iter()
            .filter(|s| !s.text.trim().is_empty() && s.end > s.start)
            .collect();

        if usable.is_empty() {
            return Err(AssemblyError::EmptyTranscript);
        }

        let mut sentences = Vec::new();
        let mut current: Vec<&Segment> = Vec::new();
        let mut word_count = 0usize;

        for segment in usable {
            let words = segment.text.split_whitespace().count();

            if !current.is_empty() && word_count + words > self.max_words {
                sentences.push(Self::close(&current));
                current.clear();
                word_count = 0;
            }

            current.push(segment);
            word_count += words;

            if ends_sentence(&segment.text) {
                sentences.push(Self::close(&current));
                current.clear();
                word_count = 0;
            }
        }

        if !current.is_empty() {
            sentences.push(Self::close(&current));
        }

        Ok(sentences)
    }

    fn close(segments: &[&Segment]) -> Sentence {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        Sentence {
            text,
            start_time: segments.first().map(|s| s.start).unwrap_or(0.0),
            end_time: segments.last().map(|s| s.end).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, start: f64, end: f64) -> Segment {
        Segment {
            text: text.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_one_terminated_segment_per_sentence() {
        let segments = vec![
            segment("Hallo.", 0.0, 1.0),
            segment("Hoe gaat het?", 1.0, 2.5),
            segment("Goed!", 2.5, 3.0),
        ];

        let sentences = SentenceAssembler::new(100).assemble(&segments).unwrap();
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].text, "Hallo.");
        assert_eq!(sentences[1].start_time, 1.0);
        assert_eq!(sentences[1].end_time, 2.5);
    }

    #[test]
    fn test_unterminated_segments_merge_until_punctuation() {
        let segments = vec![
            segment("Ik denk dat", 0.0, 1.0),
            segment("het vandaag", 1.0, 2.0),
            segment("gaat regenen.", 2.0, 3.5),
            segment("Echt waar.", 3.5, 4.0),
        ];

        let sentences = SentenceAssembler::new(100).assemble(&segments).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "Ik denk dat het vandaag gaat regenen.");
        assert_eq!(sentences[0].start_time, 0.0);
        assert_eq!(sentences[0].end_time, 3.5);
        assert_eq!(sentences[1].text, "Echt waar.");
    }

    #[test]
    fn test_trailing_quote_still_closes_sentence() {
        let segments = vec![
            segment("Hij zei: 'Kom hier.'", 0.0, 2.0),
            segment("En ik kwam.", 2.0, 3.0),
        ];

        let sentences = SentenceAssembler::new(100).assemble(&segments).unwrap();
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_zero_duration_segments_are_dropped() {
        let segments = vec![
            segment("Spook.", 5.0, 5.0),
            segment("Echt.", 6.0, 7.0),
        ];

        let sentences = SentenceAssembler::new(100).assemble(&segments).unwrap();
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "Echt.");
        assert_eq!(sentences[0].start_time, 6.0);
    }

    #[test]
    fn test_blank_segments_are_dropped() {
        let segments = vec![segment("   ", 0.0, 1.0), segment("Tekst.", 1.0, 2.0)];
        let sentences = SentenceAssembler::new(100).assemble(&segments).unwrap();
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_empty_input_is_an_assembly_error() {
        let result = SentenceAssembler::new(100).assemble(&[]);
        assert!(matches!(result, Err(AssemblyError::EmptyTranscript)));

        let all_degenerate = vec![segment("", 0.0, 1.0), segment("x", 2.0, 2.0)];
        let result = SentenceAssembler::new(100).assemble(&all_degenerate);
        assert!(matches!(result, Err(AssemblyError::EmptyTranscript)));
    }

    #[test]
    fn test_word_cap_flushes_long_runs() {
        let segments = vec![
            segment("een twee drie", 0.0, 1.0),
            segment("vier vijf zes", 1.0, 2.0),
            segment("zeven acht negen.", 2.0, 3.0),
        ];

        let sentences = SentenceAssembler::new(4).assemble(&segments).unwrap();
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].text, "een twee drie");
        assert_eq!(sentences[0].end_time, 1.0);
        assert_eq!(sentences[2].text, "zeven acht negen.");
    }

    #[test]
    fn test_trailing_unterminated_text_becomes_final_sentence() {
        let segments = vec![
            segment("Klaar.", 0.0, 1.0),
            segment("en toen", 1.0, 2.0),
        ];

        let sentences = SentenceAssembler::new(100).assemble(&segments).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1].text, "en toen");
        assert_eq!(sentences[1].end_time, 2.0);
    }
}
