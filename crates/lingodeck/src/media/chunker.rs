//! Chunk boundary planning for size-limited transcription uploads.
//!
//! Boundaries are a pure function of the recording duration and the service
//! size ceiling, so re-planning after a crash reproduces the identical
//! layout.

/// One planned slice of the normalized audio, in absolute recording seconds.
/// Spans are half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub index: u32,
    pub start: f64,
    pub end: f64,
}

impl ChunkSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Estimated encoded size of `duration_secs` of audio at the given bitrate.
pub fn estimated_bytes(duration_secs: f64, bitrate_kbps: u32) -> u64 {
    (duration_secs * bitrate_kbps as f64 * 1000.0 / 8.0).ceil() as u64
}

/// Splits `[0, duration_secs)` into equal contiguous spans, each small
/// enough that its re-encoded artifact stays under `max_chunk_bytes` at
/// `bitrate_kbps`. A recording that already fits produces exactly one span
/// through the same arithmetic.
pub fn plan_chunks(duration_secs: f64, bitrate_kbps: u32, max_chunk_bytes: u64) -> Vec<ChunkSpan> {
    let duration_secs = duration_secs.max(0.0);
    let total_bytes = estimated_bytes(duration_secs, bitrate_kbps);
    let count = total_bytes.div_ceil(max_chunk_bytes).max(1);

    let chunk_duration = duration_secs / count as f64;
    (0..count)
        .map(|i| ChunkSpan {
            index: i as u32,
            start: i as f64 * chunk_duration,
            // The last span lands exactly on the total duration.
            end: if i == count - 1 {
                duration_secs
            } else {
                (i + 1) as f64 * chunk_duration
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_recording_yields_single_full_span() {
        let spans = plan_chunks(40.0, 64, 20 * 1024 * 1024);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 0.0);
        assert_eq!(spans[0].end, 40.0);
        assert_eq!(spans[0].index, 0);
    }

    #[test]
    fn test_long_recording_splits_into_bounded_spans() {
        // 2 hours at 64 kbit/s is ~57.6 MB, so a 20 MB ceiling needs 3 chunks.
        let spans = plan_chunks(7200.0, 64, 20 * 1024 * 1024);
        assert_eq!(spans.len(), 3);
        for span in &spans {
            assert!(estimated_bytes(span.duration(), 64) <= 20 * 1024 * 1024);
        }
    }

    #[test]
    fn test_spans_are_contiguous_and_cover_duration() {
        for (duration, ceiling) in [
            (40.0, 120_000u64),
            (613.7, 1_048_576),
            (3601.0, 8_000_000),
            (0.5, 1_000),
        ] {
            let spans = plan_chunks(duration, 64, ceiling);
            assert_eq!(spans[0].start, 0.0);
            assert_eq!(spans.last().unwrap().end, duration);
            for pair in spans.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
                assert!(pair[0].end > pair[0].start);
            }
            for (i, span) in spans.iter().enumerate() {
                assert_eq!(span.index, i as u32);
            }
        }
    }

    #[test]
    fn test_every_span_respects_the_ceiling() {
        let ceiling = 120_000;
        let spans = plan_chunks(40.0, 64, ceiling);
        assert_eq!(spans.len(), 3);
        for span in &spans {
            assert!(estimated_bytes(span.duration(), 64) <= ceiling);
        }
    }

    #[test]
    fn test_planning_is_deterministic() {
        let first = plan_chunks(1234.5, 64, 999_999);
        let second = plan_chunks(1234.5, 64, 999_999);
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_duration_yields_one_empty_span() {
        let spans = plan_chunks(0.0, 64, 1_000_000);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 0.0);
        assert_eq!(spans[0].end, 0.0);
    }

    #[test]
    fn test_estimated_bytes() {
        // 40 s at 64 kbit/s = 40 * 8000 bytes.
        assert_eq!(estimated_bytes(40.0, 64), 320_000);
        assert_eq!(estimated_bytes(0.0, 64), 0);
    }
}
