//! Detection of the spoken lesson intro (title, numbering, tape
//! instructions) that precedes the first content sentence.

use crate::transcript::SentenceRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

const INTRO_SCAN_LIMIT: usize = 10;
const TITLE_MAX_CHARS: usize = 80;
/// Anything this early with a short translation is a title.
const EARLY_TITLE_SECS: f64 = 7.0;
/// Up to here a short translated line is a title unless it asks a question.
const LATE_TITLE_SECS: f64 = 10.0;

static RE_LESSON_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Lesson\s+\d+$").unwrap());
static RE_LESSON_NUMERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^第\d+课$").unwrap());
static RE_TAPE_INSTRUCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Listen to the tape").unwrap());

pub fn is_intro_line(record: &SentenceRecord) -> bool {
    let text = record.text.trim();
    let translation = record.translation.trim();
    if text.is_empty() {
        return true;
    }
    if RE_LESSON_HEADING.is_match(text) && RE_LESSON_NUMERAL.is_match(translation) {
        return true;
    }
    if RE_TAPE_INSTRUCTION.is_match(text) {
        return true;
    }
    if !translation.is_empty()
        && text.chars().count() < TITLE_MAX_CHARS
        && translation.chars().count() < TITLE_MAX_CHARS
    {
        if record.start < EARLY_TITLE_SECS {
            return true;
        }
        if record.start < LATE_TITLE_SECS && !text.ends_with('?') {
            return true;
        }
    }
    false
}

/// Index of the first content sentence, or 0 when no intro prefix is found
/// or the whole scan window looks like intro.
pub fn find_first_content_index(sentences: &[SentenceRecord]) -> usize {
    let limit = sentences.len().min(INTRO_SCAN_LIMIT);
    for (idx, record) in sentences.iter().take(limit).enumerate() {
        if !is_intro_line(record) {
            if idx > 0 {
                debug!(skipped = idx, first_content = idx, "Detected lesson intro");
            }
            return idx;
        }
    }
    debug!(scanned = limit, "Could not locate first content sentence; starting at 0");
    0
}
