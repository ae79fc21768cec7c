//! Line-oriented timed-text (LRC) parsing into a [`Transcript`].

use crate::transcript::{SentenceRecord, Transcript, TranscriptMeta};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_TIMED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:\[\d+:\d+(?:\.\d+)?\])+)(.*)$").unwrap());
static RE_TIME_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+):(\d+(?:\.\d+)?)\]").unwrap());
static RE_META: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\[(al|ar|ti|by):(.+)\]$").unwrap());

pub fn parse_lrc(raw: &str) -> Transcript {
    let cleaned = raw.replace('\r', "");
    let rows: Vec<&str> = cleaned.split('\n').collect();
    let mut meta = TranscriptMeta::default();
    let mut sentences = Vec::new();

    let mut i = 0;
    while i < rows.len() {
        let line = rows[i].trim();
        i += 1;
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = RE_META.captures(line) {
            let value = caps[2].trim().to_string();
            match caps[1].to_ascii_lowercase().as_str() {
                "al" => meta.album = value,
                "ar" => meta.artist = value,
                "ti" => meta.title = value,
                _ => meta.author = value,
            }
            continue;
        }
        let Some(caps) = RE_TIMED_LINE.captures(line) else {
            continue;
        };
        let tags = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        let start = tags_to_seconds(tags);

        let (text, translation) = match body.split_once('|') {
            Some((text, rest)) => {
                let translation = rest.split('|').next().unwrap_or_default();
                (text.trim().to_string(), translation.trim().to_string())
            }
            None => {
                let mut translation = String::new();
                if let Some(next) = rows.get(i).map(|row| row.trim()) {
                    if let Some(next_caps) = RE_TIMED_LINE.captures(next) {
                        let next_body = next_caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
                        if &next_caps[1] == tags && contains_cjk(next_body) {
                            translation = next_body.to_string();
                            i += 1;
                        }
                    }
                }
                (body.to_string(), translation)
            }
        };
        sentences.push(SentenceRecord::new(start, text, translation));
    }

    debug!(
        sentences = sentences.len(),
        title = %meta.title,
        "Parsed timed transcript"
    );
    Transcript::new(meta, sentences)
}

/// Seconds of the first `[mm:ss.xx]` tag in `tags`.
fn tags_to_seconds(tags: &str) -> f64 {
    let Some(caps) = RE_TIME_TAG.captures(tags) else {
        return 0.0;
    };
    let minutes: f64 = caps[1].parse().unwrap_or(0.0);
    let seconds: f64 = caps[2].parse().unwrap_or(0.0);
    minutes * 60.0 + seconds
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars()
        .any(|ch| matches!(ch, '\u{3400}'..='\u{9FFF}' | '\u{F900}'..='\u{FAFF}'))
}
