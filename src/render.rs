//! Line-oriented renderer for terminals.

use lessonflow_core::{AfterEnd, ReadMode, Renderer, ScrollBehavior, SentenceRecord};
use std::collections::BTreeSet;
use std::io::Write;
use tracing::{trace, warn};

const HIDDEN: &str = "· · ·";

pub struct TerminalRenderer<W: Write> {
    sentences: Vec<SentenceRecord>,
    active: Option<usize>,
    listen_mode: bool,
    revealed: BTreeSet<usize>,
    out: W,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(sentences: Vec<SentenceRecord>, out: W) -> Self {
        Self {
            sentences,
            active: None,
            listen_mode: false,
            revealed: BTreeSet::new(),
            out,
        }
    }

    /// Prints the whole transcript, marking the active sentence.
    pub fn print_transcript(&mut self) {
        for index in 0..self.sentences.len() {
            let line = self.format_sentence(index);
            self.write_line(&line);
        }
    }

    pub fn print_line(&mut self, line: &str) {
        self.write_line(line);
    }

    fn is_hidden(&self, index: usize) -> bool {
        self.listen_mode && !self.revealed.contains(&index)
    }

    fn format_sentence(&self, index: usize) -> String {
        let Some(sentence) = self.sentences.get(index) else {
            return String::new();
        };
        let marker = if self.active == Some(index) { '▶' } else { ' ' };
        let stamp = format_clock(sentence.start);
        if self.is_hidden(index) {
            return format!("{marker} {index:>3} [{stamp}] {HIDDEN}");
        }
        if sentence.has_translation() {
            format!(
                "{marker} {index:>3} [{stamp}] {}\n          {}",
                sentence.text, sentence.translation
            )
        } else {
            format!("{marker} {index:>3} [{stamp}] {}", sentence.text)
        }
    }

    fn write_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!("Failed to write to terminal: {err}");
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn set_active_sentence(&mut self, index: usize) {
        if self.active == Some(index) {
            return;
        }
        self.active = Some(index);
        let line = self.format_sentence(index);
        self.write_line(&line);
    }

    fn set_revealed(&mut self, listen_mode: bool, revealed: &[usize]) {
        let revealed: BTreeSet<usize> = revealed.iter().copied().collect();
        let newly: Vec<usize> = revealed.difference(&self.revealed).copied().collect();
        let mode_changed = self.listen_mode != listen_mode;
        self.listen_mode = listen_mode;
        self.revealed = revealed;
        if mode_changed {
            return;
        }
        for index in newly {
            let line = self.format_sentence(index);
            self.write_line(&line);
        }
    }

    fn scroll_into_view(&mut self, index: usize, behavior: ScrollBehavior) {
        trace!(index, ?behavior, "Scroll request");
    }

    fn show_policy(&mut self, read_mode: ReadMode, after_end: AfterEnd) {
        self.write_line(&format!("── mode: {read_mode} · after end: {after_end}"));
    }

    fn notify(&mut self, message: &str) {
        self.write_line(&format!("» {message}"));
    }
}

/// `75.5` -> `01:15.50`
pub fn format_clock(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = seconds - minutes as f64 * 60.0;
    format!("{minutes:02}:{rest:05.2}")
}
