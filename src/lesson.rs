//! Locating a lesson's transcript and audio on disk.

use crate::audio::is_remote;
use crate::directory::{JsonLessonDirectory, lesson_id};
use anyhow::{Context, Result, anyhow};
use lessonflow_core::{LessonRef, Transcript, parse_lrc};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_BOOK: &str = "NCE1";
const AUDIO_EXTENSION: &str = "mp3";

#[derive(Debug, Clone, PartialEq)]
pub struct LessonFiles {
    pub lesson: LessonRef,
    pub transcript_path: PathBuf,
    /// Local path or `http(s)` URL of the lesson audio.
    pub audio_origin: String,
}

impl LessonFiles {
    /// `lessons/NCE1/001&002.lrc` is lesson `NCE1/001&002`; its audio sits
    /// next to it as `001&002.mp3` unless `audio` says otherwise.
    pub fn from_transcript(
        path: &Path,
        audio: Option<String>,
        directory: &JsonLessonDirectory,
    ) -> Result<Self> {
        let filename = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("Not a transcript file: {}", path.display()))?;
        let book_id = path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_BOOK.to_string());
        let title = directory
            .lookup(&book_id, &filename)
            .map(|entry| entry.title)
            .unwrap_or_default();
        let audio_origin = audio.unwrap_or_else(|| sibling_audio(path));
        Ok(Self {
            lesson: LessonRef {
                lesson_id: lesson_id(&book_id, &filename),
                book_id,
                filename,
                title,
            },
            transcript_path: path.to_path_buf(),
            audio_origin,
        })
    }

    /// Files for `next`, which lives in the same book directory.
    pub fn neighbor(&self, next: LessonRef) -> Self {
        let transcript_path = self
            .transcript_path
            .with_file_name(format!("{}.lrc", next.filename));
        let audio_origin = if is_remote(&self.audio_origin) {
            match self.audio_origin.rsplit_once('/') {
                Some((base, _)) => format!("{base}/{}.{AUDIO_EXTENSION}", next.filename),
                None => sibling_audio(&transcript_path),
            }
        } else {
            sibling_audio(&transcript_path)
        };
        Self {
            lesson: next,
            transcript_path,
            audio_origin,
        }
    }

    /// Parses the transcript, filling in a missing title from its metadata.
    pub fn load_transcript(&mut self) -> Result<Transcript> {
        let raw = fs::read_to_string(&self.transcript_path)
            .with_context(|| format!("Reading transcript {}", self.transcript_path.display()))?;
        let transcript = parse_lrc(&raw);
        if transcript.is_empty() {
            return Err(anyhow!(
                "Transcript {} has no timed sentences",
                self.transcript_path.display()
            ));
        }
        if self.lesson.title.is_empty() {
            self.lesson.title = if transcript.meta().title.is_empty() {
                self.lesson.filename.clone()
            } else {
                transcript.meta().title.clone()
            };
        }
        Ok(transcript)
    }
}

fn sibling_audio(transcript: &Path) -> String {
    transcript
        .with_extension(AUDIO_EXTENSION)
        .to_string_lossy()
        .to_string()
}
