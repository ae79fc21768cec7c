//! Lesson directory backed by a `data.json` catalogue.
//!
//! The catalogue maps a book number to its ordered lessons:
//! `{ "1": [ { "filename": "001&002", "title": "Excuse me!" }, ... ] }`.
//! Book ids look like `NCE1`; lesson ids are `<book>/<filename>`.

use anyhow::{Context, Result};
use lessonflow_core::{Direction, LessonDirectory, LessonRef};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LessonEntry {
    pub filename: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct JsonLessonDirectory {
    books: HashMap<String, Vec<LessonEntry>>,
}

impl JsonLessonDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading lesson directory {}", path.display()))?;
        let directory = Self::parse(&raw)
            .with_context(|| format!("Parsing lesson directory {}", path.display()))?;
        debug!(
            path = %path.display(),
            books = directory.books.len(),
            "Loaded lesson directory"
        );
        Ok(directory)
    }

    /// Like [`load`](Self::load) but an unreadable catalogue yields an empty
    /// directory, in which no lesson has neighbours.
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            warn!("Lesson directory unavailable: {err:#}");
            Self::default()
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let books: HashMap<String, Vec<LessonEntry>> = serde_json::from_str(raw)?;
        Ok(Self { books })
    }

    /// Looks up the catalogue entry for `filename` within `book_id`.
    pub fn lookup(&self, book_id: &str, filename: &str) -> Option<LessonRef> {
        let lessons = self.lessons(book_id)?;
        let entry = lessons.iter().find(|entry| entry.filename == filename)?;
        Some(lesson_ref(book_id, entry))
    }

    fn lessons(&self, book_id: &str) -> Option<&[LessonEntry]> {
        self.books.get(&book_key(book_id)).map(Vec::as_slice)
    }
}

impl LessonDirectory for JsonLessonDirectory {
    fn resolve_neighbor(
        &self,
        book_id: &str,
        lesson_id: &str,
        direction: Direction,
    ) -> Option<LessonRef> {
        let lessons = self.lessons(book_id)?;
        let filename = filename_of(book_id, lesson_id);
        let index = lessons.iter().position(|entry| entry.filename == filename)?;
        let neighbor = match direction {
            Direction::Previous => index.checked_sub(1)?,
            Direction::Next => index + 1,
        };
        lessons.get(neighbor).map(|entry| lesson_ref(book_id, entry))
    }
}

pub fn lesson_id(book_id: &str, filename: &str) -> String {
    format!("{book_id}/{filename}")
}

fn lesson_ref(book_id: &str, entry: &LessonEntry) -> LessonRef {
    LessonRef {
        book_id: book_id.to_string(),
        lesson_id: lesson_id(book_id, &entry.filename),
        filename: entry.filename.clone(),
        title: entry.title.clone(),
    }
}

/// `NCE3` -> `3`; anything without a number maps to book 1.
fn book_key(book_id: &str) -> String {
    let digits: String = book_id.chars().filter(char::is_ascii_digit).collect();
    match digits.parse::<u32>() {
        Ok(number) if number > 0 => number.to_string(),
        _ => "1".to_string(),
    }
}

fn filename_of<'a>(book_id: &str, lesson_id: &'a str) -> &'a str {
    lesson_id
        .strip_prefix(book_id)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(lesson_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> JsonLessonDirectory {
        JsonLessonDirectory::parse(
            r#"{
                "1": [
                    { "filename": "001&002", "title": "Excuse me!" },
                    { "filename": "003&004", "title": "Sorry, sir." }
                ],
                "2": [ { "filename": "01", "title": "A private conversation" } ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn next_neighbour_follows_catalogue_order() {
        let next = directory()
            .resolve_neighbor("NCE1", "NCE1/001&002", Direction::Next)
            .unwrap();
        assert_eq!(next.lesson_id, "NCE1/003&004");
        assert_eq!(next.filename, "003&004");
        assert_eq!(next.title, "Sorry, sir.");
    }

    #[test]
    fn book_edges_have_no_neighbour() {
        let dir = directory();
        assert_eq!(dir.resolve_neighbor("NCE1", "NCE1/003&004", Direction::Next), None);
        assert_eq!(dir.resolve_neighbor("NCE1", "NCE1/001&002", Direction::Previous), None);
        assert_eq!(dir.resolve_neighbor("NCE2", "NCE2/01", Direction::Next), None);
    }

    #[test]
    fn unknown_books_and_lessons_resolve_to_none() {
        let dir = directory();
        assert_eq!(dir.resolve_neighbor("NCE4", "NCE4/01", Direction::Next), None);
        assert_eq!(dir.resolve_neighbor("NCE1", "NCE1/999", Direction::Next), None);
    }

    #[test]
    fn previous_neighbour_and_lookup() {
        let dir = directory();
        let previous = dir
            .resolve_neighbor("NCE1", "NCE1/003&004", Direction::Previous)
            .unwrap();
        assert_eq!(previous.filename, "001&002");
        assert_eq!(dir.lookup("NCE2", "01").unwrap().title, "A private conversation");
    }

    #[test]
    fn missing_catalogue_is_empty() {
        let dir = JsonLessonDirectory::load_or_empty(Path::new("/nonexistent/data.json"));
        assert_eq!(dir.resolve_neighbor("NCE1", "NCE1/001&002", Direction::Next), None);
    }

    #[test]
    fn book_ids_map_to_numeric_keys() {
        assert_eq!(book_key("NCE3"), "3");
        assert_eq!(book_key("NCE"), "1");
        assert_eq!(book_key("nce02"), "2");
    }
}
