//! Best-effort durable state: positions, reveal sets, preferences, the resume
//! marker and the recent-lessons list.
//!
//! Storage failures never reach the caller. A failed read behaves like an
//! empty store and a failed write is logged and forgotten.

use crate::policy::{AfterEnd, ReadMode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

pub const MAX_RECENTS: usize = 60;

const PREFERENCES_KEY: &str = "prefs";
const RESUME_KEY: &str = "resume";
const RECENTS_KEY: &str = "recents";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPosition {
    pub time: f64,
    pub sentence_index: usize,
    pub saved_at: u64,
}

impl PersistedPosition {
    pub fn new(time: f64, sentence_index: usize) -> Self {
        Self {
            time,
            sentence_index,
            saved_at: unix_millis(),
        }
    }

    pub fn is_valid_for(&self, sentence_count: usize) -> bool {
        self.sentence_index < sentence_count && self.time.is_finite() && self.time >= 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevealState(BTreeSet<usize>);

impl RevealState {
    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn insert(&mut self, index: usize) -> bool {
        self.0.insert(index)
    }

    /// Returns true when `index` is revealed afterwards.
    pub fn toggle(&mut self, index: usize) -> bool {
        if self.0.remove(&index) {
            false
        } else {
            self.0.insert(index);
            true
        }
    }

    pub fn retain_below(&mut self, sentence_count: usize) {
        self.0.retain(|index| *index < sentence_count);
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub read_mode: ReadMode,
    pub after_end: AfterEnd,
    pub auto_follow: bool,
    pub skip_intro: bool,
    pub playback_rate: f64,
    pub volume: f32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            read_mode: ReadMode::Continuous,
            after_end: AfterEnd::None,
            auto_follow: true,
            skip_intro: true,
            playback_rate: 1.0,
            volume: 1.0,
        }
    }
}

impl Preferences {
    pub fn sanitized(mut self) -> Self {
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            self.playback_rate = 1.0;
        }
        self.playback_rate = self.playback_rate.clamp(0.25, 4.0);
        if !self.volume.is_finite() {
            self.volume = 1.0;
        }
        self.volume = self.volume.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMarker {
    pub lesson_id: String,
    pub autoplay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentLesson {
    pub lesson_id: String,
    pub book_id: String,
    pub title: String,
    pub opened_at: u64,
}

pub struct Persistence {
    store: Option<Box<dyn KeyValueStore>>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("enabled", &self.store.is_some())
            .finish()
    }
}

impl Persistence {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Some(Box::new(store)),
        }
    }

    /// No durable storage: nothing is remembered between sessions.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn load_position(&self, lesson_id: &str, sentence_count: usize) -> Option<PersistedPosition> {
        let position: PersistedPosition = self.read(&position_key(lesson_id))?;
        if position.is_valid_for(sentence_count) {
            Some(position)
        } else {
            debug!(
                lesson_id,
                index = position.sentence_index,
                sentence_count,
                "Discarding persisted position outside the transcript"
            );
            None
        }
    }

    pub fn save_position(&mut self, lesson_id: &str, position: &PersistedPosition) {
        self.write(&position_key(lesson_id), position);
    }

    pub fn load_revealed(&self, lesson_id: &str) -> RevealState {
        self.read(&revealed_key(lesson_id)).unwrap_or_default()
    }

    pub fn save_revealed(&mut self, lesson_id: &str, revealed: &RevealState) {
        self.write(&revealed_key(lesson_id), revealed);
    }

    pub fn load_preferences(&self) -> Option<Preferences> {
        self.read::<Preferences>(PREFERENCES_KEY)
            .map(Preferences::sanitized)
    }

    pub fn save_preferences(&mut self, preferences: &Preferences) {
        self.write(PREFERENCES_KEY, preferences);
    }

    pub fn clear_preferences(&mut self) {
        self.remove(PREFERENCES_KEY);
    }

    /// Reads and removes the resume marker.
    pub fn take_resume(&mut self) -> Option<ResumeMarker> {
        let marker = self.read(RESUME_KEY);
        self.remove(RESUME_KEY);
        marker
    }

    pub fn set_resume(&mut self, marker: &ResumeMarker) {
        self.write(RESUME_KEY, marker);
    }

    pub fn recents(&self) -> Vec<RecentLesson> {
        self.read(RECENTS_KEY).unwrap_or_default()
    }

    pub fn touch_recent(&mut self, lesson_id: &str, book_id: &str, title: &str) {
        if !self.is_enabled() {
            return;
        }
        let mut recents = self.recents();
        recents.retain(|entry| entry.lesson_id != lesson_id);
        recents.insert(
            0,
            RecentLesson {
                lesson_id: lesson_id.to_string(),
                book_id: book_id.to_string(),
                title: title.to_string(),
                opened_at: unix_millis(),
            },
        );
        recents.truncate(MAX_RECENTS);
        self.write(RECENTS_KEY, &recents);
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store = self.store.as_ref()?;
        let raw = match store.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, %err, "Failed to read from store");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %StoreError::from(err), "Ignoring unreadable stored value");
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let result = serde_json::to_string(value)
            .map_err(StoreError::from)
            .and_then(|raw| store.set(key, &raw));
        if let Err(err) = result {
            warn!(key, %err, "Failed to write to store");
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(store) = self.store.as_mut() {
            if let Err(err) = store.remove(key) {
                warn!(key, %err, "Failed to remove from store");
            }
        }
    }
}

fn position_key(lesson_id: &str) -> String {
    format!("lastpos/{lesson_id}")
}

fn revealed_key(lesson_id: &str) -> String {
    format!("revealed/{lesson_id}")
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
