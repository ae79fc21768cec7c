use crate::boundary::resolve_end;
use crate::effects::LessonRef;
use crate::intro::find_first_content_index;
use crate::persistence::RevealState;
use crate::policy::PlaybackPolicy;
use crate::transcript::Transcript;
use std::time::Instant;

/// Per-lesson playback state. Rebuilt whenever a lesson is loaded.
#[derive(Debug)]
pub struct PlaybackSession {
    lesson: LessonRef,
    transcript: Transcript,
    current: Option<usize>,
    segment_end: f64,
    policy: PlaybackPolicy,
    transition_seq: u64,
    first_content_index: usize,
    revealed: RevealState,
    segment_started_at: Option<Instant>,
}

impl PlaybackSession {
    pub fn new(
        lesson: LessonRef,
        transcript: Transcript,
        policy: PlaybackPolicy,
        skip_intro: bool,
        mut revealed: RevealState,
    ) -> Self {
        revealed.retain_below(transcript.len());
        let mut session = Self {
            lesson,
            transcript,
            current: None,
            segment_end: 0.0,
            policy,
            transition_seq: 0,
            first_content_index: 0,
            revealed,
            segment_started_at: None,
        };
        session.recompute_first_content(skip_intro);
        session
    }

    pub fn lesson(&self) -> &LessonRef {
        &self.lesson
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn segment_end(&self) -> Option<f64> {
        self.current.map(|_| self.segment_end)
    }

    pub fn policy(&self) -> &PlaybackPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut PlaybackPolicy {
        &mut self.policy
    }

    pub fn transition_seq(&self) -> u64 {
        self.transition_seq
    }

    /// Supersedes every in-flight transition.
    pub fn next_transition_seq(&mut self) -> u64 {
        self.transition_seq = self.transition_seq.wrapping_add(1);
        self.transition_seq
    }

    pub fn first_content_index(&self) -> usize {
        self.first_content_index
    }

    pub fn recompute_first_content(&mut self, skip_intro: bool) {
        self.first_content_index = if skip_intro {
            find_first_content_index(self.transcript.sentences())
        } else {
            0
        };
    }

    pub fn revealed(&self) -> &RevealState {
        &self.revealed
    }

    pub fn revealed_mut(&mut self) -> &mut RevealState {
        &mut self.revealed
    }

    pub fn segment_started_at(&self) -> Option<Instant> {
        self.segment_started_at
    }

    /// Makes `index` current and resolves its segment end under the active
    /// policy. Returns false for an out-of-range index.
    pub fn set_current(&mut self, index: usize, now: Instant) -> bool {
        if index >= self.transcript.len() {
            return false;
        }
        self.current = Some(index);
        self.segment_end = resolve_end(&self.transcript, index, &self.policy);
        self.segment_started_at = Some(now);
        true
    }

    /// Re-resolves the current segment end, e.g. after a policy change.
    pub fn refresh_segment_end(&mut self) {
        if let Some(index) = self.current {
            self.segment_end = resolve_end(&self.transcript, index, &self.policy);
        }
    }

    /// Sentence whose start is the last one at or before `time`.
    pub fn index_at(&self, time: f64) -> Option<usize> {
        let sentences = self.transcript.sentences();
        let after = sentences.partition_point(|sentence| sentence.start <= time);
        after.checked_sub(1)
    }
}
