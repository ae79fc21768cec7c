use super::*;
use crate::effects::{Command, Direction};
use crate::media::{MediaClock, MediaEvent};
use crate::persistence::{KeyValueStore, MemoryStore, ResumeMarker};
use crate::scheduler::SchedulerWake;
use crate::testing::FakeMedia;
use crate::transcript::{SentenceRecord, TranscriptMeta};
use crate::transition::TransitionWake;
use std::time::Duration;

fn lesson(id: &str) -> LessonRef {
    LessonRef {
        book_id: "NCE2".to_string(),
        lesson_id: id.to_string(),
        filename: id.to_string(),
        title: format!("Lesson {id}"),
    }
}

fn transcript(starts: &[f64]) -> Transcript {
    let sentences = starts
        .iter()
        .enumerate()
        .map(|(i, start)| SentenceRecord::new(*start, format!("Sentence number {i}."), ""))
        .collect();
    Transcript::new(TranscriptMeta::default(), sentences)
}

fn options(read_mode: ReadMode, after_end: AfterEnd) -> EngineOptions {
    EngineOptions {
        timing: Timing::default(),
        defaults: Preferences {
            read_mode,
            after_end,
            skip_intro: false,
            ..Preferences::default()
        },
        require_unlock: false,
        media_origin: "lesson.mp3".to_string(),
    }
}

fn load_with(
    transcript: Transcript,
    store: MemoryStore,
    options: EngineOptions,
) -> (PlaybackEngine<FakeMedia>, Vec<Effect>, Instant) {
    let now = Instant::now();
    let (engine, effects) = PlaybackEngine::load(
        lesson("01"),
        transcript,
        FakeMedia::new(20.0),
        Persistence::new(store),
        options,
        now,
    );
    (engine, effects, now)
}

fn ready(
    starts: &[f64],
    read_mode: ReadMode,
    after_end: AfterEnd,
) -> (PlaybackEngine<FakeMedia>, MemoryStore, Instant) {
    let store = MemoryStore::new();
    let (mut engine, _, now) = load_with(
        transcript(starts),
        store.clone(),
        options(read_mode, after_end),
    );
    engine.handle(Input::Media(MediaEvent::MetadataLoaded), now);
    (engine, store, now)
}

/// Feeds settle frames back until the transition finishes.
fn settle(engine: &mut PlaybackEngine<FakeMedia>, effects: &[Effect], now: Instant) -> Vec<Effect> {
    let mut pending = effects.to_vec();
    let mut all = Vec::new();
    for _ in 0..8 {
        let frames: Vec<Wake> = pending
            .iter()
            .filter_map(|effect| match effect {
                Effect::NextFrame(wake @ Wake::Transition(TransitionWake::Settle { .. })) => {
                    Some(wake.clone())
                }
                _ => None,
            })
            .collect();
        if frames.is_empty() {
            break;
        }
        pending = Vec::new();
        for wake in frames {
            pending.extend(engine.handle(Input::Wake(wake), now));
        }
        all.extend(pending.iter().cloned());
    }
    all
}

/// Clicks `index`, completes the seek and the settle frames.
fn play_sentence(
    engine: &mut PlaybackEngine<FakeMedia>,
    index: usize,
    now: Instant,
) -> Vec<Effect> {
    let mut effects = engine.handle(Input::Command(Command::PlaySentence(index)), now);
    effects.extend(engine.handle(Input::Media(MediaEvent::Seeked), now));
    let settled = settle(engine, &effects, now);
    effects.extend(settled);
    effects
}

fn last_coarse(effects: &[Effect]) -> Option<Wake> {
    effects.iter().rev().find_map(|effect| match effect {
        Effect::Arm {
            wake: wake @ Wake::Scheduler(SchedulerWake::Coarse { .. }),
            ..
        } => Some(wake.clone()),
        _ => None,
    })
}

fn last_frame(effects: &[Effect]) -> Option<Wake> {
    effects.iter().rev().find_map(|effect| match effect {
        Effect::NextFrame(wake @ Wake::Scheduler(SchedulerWake::Frame { .. })) => Some(wake.clone()),
        _ => None,
    })
}

fn repeat_wakes(effects: &[Effect]) -> Vec<Wake> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Arm {
                wake: wake @ Wake::RepeatOne { .. },
                ..
            } => Some(wake.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn single_mode_plays_sentence_and_pauses_at_trimmed_end() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Single, AfterEnd::None);

    let effects = play_sentence(&mut engine, 1, now);
    assert!(effects.contains(&Effect::Highlight { index: 1 }));
    assert_eq!(engine.media().seeks, vec![5.0]);
    assert!(!engine.media().is_paused());
    assert_eq!(engine.snapshot().segment_end, Some(11.5));

    let coarse = last_coarse(&effects).expect("coarse timer armed");
    engine.media_mut().time = 11.42;
    let effects = engine.handle(Input::Wake(coarse), now);
    let frame = last_frame(&effects).expect("frame watch armed");

    engine.media_mut().time = 11.45;
    engine.handle(Input::Wake(frame), now);
    assert!(engine.media().is_paused());
    assert_eq!(engine.media().seeks, vec![5.0, 11.5]);
    assert_eq!(engine.snapshot().current, Some(1));
}

#[test]
fn continuous_mode_never_arms_the_scheduler() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    let effects = play_sentence(&mut engine, 0, now);
    assert!(last_coarse(&effects).is_none());
    assert!(last_frame(&effects).is_none());
}

#[test]
fn repeated_automatic_transition_is_a_no_op() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    play_sentence(&mut engine, 1, now);
    let seeks = engine.media().seeks.len();
    let seq = engine.snapshot().transition_seq;

    let effects = engine.transition_to(1, false, now);
    assert!(effects.is_empty());
    assert_eq!(engine.media().seeks.len(), seeks);
    assert_eq!(engine.snapshot().transition_seq, seq);
}

#[test]
fn superseded_seek_timeout_does_not_touch_newer_transition() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Single, AfterEnd::None);
    let first = engine.transition_to(1, true, now);
    let stale = first
        .iter()
        .find_map(|effect| match effect {
            Effect::Arm {
                wake: wake @ Wake::Transition(TransitionWake::SeekTimeout { .. }),
                ..
            } => Some(wake.clone()),
            _ => None,
        })
        .expect("seek timeout armed");
    engine.transition_to(2, true, now);

    let effects = engine.handle(Input::Wake(stale), now);
    assert!(effects.is_empty());
    assert_eq!(engine.media().seeks, vec![5.0, 12.0]);
    assert_eq!(engine.media().plays, 0);
    assert_eq!(engine.snapshot().current, Some(2));
}

#[test]
fn seamless_transition_while_playing_keeps_playing() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    play_sentence(&mut engine, 0, now);
    let pauses = engine.media().pauses;

    let effects = engine.handle(Input::Command(Command::Next), now);
    assert!(engine.media().muted);
    assert_eq!(engine.media().pauses, pauses);
    let mut effects = [effects, engine.handle(Input::Media(MediaEvent::CanPlay), now)].concat();
    effects.extend(settle(&mut engine, &effects, now));
    assert!(!engine.media().muted);
    assert!(!engine.media().is_paused());
    assert_eq!(engine.snapshot().current, Some(1));
}

#[test]
fn repeat_one_debounces_boundary_hits() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Single, AfterEnd::RepeatOne);
    play_sentence(&mut engine, 1, now);

    engine.media_mut().time = 11.6;
    let mut effects = engine.handle(Input::Media(MediaEvent::TimeUpdate), now);
    // the element has not reported the pause yet
    engine.media_mut().paused = false;
    effects.extend(engine.handle(Input::Media(MediaEvent::TimeUpdate), now));

    let repeats = repeat_wakes(&effects);
    assert_eq!(repeats.len(), 1);

    engine.media_mut().paused = true;
    engine.handle(Input::Wake(repeats[0].clone()), now);
    assert_eq!(engine.media().seeks.last(), Some(&5.0));
}

#[test]
fn manual_transition_cancels_pending_repeat() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Single, AfterEnd::RepeatOne);
    play_sentence(&mut engine, 1, now);
    engine.media_mut().time = 11.6;
    let effects = engine.handle(Input::Media(MediaEvent::TimeUpdate), now);
    let repeat = repeat_wakes(&effects).pop().expect("repeat scheduled");

    engine.handle(Input::Command(Command::PlaySentence(2)), now);
    let seeks = engine.media().seeks.clone();
    let effects = engine.handle(Input::Wake(repeat), now);
    assert!(effects.is_empty());
    assert_eq!(engine.media().seeks, seeks);
    assert_eq!(engine.snapshot().current, Some(2));
}

#[test]
fn play_at_segment_end_advances_in_single_mode() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Single, AfterEnd::None);
    play_sentence(&mut engine, 1, now);
    engine.media_mut().time = 11.6;
    engine.handle(Input::Media(MediaEvent::TimeUpdate), now);
    assert!(engine.media().is_paused());

    engine.handle(Input::Command(Command::TogglePlayPause), now);
    assert_eq!(engine.snapshot().current, Some(2));
    assert_eq!(engine.media().seeks.last(), Some(&12.0));
}

#[test]
fn persisted_position_round_trips() {
    let store = MemoryStore::new();
    Persistence::new(store.clone()).save_position("01", &PersistedPosition::new(7.3, 1));

    let (mut engine, effects, now) = load_with(
        transcript(&[0.0, 5.0, 12.0]),
        store,
        options(ReadMode::Continuous, AfterEnd::None),
    );
    assert!(effects.contains(&Effect::Highlight { index: 1 }));
    assert!(engine.media().seeks.is_empty());

    engine.handle(Input::Media(MediaEvent::MetadataLoaded), now);
    assert_eq!(engine.media().seeks, vec![7.3]);
    assert_eq!(engine.snapshot().current, Some(1));
    assert!(engine.media().is_paused());
}

#[test]
fn out_of_range_position_is_discarded() {
    let store = MemoryStore::new();
    Persistence::new(store.clone()).save_position("01", &PersistedPosition::new(30.0, 9));
    let (mut engine, _, now) = load_with(
        transcript(&[0.0, 5.0, 12.0]),
        store,
        options(ReadMode::Continuous, AfterEnd::None),
    );
    engine.handle(Input::Media(MediaEvent::MetadataLoaded), now);
    assert!(engine.media().seeks.is_empty());
    assert_eq!(engine.snapshot().current, None);
}

#[test]
fn restored_intro_position_moves_to_first_content() {
    let sentences = vec![
        SentenceRecord::new(1.5, "Lesson 1", "第1课"),
        SentenceRecord::new(2.0, "Listen to the tape then answer this question.", ""),
        SentenceRecord::new(8.0, "Why did he go?", ""),
        SentenceRecord::new(12.0, "He went to the theatre.", ""),
    ];
    let store = MemoryStore::new();
    Persistence::new(store.clone()).save_position("01", &PersistedPosition::new(1.7, 0));
    let mut opts = options(ReadMode::Continuous, AfterEnd::None);
    opts.defaults.skip_intro = true;

    let (mut engine, _, now) =
        load_with(Transcript::new(TranscriptMeta::default(), sentences), store, opts);
    engine.handle(Input::Media(MediaEvent::MetadataLoaded), now);
    assert_eq!(engine.snapshot().first_content_index, 2);
    assert_eq!(engine.snapshot().current, Some(2));
    assert_eq!(engine.media().seeks, vec![8.0]);
}

#[test]
fn resume_marker_autoplays_and_is_consumed() {
    let store = MemoryStore::new();
    let mut persistence = Persistence::new(store.clone());
    persistence.set_resume(&ResumeMarker {
        lesson_id: "01".to_string(),
        autoplay: true,
    });
    persistence.save_position("01", &PersistedPosition::new(0.0, 0));

    let (mut engine, _, now) = load_with(
        transcript(&[0.0, 5.0, 12.0]),
        store.clone(),
        options(ReadMode::Continuous, AfterEnd::None),
    );
    assert!(store.raw("resume").is_none());
    engine.handle(Input::Media(MediaEvent::MetadataLoaded), now);
    engine.handle(Input::Media(MediaEvent::Seeked), now);
    assert_eq!(engine.media().seeks, vec![0.0]);
    assert_eq!(engine.media().plays, 1);
}

#[test]
fn switching_to_single_resets_repeat_all_and_persists() {
    let (mut engine, store, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::RepeatAll);
    let effects = engine.handle(Input::Command(Command::SetReadMode(ReadMode::Single)), now);
    assert_eq!(engine.snapshot().after_end, AfterEnd::None);
    assert!(effects.iter().any(|effect| matches!(effect, Effect::Notify(_))));
    assert!(effects.contains(&Effect::PolicyChanged {
        read_mode: ReadMode::Single,
        after_end: AfterEnd::None,
    }));
    let prefs = store.raw("prefs").expect("preferences saved");
    assert!(prefs.contains("\"single\""));
}

#[test]
fn incompatible_after_end_is_rejected() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Single, AfterEnd::None);
    let effects = engine.handle(Input::Command(Command::SetAfterEnd(AfterEnd::AdvanceNext)), now);
    assert_eq!(engine.snapshot().after_end, AfterEnd::None);
    assert!(matches!(effects.as_slice(), [Effect::Notify(_)]));
}

#[test]
fn track_end_with_advance_next_navigates_with_resume_marker() {
    let (mut engine, store, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::AdvanceNext);
    let effects = engine.handle(Input::Media(MediaEvent::Ended), now);
    assert!(effects.contains(&Effect::ResolveNeighbor {
        book_id: "NCE2".to_string(),
        lesson_id: "01".to_string(),
        direction: Direction::Next,
    }));

    let effects = engine.handle(Input::NeighborResolved(Some(lesson("02"))), now);
    let navigate = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Arm {
                wake: wake @ Wake::Navigate(_),
                after,
            } => Some((wake.clone(), *after)),
            _ => None,
        })
        .expect("navigation scheduled");
    assert_eq!(navigate.1, Duration::from_secs(2));
    assert!(store.raw("resume").is_some_and(|raw| raw.contains("\"02\"")));
    assert!(store.get("lastpos/02").unwrap().is_some());

    let effects = engine.handle(Input::Wake(navigate.0), now);
    assert_eq!(effects, vec![Effect::Navigate(lesson("02"))]);
}

#[test]
fn track_end_without_neighbor_reports_course_complete() {
    let (mut engine, _, now) = ready(&[0.0, 5.0], ReadMode::Listen, AfterEnd::AdvanceNext);
    let effects = engine.handle(Input::NeighborResolved(None), now);
    assert_eq!(effects, vec![Effect::Notify("Course complete".to_string())]);
}

#[test]
fn repeat_all_restarts_from_first_content() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Listen, AfterEnd::RepeatAll);
    play_sentence(&mut engine, 2, now);
    engine.media_mut().paused = true;
    let effects = engine.handle(Input::Media(MediaEvent::Ended), now);
    assert!(effects.contains(&Effect::Arm {
        wake: Wake::RestartTrack,
        after: Duration::from_millis(100),
    }));
    engine.handle(Input::Wake(Wake::RestartTrack), now);
    assert_eq!(engine.media().seeks.last(), Some(&0.0));
    assert_eq!(engine.snapshot().current, Some(0));
}

#[test]
fn highlight_follows_clock_with_throttle_and_quiet_period() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    play_sentence(&mut engine, 0, now);

    engine.media_mut().time = 6.0;
    let quiet = engine.handle(Input::Media(MediaEvent::TimeUpdate), now + Duration::from_millis(100));
    assert!(!quiet.contains(&Effect::Highlight { index: 1 }));

    let later = now + Duration::from_secs(1);
    let effects = engine.handle(Input::Media(MediaEvent::TimeUpdate), later);
    assert!(effects.contains(&Effect::Highlight { index: 1 }));

    engine.media_mut().time = 13.0;
    let throttled = engine.handle(
        Input::Media(MediaEvent::TimeUpdate),
        later + Duration::from_millis(50),
    );
    assert!(!throttled.contains(&Effect::Highlight { index: 2 }));
}

#[test]
fn late_duration_extends_the_last_segment() {
    let store = MemoryStore::new();
    let (mut engine, _, now) = load_with(
        transcript(&[0.0, 5.0, 12.0]),
        store,
        options(ReadMode::Single, AfterEnd::None),
    );
    engine.transition_to(2, true, now);
    assert_eq!(engine.snapshot().segment_end, Some(12.5));
    engine.handle(Input::Media(MediaEvent::MetadataLoaded), now);
    assert_eq!(engine.snapshot().segment_end, Some(19.5));
}

#[test]
fn reveal_is_limited_to_listen_mode() {
    let (mut engine, store, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    assert!(engine.handle(Input::Command(Command::ToggleReveal(Some(1))), now).is_empty());

    engine.handle(Input::Command(Command::SetReadMode(ReadMode::Listen)), now);
    let effects = engine.handle(Input::Command(Command::ToggleReveal(Some(1))), now);
    assert!(effects.contains(&Effect::Revealed {
        listen_mode: true,
        revealed: vec![1],
    }));
    assert_eq!(store.raw("revealed/01").as_deref(), Some("[1]"));
}

#[test]
fn rate_and_volume_commands_persist_preferences() {
    let (mut engine, store, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    engine.handle(Input::Command(Command::CycleRate), now);
    assert_eq!(engine.media().playback_rate(), 1.25);
    engine.handle(Input::Command(Command::VolumeDown), now);
    assert!((engine.media().volume - 0.9).abs() < 1e-6);

    let prefs = Persistence::new(store).load_preferences().expect("saved");
    assert_eq!(prefs.playback_rate, 1.25);
    assert!((prefs.volume - 0.9).abs() < 1e-6);
}

#[test]
fn seek_fraction_moves_highlight() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    let effects = engine.handle(Input::Command(Command::SeekFraction(0.5)), now);
    assert_eq!(engine.media().seeks, vec![10.0]);
    assert!(effects.contains(&Effect::Highlight { index: 1 }));
}

#[test]
fn non_finite_seek_fraction_is_ignored() {
    let (mut engine, _, now) = ready(&[0.0, 5.0, 12.0], ReadMode::Continuous, AfterEnd::None);
    for fraction in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let effects = engine.handle(Input::Command(Command::SeekFraction(fraction)), now);
        assert!(effects.is_empty());
    }
    assert!(engine.media().seeks.is_empty());
    assert_eq!(engine.media().current_time(), 0.0);
}

#[test]
fn gesture_restricted_platform_arms_unlock() {
    let mut opts = options(ReadMode::Continuous, AfterEnd::None);
    opts.require_unlock = true;
    let (mut engine, effects, now) = load_with(transcript(&[0.0, 5.0]), MemoryStore::new(), opts);
    assert!(effects.contains(&Effect::ArmGestureUnlock));

    let effects = engine.handle(Input::Gesture, now);
    assert!(engine.media().muted);
    let settle = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Arm {
                wake: wake @ Wake::UnlockSettle { .. },
                ..
            } => Some(wake.clone()),
            _ => None,
        })
        .expect("unlock settle queued");
    engine.handle(Input::Wake(settle), now);
    assert!(engine.media().is_paused());
    assert!(!engine.media().muted);
}
