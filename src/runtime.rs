//! Event loop driving a [`PlaybackEngine`] against the desktop host.
//!
//! Everything runs on one current-thread tokio runtime. Engine timers become
//! sleeping tasks that post their wake back through the channel, tagged with
//! the lesson epoch so wakes from a lesson that was navigated away from are
//! dropped.

use crate::audio::{HostMedia, RodioMedia, is_remote};
use crate::cache::FileStore;
use crate::cancellation::{CancellationToken, FetchSlot};
use crate::commands::{HELP, HostCommand, parse_line};
use crate::config::AppConfig;
use crate::directory::JsonLessonDirectory;
use crate::fetch::fetch_full_source;
use crate::lesson::LessonFiles;
use crate::render::{TerminalRenderer, format_clock};
use anyhow::{Context, Result};
use lessonflow_core::{
    Direction, Effect, EngineOptions, Input, LessonDirectory, LessonRef, MediaElement,
    MediaSource, Persistence, PlaybackEngine, Wake,
};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Upper bound on inputs processed for one external event.
const MAX_CASCADE: usize = 256;

#[derive(Debug)]
enum RuntimeEvent {
    Engine { epoch: u64, input: Input },
    Line(String),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Where a lesson's media element and terminal output come from.
trait MediaBackend {
    type Media: HostMedia;

    fn open(&self) -> Result<Self::Media>;
    fn output(&self) -> Box<dyn Write>;
}

struct RodioBackend;

impl MediaBackend for RodioBackend {
    type Media = RodioMedia;

    fn open(&self) -> Result<RodioMedia> {
        RodioMedia::open_default()
    }

    fn output(&self) -> Box<dyn Write> {
        Box::new(std::io::stdout())
    }
}

struct Player<M: HostMedia> {
    files: LessonFiles,
    engine: PlaybackEngine<M>,
    renderer: TerminalRenderer<Box<dyn Write>>,
}

struct Runtime<B: MediaBackend> {
    backend: B,
    config: AppConfig,
    directory: JsonLessonDirectory,
    events: UnboundedSender<RuntimeEvent>,
    player: Player<B::Media>,
    epoch: u64,
    frames: Vec<Wake>,
    fetches: FetchSlot,
    gesture_armed: bool,
    navigation: Option<LessonRef>,
}

pub fn run(config: AppConfig, transcript: &Path, audio: Option<String>) -> Result<()> {
    let directory =
        JsonLessonDirectory::load_or_empty(Path::new(&config.lesson_data_path));
    let files = LessonFiles::from_transcript(transcript, audio, &directory)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Building tokio runtime")?;
    runtime.block_on(event_loop(config, directory, files))
}

async fn event_loop(
    config: AppConfig,
    directory: JsonLessonDirectory,
    files: LessonFiles,
) -> Result<()> {
    let (tx, mut rx) = unbounded_channel();
    spawn_stdin_reader(tx.clone());
    {
        let tx = tx.clone();
        ctrlc::set_handler(move || {
            let _ = tx.send(RuntimeEvent::Quit);
        })
        .context("Installing Ctrl-C handler")?;
    }

    let (mut runtime, effects) = Runtime::open(RodioBackend, config, directory, files, tx).await?;
    runtime.start(effects);

    let mut frame = tokio::time::interval(FRAME_INTERVAL);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = frame.tick() => runtime.flush_frames(),
            _ = poll.tick() => {
                runtime.player.engine.media_mut().poll();
                runtime.pump_media();
            }
            event = rx.recv() => {
                let flow = match event {
                    Some(RuntimeEvent::Engine { epoch, input }) => {
                        runtime.deliver(epoch, input);
                        Flow::Continue
                    }
                    Some(RuntimeEvent::Line(line)) => runtime.handle_line(&line),
                    Some(RuntimeEvent::Quit) | None => Flow::Quit,
                };
                if flow == Flow::Quit {
                    break;
                }
            }
        }
        runtime.navigate_if_requested().await;
    }

    runtime.shutdown();
    Ok(())
}

fn spawn_stdin_reader(tx: UnboundedSender<RuntimeEvent>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(RuntimeEvent::Line(line)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!("Failed to read stdin: {err}");
                    break;
                }
            }
        }
        let _ = tx.send(RuntimeEvent::Quit);
    });
}

/// Remote audio is buffered whole up front; the blocking client runs off the
/// event loop.
async fn load_source(origin: &str) -> Result<MediaSource> {
    if !is_remote(origin) {
        return Ok(MediaSource::stream(origin));
    }
    let origin = origin.to_string();
    tokio::task::spawn_blocking(move || fetch_full_source(&origin, &CancellationToken::new()))
        .await
        .context("Buffering task failed")?
}

async fn open_player<B: MediaBackend>(
    backend: &B,
    mut files: LessonFiles,
    config: &AppConfig,
) -> Result<(Player<B::Media>, Vec<Effect>)> {
    let transcript = files.load_transcript()?;
    let source = load_source(&files.audio_origin).await?;
    let mut media = backend.open()?;
    media
        .load(source)
        .with_context(|| format!("Opening audio {}", files.audio_origin))?;

    let persistence = match FileStore::open(&config.cache_path()) {
        Ok(store) => Persistence::new(store),
        Err(err) => {
            warn!("Persistence disabled: {err}");
            Persistence::disabled()
        }
    };
    let timing = config.timing();
    let options = EngineOptions {
        require_unlock: timing.profile.requires_unlock(),
        timing,
        defaults: config.preferences(),
        media_origin: files.audio_origin.clone(),
    };

    let mut renderer = TerminalRenderer::new(transcript.sentences().to_vec(), backend.output());
    renderer.print_line(&format!("━━ {} ({})", files.lesson.title, files.lesson.lesson_id));
    renderer.print_transcript();

    info!(
        lesson_id = %files.lesson.lesson_id,
        audio = %files.audio_origin,
        profile = %options.timing.profile,
        "Opening lesson"
    );
    let (engine, effects) = PlaybackEngine::load(
        files.lesson.clone(),
        transcript,
        media,
        persistence,
        options,
        Instant::now(),
    );
    Ok((
        Player {
            files,
            engine,
            renderer,
        },
        effects,
    ))
}

impl<B: MediaBackend> Runtime<B> {
    async fn open(
        backend: B,
        config: AppConfig,
        directory: JsonLessonDirectory,
        files: LessonFiles,
        events: UnboundedSender<RuntimeEvent>,
    ) -> Result<(Self, Vec<Effect>)> {
        let (player, effects) = open_player(&backend, files, &config).await?;
        let runtime = Runtime {
            backend,
            config,
            directory,
            events,
            player,
            epoch: 0,
            frames: Vec::new(),
            fetches: FetchSlot::default(),
            gesture_armed: false,
            navigation: None,
        };
        Ok((runtime, effects))
    }

    fn start(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::new();
        self.run_effects(effects, &mut queue);
        self.drain(queue);
        self.pump_media();
        self.player
            .renderer
            .print_line("Type `help` for commands; press enter to play.");
    }

    fn deliver(&mut self, epoch: u64, input: Input) {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, "Dropping input from a previous lesson");
            return;
        }
        if let Input::FullSourceReady { seq, .. } = &input {
            self.fetches.finish(*seq);
        }
        self.dispatch(input);
    }

    fn dispatch(&mut self, input: Input) {
        self.drain(VecDeque::from([input]));
    }

    /// Feeds `queue` to the engine along with any inputs it causes: media
    /// events raised while handling and synchronous host answers.
    fn drain(&mut self, mut queue: VecDeque<Input>) {
        let mut steps = 0;
        while let Some(input) = queue.pop_front() {
            steps += 1;
            if steps > MAX_CASCADE {
                warn!(dropped = queue.len() + 1, "Input cascade limit reached");
                break;
            }
            let effects = self.player.engine.handle(input, Instant::now());
            self.run_effects(effects, &mut queue);
            queue.extend(
                self.player
                    .engine
                    .media_mut()
                    .drain_events()
                    .into_iter()
                    .map(Input::Media),
            );
        }
    }

    fn pump_media(&mut self) {
        let events = self.player.engine.media_mut().drain_events();
        if !events.is_empty() {
            self.drain(events.into_iter().map(Input::Media).collect());
        }
    }

    fn flush_frames(&mut self) {
        if self.frames.is_empty() {
            return;
        }
        let wakes = std::mem::take(&mut self.frames);
        self.drain(wakes.into_iter().map(Input::Wake).collect());
    }

    fn run_effects(&mut self, effects: Vec<Effect>, queue: &mut VecDeque<Input>) {
        for effect in effects {
            match effect {
                Effect::Arm { wake, after } => self.arm_timer(wake, after),
                Effect::NextFrame(wake) => self.frames.push(wake),
                Effect::FetchFullSource { seq, origin } => self.start_fetch(seq, origin),
                Effect::ResolveNeighbor {
                    book_id,
                    lesson_id,
                    direction,
                } => {
                    let neighbor = self
                        .directory
                        .resolve_neighbor(&book_id, &lesson_id, direction);
                    queue.push_back(Input::NeighborResolved(neighbor));
                }
                Effect::Navigate(lesson) => self.navigation = Some(lesson),
                Effect::ArmGestureUnlock => {
                    self.gesture_armed = true;
                    self.player
                        .renderer
                        .print_line("Audio is locked until the first key press.");
                }
                other => {
                    other.render(&mut self.player.renderer);
                }
            }
        }
    }

    fn arm_timer(&self, wake: Wake, after: Duration) {
        let tx = self.events.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let event = RuntimeEvent::Engine {
                epoch,
                input: Input::Wake(wake),
            };
            if let Err(err) = tx.send(event) {
                debug!(event = ?err.0, "Event loop closed; dropping timer wake");
            }
        });
    }

    fn start_fetch(&mut self, seq: u64, origin: String) {
        info!(seq, %origin, "Fetching full media source");
        let token = self.fetches.start(seq);
        let tx = self.events.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let joined =
                tokio::task::spawn_blocking(move || fetch_full_source(&origin, &token)).await;
            let result = match joined {
                Ok(Ok(source)) => Ok(source),
                Ok(Err(err)) => Err(format!("{err:#}")),
                Err(err) => Err(format!("fetch task failed: {err}")),
            };
            let event = RuntimeEvent::Engine {
                epoch,
                input: Input::FullSourceReady { seq, result },
            };
            if let Err(err) = tx.send(event) {
                debug!(seq, "Event loop closed; dropping fetched source ({err})");
            }
        });
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        if self.gesture_armed {
            self.gesture_armed = false;
            self.dispatch(Input::Gesture);
        }
        match parse_line(line) {
            Ok(HostCommand::Engine(command)) => self.dispatch(Input::Command(command)),
            Ok(HostCommand::OpenNeighbor(direction)) => self.open_neighbor(direction),
            Ok(HostCommand::Transcript) => self.player.renderer.print_transcript(),
            Ok(HostCommand::Status) => self.print_status(),
            Ok(HostCommand::Help) => self.player.renderer.print_line(HELP),
            Ok(HostCommand::Quit) => return Flow::Quit,
            Err(message) => self.player.renderer.print_line(&message),
        }
        Flow::Continue
    }

    fn open_neighbor(&mut self, direction: Direction) {
        let lesson = &self.player.files.lesson;
        match self
            .directory
            .resolve_neighbor(&lesson.book_id, &lesson.lesson_id, direction)
        {
            Some(next) => self.navigation = Some(next),
            None => self.player.renderer.print_line("No lesson in that direction."),
        }
    }

    fn print_status(&mut self) {
        let snapshot = self.player.engine.snapshot();
        let line = format!(
            "{} · sentence {} · {} / {} · {}x · vol {:.0}%",
            snapshot.lesson_id,
            snapshot
                .current
                .map(|index| index.to_string())
                .unwrap_or_else(|| "-".to_string()),
            format_clock(snapshot.time),
            snapshot.duration.map(format_clock).unwrap_or_else(|| "--:--".to_string()),
            snapshot.playback_rate,
            snapshot.volume * 100.0,
        );
        self.player.renderer.print_line(&line);
        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!(%json, "Playback snapshot"),
            Err(err) => warn!("Failed to serialize snapshot: {err}"),
        }
    }

    async fn navigate_if_requested(&mut self) {
        let Some(next) = self.navigation.take() else {
            return;
        };
        info!(lesson_id = %next.lesson_id, "Navigating to lesson");
        let files = self.player.files.neighbor(next);
        self.player.engine.shutdown();
        self.fetches.cancel();
        self.frames.clear();
        self.gesture_armed = false;
        self.epoch = self.epoch.wrapping_add(1);
        match open_player(&self.backend, files.clone(), &self.config).await {
            Ok((player, effects)) => {
                self.player = player;
                self.start(effects);
            }
            Err(err) => {
                warn!("Failed to open {}: {err:#}", files.lesson.lesson_id);
                self.player
                    .renderer
                    .print_line(&format!("Could not open {}", files.lesson.title));
            }
        }
    }

    fn shutdown(&mut self) {
        self.fetches.cancel();
        self.player.engine.shutdown();
        info!("Player stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonflow_core::{MediaClock, MediaError, MediaEvent};
    use std::fs;
    use std::io::Read;
    use std::net::TcpListener;
    use std::path::PathBuf;
    use tokio::sync::mpsc::UnboundedReceiver;

    const CATALOGUE: &str = r#"{ "2": [
        { "filename": "01", "title": "A private conversation" },
        { "filename": "02", "title": "Breakfast or lunch?" }
    ] }"#;

    struct ScriptedMedia {
        time: f64,
        duration: Option<f64>,
        rate: f64,
        paused: bool,
        volume: f32,
        muted: bool,
        loaded: Vec<MediaSource>,
        events: Vec<MediaEvent>,
    }

    impl ScriptedMedia {
        fn new() -> Self {
            Self {
                time: 0.0,
                duration: None,
                rate: 1.0,
                paused: true,
                volume: 1.0,
                muted: false,
                loaded: Vec::new(),
                events: Vec::new(),
            }
        }
    }

    impl MediaClock for ScriptedMedia {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn duration(&self) -> Option<f64> {
            self.duration
        }

        fn playback_rate(&self) -> f64 {
            self.rate
        }

        fn is_paused(&self) -> bool {
            self.paused
        }
    }

    impl MediaElement for ScriptedMedia {
        fn seek(&mut self, seconds: f64) -> Result<(), MediaError> {
            self.time = seconds;
            self.events.push(MediaEvent::Seeked);
            Ok(())
        }

        fn play(&mut self) -> Result<(), MediaError> {
            self.paused = false;
            self.events.push(MediaEvent::Playing);
            Ok(())
        }

        fn pause(&mut self) {
            self.paused = true;
            self.events.push(MediaEvent::Paused);
        }

        fn set_playback_rate(&mut self, rate: f64) {
            self.rate = rate;
        }

        fn volume(&self) -> f32 {
            self.volume
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }

        fn is_muted(&self) -> bool {
            self.muted
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }

        fn load(&mut self, source: MediaSource) -> Result<(), MediaError> {
            self.loaded.push(source);
            self.time = 0.0;
            self.duration = Some(30.0);
            self.paused = true;
            self.events.push(MediaEvent::MetadataLoaded);
            Ok(())
        }
    }

    impl HostMedia for ScriptedMedia {
        fn drain_events(&mut self) -> Vec<MediaEvent> {
            std::mem::take(&mut self.events)
        }

        fn poll(&mut self) {
            if !self.paused {
                self.events.push(MediaEvent::TimeUpdate);
            }
        }
    }

    struct ScriptedBackend;

    impl MediaBackend for ScriptedBackend {
        type Media = ScriptedMedia;

        fn open(&self) -> Result<ScriptedMedia> {
            Ok(ScriptedMedia::new())
        }

        fn output(&self) -> Box<dyn Write> {
            Box::new(std::io::sink())
        }
    }

    /// Two lessons of book 2 laid out under a scratch directory.
    struct Fixture {
        root: PathBuf,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir()
                .join(format!("lessonflow-runtime-{name}-{}", std::process::id()));
            let book = root.join("lessons").join("NCE2");
            fs::create_dir_all(&book).unwrap();
            fs::write(
                book.join("01.lrc"),
                "[00:00.50]Lesson 1|第1课\n[00:03.00]Last week I went to the theatre.|上星期我去看戏。\n",
            )
            .unwrap();
            fs::write(
                book.join("02.lrc"),
                "[00:00.80]Lesson 2|第2课\n[00:04.00]It was Sunday.|那是个星期天。\n",
            )
            .unwrap();
            Self { root }
        }

        fn directory(&self) -> JsonLessonDirectory {
            JsonLessonDirectory::parse(CATALOGUE).unwrap()
        }

        fn config(&self) -> AppConfig {
            AppConfig {
                cache_dir: self.root.join("cache").to_string_lossy().to_string(),
                ..AppConfig::default()
            }
        }

        fn files(&self, audio: Option<String>) -> LessonFiles {
            let transcript = self.root.join("lessons").join("NCE2").join("01.lrc");
            LessonFiles::from_transcript(&transcript, audio, &self.directory()).unwrap()
        }

        async fn open(
            &self,
        ) -> (Runtime<ScriptedBackend>, UnboundedReceiver<RuntimeEvent>) {
            let (tx, rx) = unbounded_channel();
            let (runtime, _) = Runtime::open(
                ScriptedBackend,
                self.config(),
                self.directory(),
                self.files(None),
                tx,
            )
            .await
            .unwrap();
            (runtime, rx)
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    /// Answers a single HTTP request with `body`.
    fn serve_once(body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request);
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(body);
            }
        });
        format!("http://{addr}/NCE2/01.mp3")
    }

    #[tokio::test]
    async fn remote_audio_is_buffered_before_the_lesson_opens() {
        let fixture = Fixture::new("remote");
        let url = serve_once(b"not really mp3");
        let (tx, _rx) = unbounded_channel();
        let (runtime, _) = Runtime::open(
            ScriptedBackend,
            fixture.config(),
            fixture.directory(),
            fixture.files(Some(url.clone())),
            tx,
        )
        .await
        .unwrap();

        let loaded = &runtime.player.engine.media().loaded;
        assert_eq!(loaded.len(), 1);
        match &loaded[0] {
            MediaSource::Buffered { origin, bytes } => {
                assert_eq!(origin, &url);
                assert_eq!(&bytes[..], b"not really mp3");
            }
            other => panic!("expected buffered source, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_remote_audio_fails_to_open() {
        let fixture = Fixture::new("unreachable");
        let (tx, _rx) = unbounded_channel();
        let opened = Runtime::open(
            ScriptedBackend,
            fixture.config(),
            fixture.directory(),
            fixture.files(Some("http://127.0.0.1:1/NCE2/01.mp3".to_string())),
            tx,
        )
        .await;
        let err = opened.err().expect("connection refused");
        assert!(format!("{err:#}").contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn local_audio_is_opened_as_a_stream() {
        let fixture = Fixture::new("local");
        let (runtime, _rx) = fixture.open().await;
        let loaded = &runtime.player.engine.media().loaded;
        assert_eq!(loaded.len(), 1);
        assert!(!loaded[0].is_buffered());
        assert!(loaded[0].origin().ends_with("01.mp3"));
    }

    #[tokio::test]
    async fn armed_timer_posts_its_wake_with_the_lesson_epoch() {
        let fixture = Fixture::new("timer");
        let (mut runtime, mut rx) = fixture.open().await;
        let wake = Wake::Scroll {
            generation: u64::MAX,
            index: 0,
        };
        runtime.run_effects(
            vec![Effect::Arm {
                wake: wake.clone(),
                after: Duration::from_millis(5),
            }],
            &mut VecDeque::new(),
        );
        match rx.recv().await {
            Some(RuntimeEvent::Engine {
                epoch: 0,
                input: Input::Wake(got),
            }) => assert_eq!(got, wake),
            other => panic!("expected timer wake, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inputs_from_a_previous_lesson_are_dropped() {
        let fixture = Fixture::new("stale");
        let (mut runtime, _rx) = fixture.open().await;
        let token = runtime.fetches.start(7);
        runtime.epoch = 1;
        runtime.deliver(
            0,
            Input::FullSourceReady {
                seq: 7,
                result: Err("offline".to_string()),
            },
        );
        assert!(!token.is_cancelled());
        assert!(runtime.fetches.finish(7));

        runtime.fetches.start(8);
        runtime.deliver(
            1,
            Input::FullSourceReady {
                seq: 8,
                result: Err("offline".to_string()),
            },
        );
        assert!(!runtime.fetches.finish(8));
    }

    #[tokio::test]
    async fn fetched_source_comes_back_and_releases_the_slot() {
        let fixture = Fixture::new("fetch");
        let (mut runtime, mut rx) = fixture.open().await;
        let audio = fixture.root.join("full.mp3");
        fs::write(&audio, [9u8, 8, 7]).unwrap();
        runtime.run_effects(
            vec![Effect::FetchFullSource {
                seq: 3,
                origin: audio.to_string_lossy().to_string(),
            }],
            &mut VecDeque::new(),
        );

        let Some(RuntimeEvent::Engine { epoch, input }) = rx.recv().await else {
            panic!("expected fetch result");
        };
        assert_eq!(epoch, 0);
        match &input {
            Input::FullSourceReady {
                seq: 3,
                result: Ok(source),
            } => assert!(source.is_buffered()),
            other => panic!("expected buffered source, got {other:?}"),
        }
        runtime.deliver(epoch, input);
        assert!(!runtime.fetches.finish(3));
    }

    #[tokio::test]
    async fn neighbour_lookups_are_answered_in_the_same_cascade() {
        let fixture = Fixture::new("neighbor");
        let (mut runtime, _rx) = fixture.open().await;
        let mut queue = VecDeque::new();
        runtime.run_effects(
            vec![Effect::ResolveNeighbor {
                book_id: "NCE2".to_string(),
                lesson_id: "NCE2/01".to_string(),
                direction: Direction::Next,
            }],
            &mut queue,
        );
        match queue.pop_front() {
            Some(Input::NeighborResolved(Some(next))) => assert_eq!(next.lesson_id, "NCE2/02"),
            other => panic!("expected neighbour answer, got {other:?}"),
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn frame_wakes_wait_for_the_next_flush() {
        let fixture = Fixture::new("frames");
        let (mut runtime, _rx) = fixture.open().await;
        runtime.run_effects(
            vec![Effect::NextFrame(Wake::Scroll {
                generation: u64::MAX,
                index: 0,
            })],
            &mut VecDeque::new(),
        );
        assert_eq!(runtime.frames.len(), 1);
        runtime.flush_frames();
        assert!(runtime.frames.is_empty());
    }

    #[tokio::test]
    async fn navigation_opens_the_neighbour_under_a_new_epoch() {
        let fixture = Fixture::new("navigate");
        let (mut runtime, _rx) = fixture.open().await;
        let next = fixture.directory().lookup("NCE2", "02").unwrap();
        runtime.fetches.start(5);
        runtime.frames.push(Wake::RestartTrack);
        runtime.navigation = Some(next);

        runtime.navigate_if_requested().await;
        assert_eq!(runtime.epoch, 1);
        assert!(runtime.navigation.is_none());
        assert!(!runtime.fetches.finish(5));
        assert_eq!(runtime.player.files.lesson.lesson_id, "NCE2/02");
        let loaded = &runtime.player.engine.media().loaded;
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].origin().ends_with("02.mp3"));
    }
}
