//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ada::config::SessionTimings;
use ada::identity::AuthorizationLevel;
use ada::session::{
    AnswerEngine, Collaborators, Enrollment, EnrollmentPrompt, IdentityRegistry,
    IdentityResolver, NewFace, QuestionListener, Resolution, SessionMachine, SpeechOutput, Stage,
    WakeDetector,
};
use ada::task::{InlineSpawner, Job, Spawner};
use ada::vision::Frame;
use ada::{DbPool, Result, db};
use image::RgbImage;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// A small solid-colour frame
#[must_use]
pub fn test_frame() -> Frame {
    Frame::solid(8, 8, [40, 80, 120])
}

/// Reports the wake phrase on the `fire_on`-th call and after
pub struct ScriptedWake {
    fire_on: usize,
    calls: AtomicUsize,
}

impl ScriptedWake {
    pub fn new(fire_on: usize) -> Self {
        Self {
            fire_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WakeDetector for ScriptedWake {
    fn wait_for_wake(&self) -> Result<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(call >= self.fire_on)
    }
}

/// Returns the same resolution every time
pub struct FixedResolver {
    resolution: Resolution,
    calls: AtomicUsize,
    frames_seen: Mutex<Vec<usize>>,
}

impl FixedResolver {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            calls: AtomicUsize::new(0),
            frames_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn known(name: &str) -> Self {
        Self::new(Resolution::Known {
            face_id: "20260101120000_deadbeef".to_string(),
            name: name.to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn frames_seen(&self) -> Vec<usize> {
        self.frames_seen.lock().unwrap().clone()
    }
}

impl IdentityResolver for FixedResolver {
    fn resolve(&self, frames: &[Frame]) -> Result<Resolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.frames_seen.lock().unwrap().push(frames.len());
        Ok(self.resolution.clone())
    }
}

/// A new face with a recognisable crop
#[must_use]
pub fn new_face() -> NewFace {
    NewFace {
        temp_name: "User_20260101120000_abc123".to_string(),
        face_image: RgbImage::from_pixel(3, 2, image::Rgb([9, 9, 9])),
        embedding: vec![0.1, 0.2, 0.3],
    }
}

/// Enrollment prompt answering with a fixed enrollment
#[derive(Clone)]
pub struct RecordingEnrollment {
    pub answer: Enrollment,
    pub seen: Arc<Mutex<Vec<(RgbImage, std::thread::ThreadId)>>>,
}

impl RecordingEnrollment {
    pub fn new(name: &str, authorization: AuthorizationLevel) -> Self {
        Self {
            answer: Enrollment {
                name: name.to_string(),
                authorization,
            },
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl EnrollmentPrompt for RecordingEnrollment {
    fn enroll(&mut self, face_image: &RgbImage) -> Result<Enrollment> {
        self.seen
            .lock()
            .unwrap()
            .push((face_image.clone(), std::thread::current().id()));
        Ok(self.answer.clone())
    }
}

/// Registry that remembers what it stored
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    pub stored: Arc<Mutex<Vec<(String, Enrollment)>>>,
}

impl IdentityRegistry for MemoryRegistry {
    fn register(&self, face: &NewFace, enrollment: &Enrollment) -> Result<String> {
        let mut stored = self.stored.lock().unwrap();
        let face_id = format!("face_{}", stored.len() + 1);
        stored.push((face.temp_name.clone(), enrollment.clone()));
        Ok(face_id)
    }
}

/// Plays back a script of listen outcomes, then hears nothing
#[derive(Default)]
pub struct ScriptedListener {
    script: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedListener {
    pub fn new(script: &[Option<&str>]) -> Self {
        Self {
            script: Mutex::new(script.iter().map(|q| q.map(str::to_string)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue one more listen outcome
    pub fn push(&self, question: Option<&str>) {
        self.script
            .lock()
            .unwrap()
            .push_back(question.map(str::to_string));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QuestionListener for ScriptedListener {
    fn listen(&self) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().pop_front().flatten())
    }
}

/// Answer engine returning a fixed answer and counting calls
pub struct CountingEngine {
    answer: String,
    questions: Mutex<Vec<String>>,
}

impl CountingEngine {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

impl AnswerEngine for CountingEngine {
    fn answer(&self, _frame: &Frame, question: &str) -> String {
        self.questions.lock().unwrap().push(question.to_string());
        self.answer.clone()
    }
}

/// Speech output whose playing and busy flags are set by the test
#[derive(Default)]
pub struct FakeSpeech {
    spoken: Mutex<Vec<String>>,
    speaking: AtomicBool,
    rejecting: AtomicBool,
}

impl FakeSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
    }

    /// Drop every `speak` call while set
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }
}

impl SpeechOutput for FakeSpeech {
    fn speak(&self, text: &str) -> bool {
        if self.rejecting.load(Ordering::SeqCst) {
            return false;
        }
        self.spoken.lock().unwrap().push(text.to_string());
        true
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

/// Holds jobs until the test releases them
#[derive(Default)]
pub struct ManualSpawner {
    jobs: Mutex<VecDeque<(&'static str, Job)>>,
}

impl ManualSpawner {
    /// Run every queued job; returns how many ran
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.jobs.lock().unwrap().pop_front();
            let Some((_, job)) = next else {
                return ran;
            };
            job();
            ran += 1;
        }
    }

    /// Run only the queued jobs of slot `name`
    pub fn run_named(&self, name: &str) -> usize {
        let (selected, rest): (VecDeque<_>, VecDeque<_>) = self
            .jobs
            .lock()
            .unwrap()
            .drain(..)
            .partition(|(n, _)| *n == name);
        *self.jobs.lock().unwrap() = rest;

        let count = selected.len();
        for (_, job) in selected {
            job();
        }
        count
    }

    pub fn pending(&self) -> Vec<&'static str> {
        self.jobs.lock().unwrap().iter().map(|(n, _)| *n).collect()
    }
}

impl Spawner for ManualSpawner {
    fn spawn(&self, name: &'static str, job: Job) {
        self.jobs.lock().unwrap().push_back((name, job));
    }
}

/// Fakes wired into a machine, kept for assertions
pub struct Fakes {
    pub wake: Arc<ScriptedWake>,
    pub resolver: Arc<FixedResolver>,
    pub enrollment: RecordingEnrollment,
    pub registry: MemoryRegistry,
    pub listener: Arc<ScriptedListener>,
    pub engine: Arc<CountingEngine>,
    pub speech: Arc<FakeSpeech>,
}

impl Fakes {
    /// Wake on the first call, recognise "Alice", answer "It is 3 PM"
    pub fn new() -> Self {
        Self {
            wake: Arc::new(ScriptedWake::new(1)),
            resolver: Arc::new(FixedResolver::known("Alice")),
            enrollment: RecordingEnrollment::new("Bob", AuthorizationLevel::User),
            registry: MemoryRegistry::default(),
            listener: Arc::new(ScriptedListener::default()),
            engine: Arc::new(CountingEngine::new("It is 3 PM")),
            speech: Arc::new(FakeSpeech::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            wake: Arc::clone(&self.wake) as Arc<dyn WakeDetector>,
            resolver: Arc::clone(&self.resolver) as Arc<dyn IdentityResolver>,
            enrollment: Box::new(self.enrollment.clone()),
            registry: Box::new(self.registry.clone()),
            listener: Arc::clone(&self.listener) as Arc<dyn QuestionListener>,
            engine: Arc::clone(&self.engine) as Arc<dyn AnswerEngine>,
            speech: Arc::clone(&self.speech) as Arc<dyn SpeechOutput>,
        }
    }
}

/// Timings with instant recovery and no listen cooldown
#[must_use]
pub fn fast_timings() -> SessionTimings {
    SessionTimings {
        listen_cooldown: Duration::ZERO,
        playback_start_grace: Duration::ZERO,
        ..SessionTimings::default()
    }
}

/// Machine whose background work completes inside `try_start`
pub fn inline_machine(fakes: &Fakes, timings: SessionTimings, now: Instant) -> SessionMachine {
    SessionMachine::new(fakes.collaborators(), timings, Arc::new(InlineSpawner), now)
}

/// Tick until the machine reaches `stage`; returns the instant it got there
pub fn tick_until(
    machine: &mut SessionMachine,
    stage: Stage,
    mut now: Instant,
    step: Duration,
) -> Instant {
    let frame = test_frame();
    for _ in 0..1000 {
        if machine.stage() == stage {
            return now;
        }
        machine.tick(&frame, now);
        now += step;
    }
    panic!("machine never reached {stage}");
}

/// Drive an inline machine from wake to conversing
pub fn to_conversing(machine: &mut SessionMachine, start: Instant) -> Instant {
    tick_until(machine, Stage::Conversing, start, Duration::from_millis(500))
}
