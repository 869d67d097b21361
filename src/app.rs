//! App - wires the collaborators and drives the frame loop
//!
//! One frame is read, handed to the session machine and shown per
//! iteration. Everything slow runs on the machine's task slots, so the loop
//! only ever waits on the frame interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{Config, WakeMode};
use crate::db;
use crate::display::{Display, TerminalDisplay};
use crate::identity::{FaceIdentityResolver, HttpFaceDetector, TerminalEnrollment};
use crate::session::{Collaborators, SessionMachine, WakeDetector};
use crate::task::{RuntimeSpawner, Spawner};
use crate::vision::{CaptureSource, SessionTranscript, VisionAnswerEngine, open_source};
use crate::voice::{
    MicQuestionListener, SpeechToText, SpokenWakeDetector, TextToSpeech, TimerWakeDetector,
    TtsSpeaker,
};
use crate::{Error, Result};

/// The ADA assistant application
pub struct App {
    config: Config,
}

impl App {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C or a capture failure
    ///
    /// # Errors
    ///
    /// Returns error if startup fails or the frame source stops producing
    pub async fn run(self) -> Result<()> {
        let shutdown = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                flag.store(true, Ordering::SeqCst);
            }
        });

        let runtime = tokio::runtime::Handle::current();

        // The frame loop, dialoguer and the blocking snapshot client all block
        tokio::task::spawn_blocking(move || self.run_session(runtime, &shutdown))
            .await
            .map_err(|e| Error::Task(format!("session loop failed: {e}")))?
    }

    fn run_session(self, runtime: tokio::runtime::Handle, shutdown: &AtomicBool) -> Result<()> {
        let source_spec = self.config.require_capture_source()?;
        let mut source = open_source(source_spec, self.config.capture.snapshot_timeout)?;
        tracing::info!(source = %source.describe(), "capture source opened");

        let mut machine = self.build_machine(runtime)?;
        let mut display = TerminalDisplay::stdout();

        let frames = run_frames(
            source.as_mut(),
            &mut machine,
            &mut display,
            shutdown,
            self.config.capture.frame_interval,
        )?;

        tracing::info!(frames, "session ended");
        Ok(())
    }

    fn build_machine(&self, runtime: tokio::runtime::Handle) -> Result<SessionMachine> {
        let config = &self.config;
        let api_key = config.require_openai_key()?.to_string();

        let pool = db::init(config.database_path())?;
        let faces = db::FaceRepo::new(pool, config.faces_dir());
        tracing::info!(known_faces = faces.count()?, "face registry loaded");

        let spawner: Arc<dyn Spawner> = Arc::new(RuntimeSpawner::new(runtime.clone()));

        let mut stt = SpeechToText::new(api_key.clone(), config.voice.stt_model.clone())?;
        if let Some(language) = &config.voice.language {
            stt = stt.with_language(language.clone());
        }
        let stt = Arc::new(stt);

        let tts = Arc::new(TextToSpeech::new(
            api_key.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )?);

        let wake: Arc<dyn WakeDetector> = match config.wake.mode {
            WakeMode::Timer => Arc::new(TimerWakeDetector::new(config.wake.timer_delay)),
            WakeMode::Spoken => Arc::new(SpokenWakeDetector::new(
                vec![config.wake.phrase.clone()],
                Arc::clone(&stt),
                runtime.clone(),
                config.wake.listen_window,
            )),
        };
        tracing::info!(mode = ?config.wake.mode, phrase = %config.wake.phrase, "wake detector ready");

        let detector = Arc::new(HttpFaceDetector::new(
            config.identity.face_service_url.clone(),
            runtime.clone(),
        ));
        let resolver = Arc::new(FaceIdentityResolver::new(
            detector,
            faces.clone(),
            config.identity.match_tolerance,
        ));

        let transcript = Arc::new(SessionTranscript::start(
            config.transcript_path(),
            config.vision.max_context_chars,
        )?);

        let engine = VisionAnswerEngine::new(Some(api_key), runtime.clone())
            .with_model(config.vision.model.clone())
            .with_api_url(config.vision.api_url.clone())
            .with_max_tokens(config.vision.max_tokens)
            .with_transcript(Arc::clone(&transcript));

        let collaborators = Collaborators {
            wake,
            resolver,
            enrollment: Box::new(TerminalEnrollment::new(config.enrollment_preview_path())),
            registry: Box::new(faces),
            listener: Arc::new(MicQuestionListener::new(
                stt,
                runtime.clone(),
                config.voice.listen_timeout,
            )),
            engine: Arc::new(engine),
            speech: Arc::new(TtsSpeaker::new(tts, runtime, Arc::clone(&spawner))),
        };

        Ok(
            SessionMachine::new(collaborators, config.timings.clone(), spawner, Instant::now())
                .with_transcript(transcript),
        )
    }
}

/// Read, tick and show frames until `shutdown` is set
///
/// Returns the number of frames processed.
///
/// # Errors
///
/// Returns error if the source fails to produce a frame or the display fails
pub fn run_frames(
    source: &mut dyn CaptureSource,
    machine: &mut SessionMachine,
    display: &mut dyn Display,
    shutdown: &AtomicBool,
    interval: Duration,
) -> Result<u64> {
    let mut frames = 0u64;

    while !shutdown.load(Ordering::SeqCst) {
        let frame = source.read().map_err(|e| {
            tracing::error!(error = %e, "frame capture failed");
            e
        })?;

        let overlay = machine.tick(&frame, Instant::now());
        display.show(&frame, &overlay)?;
        frames += 1;

        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    Ok(frames)
}
