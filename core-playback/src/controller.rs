//! # Playback Controller
//!
//! Orchestrates track switches: retires the in-flight session, wires a fresh
//! fetch/decode pair, and owns the only handle to the output device.
//!
//! ## Session lifecycle
//!
//! ```text
//! play(track)
//!   │  select (container, key) ──> engine lookup
//!   │  cancel previous session (fetch signalled, buffer aborted)
//!   │  open stream ──> spawn fetch task          (producer)
//!   │  join previous decode ──> spawn decode task (consumer)
//!   ▼
//! Idle → Starting → Streaming → (Stopping | Finished)
//! ```
//!
//! Two rules keep sessions from bleeding into each other:
//!
//! - The previous decode call must have returned before its engine is reset
//!   and reused. The controller joins the old decode handle before spawning
//!   the new one; the old fetch task is only signalled, never waited on.
//! - The sink is written exclusively from the decode task, and at most one
//!   decode task exists at a time, so reconfiguring the device for the next
//!   track can never race a write from the last one.

use crate::config::PlaybackConfig;
use crate::convert::SampleConverter;
use crate::engine::{
    default_engines, DecodeEngine, PlayOutcome, SharedEngine, WriteAction,
};
use crate::error::{PlaybackError, Result};
use crate::fetch;
use crate::negotiate::{negotiate, storage_width};
use crate::sink::{AudioSink, SinkFormat};
use crate::track_buffer::{TrackBuffer, TrackBufferReader};
use catalog_traits::{PlayerPanel, StreamDescriptor, StreamHint, StreamSource, TrackItem};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

// ============================================================================
// States & Events
// ============================================================================

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No session.
    Idle,
    /// Session accepted; fetch spawned, metadata probe in progress.
    Starting,
    /// Decoded audio is flowing to the sink.
    Streaming,
    /// Cancellation signalled, waiting for the session to retire.
    Stopping,
    /// The last track decoded to completion.
    Finished,
}

/// Notifications published on the controller's broadcast channel.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// A track's session reached `Streaming`.
    TrackStarted { title: String, duration: Duration },
    /// The engine exhausted its input.
    TrackFinished,
    /// Decode or device failure ended the session.
    PlaybackFailed { message: String },
    /// `stop` retired the session.
    Stopped,
}

// ============================================================================
// Session
// ============================================================================

/// Live state for the track currently playing. At most one exists.
struct PlaybackSession {
    descriptor: StreamDescriptor,
    cancel: CancellationToken,
    buffer: Arc<TrackBuffer>,
    fetch: JoinHandle<()>,
    decode: JoinHandle<()>,
    /// Transport errors absorbed by the fetch loop land here, not in the
    /// decode result.
    fetch_error: Arc<Mutex<Option<String>>>,
}

// ============================================================================
// Controller
// ============================================================================

pub struct PlaybackController {
    engines: HashMap<String, SharedEngine>,
    sink: Arc<Mutex<Box<dyn AudioSink>>>,
    source: Arc<dyn StreamSource>,
    panel: Arc<dyn PlayerPanel>,
    events: broadcast::Sender<PlaybackEvent>,
    state: Arc<Mutex<PlayerState>>,
    config: PlaybackConfig,
    session: Option<PlaybackSession>,
}

impl PlaybackController {
    /// Create a controller owning the given sink, with the engines compiled
    /// into this build registered.
    pub fn new(
        source: Arc<dyn StreamSource>,
        panel: Arc<dyn PlayerPanel>,
        sink: Box<dyn AudioSink>,
        config: PlaybackConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PlaybackError::Internal(format!("Invalid playback config: {}", e)))?;

        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            engines: default_engines(),
            sink: Arc::new(Mutex::new(sink)),
            source,
            panel,
            events,
            state: Arc::new(Mutex::new(PlayerState::Idle)),
            config,
            session: None,
        })
    }

    /// Register (or replace) the engine for a container tag.
    pub fn register_engine(&mut self, container: impl Into<String>, engine: Box<dyn DecodeEngine>) {
        self.engines
            .insert(container.into(), crate::engine::shared(engine));
    }

    /// Current controller state.
    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    /// Subscribe to playback notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Descriptor of the active session, if any.
    pub fn current(&self) -> Option<&StreamDescriptor> {
        self.session.as_ref().map(|s| &s.descriptor)
    }

    /// Transport error absorbed by the active session's fetch loop, if any.
    pub fn fetch_error(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|s| s.fetch_error.lock().clone())
    }

    /// Start playing a track, cancelling whatever was playing before.
    ///
    /// Returns once the new session is launched; probe, negotiation, and
    /// decode proceed on the session's own tasks and report through the
    /// event channel.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::UnsupportedContainer`] when no part of the track
    ///   matches a registered engine.
    /// - [`PlaybackError::SourceError`] when the catalog cannot open the
    ///   stream.
    pub async fn play(&mut self, item: &TrackItem) -> Result<()> {
        let part = item
            .parts()
            .find(|p| self.engines.contains_key(&p.container))
            .ok_or_else(|| PlaybackError::UnsupportedContainer(item.display_title()))?;
        let descriptor = StreamDescriptor::from_part(part);
        let hint = part.audio_hint().cloned();
        let title = item.display_title();
        let duration = Duration::from_millis(item.duration.unwrap_or(0));

        let engine = self
            .engines
            .get(&descriptor.container)
            .cloned()
            .ok_or_else(|| PlaybackError::Internal("Engine lookup failed".to_string()))?;

        info!("Playing: {} [{}]", title, descriptor.container);
        self.panel.set_track(&title, duration);

        // Retire the previous session. The fetch task is signalled but not
        // waited on; its buffer is aborted so the old decode cannot stay
        // parked waiting for bytes.
        let prior_decode = self.session.take().map(|old| {
            *self.state.lock() = PlayerState::Stopping;
            old.cancel.cancel();
            old.buffer.abort();
            old.decode
        });

        // The catalog collaborator issues the HTTP request; we only get the
        // open response stream.
        let stream = match self.source.open_stream(&descriptor.key).await {
            Ok(s) => s,
            Err(e) => {
                *self.state.lock() = PlayerState::Idle;
                return Err(PlaybackError::SourceError(e.to_string()));
            }
        };

        let cancel = CancellationToken::new();
        let buffer = Arc::new(TrackBuffer::new());
        let fetch_error = Arc::new(Mutex::new(None));
        let fetch = tokio::spawn(fetch::run(
            stream,
            Arc::clone(&buffer),
            cancel.clone(),
            self.config.fetch_chunk_bytes,
            self.config.max_buffered_bytes,
            Arc::clone(&fetch_error),
        ));

        // Single active play call per engine: the previous decode must have
        // returned before the engine is reset for this track.
        if let Some(handle) = prior_decode {
            let _ = handle.await;
        }

        *self.state.lock() = PlayerState::Starting;
        let ctx = DecodeContext {
            engine,
            buffer: Arc::clone(&buffer),
            cancel: cancel.clone(),
            sink: Arc::clone(&self.sink),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            title,
            duration,
            hint,
        };
        let decode = tokio::task::spawn_blocking(move || run_decode(ctx));

        self.session = Some(PlaybackSession {
            descriptor,
            cancel,
            buffer,
            fetch,
            decode,
            fetch_error,
        });
        Ok(())
    }

    /// Stop playback and retire the session completely.
    pub async fn stop(&mut self) {
        if let Some(old) = self.session.take() {
            *self.state.lock() = PlayerState::Stopping;
            old.cancel.cancel();
            old.buffer.abort();
            let _ = old.decode.await;
            let _ = old.fetch.await;
            if let Some(err) = old.fetch_error.lock().as_deref() {
                debug!("Session ended with absorbed transport error: {}", err);
            }
        }
        *self.state.lock() = PlayerState::Idle;
        let _ = self.events.send(PlaybackEvent::Stopped);
    }
}

// ============================================================================
// Decode task
// ============================================================================

struct DecodeContext {
    engine: SharedEngine,
    buffer: Arc<TrackBuffer>,
    cancel: CancellationToken,
    sink: Arc<Mutex<Box<dyn AudioSink>>>,
    events: broadcast::Sender<PlaybackEvent>,
    state: Arc<Mutex<PlayerState>>,
    title: String,
    duration: Duration,
    hint: Option<StreamHint>,
}

/// One track's decode, start to finish, on a blocking task.
fn run_decode(ctx: DecodeContext) {
    let DecodeContext {
        engine,
        buffer,
        cancel,
        sink,
        events,
        state,
        title,
        duration,
        hint,
    } = ctx;

    let mut engine = engine.lock();
    engine.reset();

    if cancel.is_cancelled() {
        *state.lock() = PlayerState::Idle;
        return;
    }

    if let Some(h) = &hint {
        debug!(
            "Catalog hint: {:?} Hz, {:?} channels (probe is authoritative)",
            h.sampling_rate, h.channels
        );
    }

    // Header parse; blocks until the fetcher delivers the first bytes.
    let metadata = match engine.probe(Box::new(TrackBufferReader::new(Arc::clone(&buffer)))) {
        Ok(m) => m,
        Err(e) => {
            if cancel.is_cancelled() {
                // The probe failed because the buffer was aborted under it.
                *state.lock() = PlayerState::Idle;
                return;
            }
            report_failure(&events, &state, &e);
            return;
        }
    };

    if cancel.is_cancelled() {
        *state.lock() = PlayerState::Idle;
        return;
    }

    let requested = SinkFormat {
        sample_rate: metadata.sample_rate,
        channels: metadata.channels,
        bit_width: storage_width(metadata.bits_per_sample),
    };
    let actual = match sink.lock().configure(&requested) {
        Ok(a) => a,
        Err(e) => {
            report_failure(&events, &state, &e);
            return;
        }
    };

    let plan = negotiate(&metadata, &actual);
    if !plan.is_identity() {
        debug!(
            "Converting {}Hz/{}bit -> {}Hz/{}bit",
            plan.from_rate, plan.from_width, plan.to_rate, plan.to_width
        );
    }
    let mut converter = SampleConverter::new(plan, metadata.channels);

    *state.lock() = PlayerState::Streaming;
    let _ = events.send(PlaybackEvent::TrackStarted {
        title: title.clone(),
        duration,
    });

    let mut write_failure: Option<PlaybackError> = None;
    let outcome = {
        let write_failure = &mut write_failure;
        let converter = &mut converter;
        let sink = &sink;
        let cancel = &cancel;
        engine.play(&mut |pcm| {
            if cancel.is_cancelled() {
                return WriteAction::Abort;
            }
            let converted = converter.convert(pcm);
            match sink.lock().write(&converted) {
                Ok(()) => WriteAction::Continue,
                Err(e) => {
                    *write_failure = Some(e);
                    WriteAction::Abort
                }
            }
        })
    };

    match (outcome, write_failure) {
        (_, Some(e)) => report_failure(&events, &state, &e),
        (Ok(PlayOutcome::Finished), None) => {
            debug!("Track finished: {}", title);
            *state.lock() = PlayerState::Finished;
            let _ = events.send(PlaybackEvent::TrackFinished);
        }
        (Ok(PlayOutcome::Aborted), None) => {
            // The expected outcome of a track switch or stop.
            *state.lock() = PlayerState::Idle;
        }
        (Err(e), None) => report_failure(&events, &state, &e),
    }
}

fn report_failure(
    events: &broadcast::Sender<PlaybackEvent>,
    state: &Mutex<PlayerState>,
    err: &PlaybackError,
) {
    error!("Playback failed: {}", err);
    *state.lock() = PlayerState::Idle;
    let _ = events.send(PlaybackEvent::PlaybackFailed {
        message: err.to_string(),
    });
}
