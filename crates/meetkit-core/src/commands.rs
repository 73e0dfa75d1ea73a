use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;

use crate::errors::MeetError;
use crate::events::EventEmitter;
use crate::native::{NativeSession, SessionFactory, SessionObserver, SessionStartParams, TileId, ViewHandle};
use crate::protocol::{ErrorPayload, MeetingEvent};
use crate::translator::{
    DeviceHook, EventTranslator, SessionEventSink, SessionGeneration, callback_queue, event_loop,
};

/// Largest data message payload the SDK accepts.
pub const MAX_DATA_MESSAGE_BYTES: usize = 2048;
const MAX_TOPIC_LEN: usize = 36;

/// Observer and topic registrations on a native session.
///
/// Dropping the guard unregisters everything, whichever way the session
/// ends, so listeners never pile up across join/leave cycles.
pub struct SessionSubscriptions {
    session: Arc<dyn NativeSession>,
    observer: Arc<dyn SessionObserver>,
    topics: Vec<String>,
}

impl SessionSubscriptions {
    pub fn acquire(
        session: Arc<dyn NativeSession>,
        observer: Arc<dyn SessionObserver>,
        topics: &[String],
    ) -> Self {
        session.add_observer(observer.clone());
        for topic in topics {
            session.subscribe_data_topic(topic);
        }
        Self {
            session,
            observer,
            topics: topics.to_vec(),
        }
    }
}

impl Drop for SessionSubscriptions {
    fn drop(&mut self) {
        for topic in &self.topics {
            self.session.unsubscribe_data_topic(topic);
        }
        self.session.remove_observer(&self.observer);
        tracing::debug!("session observers released");
    }
}

struct ActiveSession {
    generation: SessionGeneration,
    session: Arc<dyn NativeSession>,
    _subscriptions: SessionSubscriptions,
}

/// Forwards UI commands to the native session.
///
/// Every command is fire-and-forget: failures are emitted as `Error`
/// events, never returned to the caller.
#[derive(Clone)]
pub struct CommandDispatcher {
    factory: Arc<dyn SessionFactory>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    emitter: EventEmitter,
    sink: Arc<dyn SessionEventSink>,
    generation: Arc<AtomicU64>,
    topics: Vec<String>,
    runtime: Handle,
    device_hook: Option<DeviceHook>,
}

impl CommandDispatcher {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        emitter: EventEmitter,
        topics: Vec<String>,
        runtime: Handle,
        device_hook: Option<DeviceHook>,
    ) -> Self {
        Self {
            factory,
            active: Arc::new(Mutex::new(None)),
            sink: Arc::new(emitter.clone()),
            emitter,
            generation: Arc::new(AtomicU64::new(0)),
            topics,
            runtime,
            device_hook,
        }
    }

    /// Route session events to `sink` instead of the report emitter.
    pub fn with_session_sink(mut self, sink: Arc<dyn SessionEventSink>) -> Self {
        self.sink = sink;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// Claim the generation for the next session start.
    pub fn next_generation(&self) -> SessionGeneration {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether `generation` belongs to the most recent start.
    pub fn is_current(&self, generation: SessionGeneration) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn current(&self) -> Result<Arc<dyn NativeSession>, MeetError> {
        self.lock()
            .as_ref()
            .map(|active| active.session.clone())
            .ok_or(MeetError::NotStarted)
    }

    /// Emit a failure as an `Error` event.
    pub fn report(&self, error: &MeetError) {
        tracing::error!("{error}");
        self.emitter
            .emit(MeetingEvent::Error(ErrorPayload::Message(error.bridge_message())));
    }

    fn run(&self, command: &str, result: Result<(), MeetError>) {
        if let Err(e) = result {
            tracing::warn!("{command} failed");
            self.report(&e);
        }
    }

    pub fn start(&self, params: SessionStartParams) {
        let result = self.try_start(params);
        self.run("start", result);
    }

    pub fn try_start(&self, params: SessionStartParams) -> Result<(), MeetError> {
        let generation = self.next_generation();
        self.try_start_session(generation, params)
    }

    /// Build, subscribe and start a session. A running session is stopped first.
    pub fn try_start_session(
        &self,
        generation: SessionGeneration,
        params: SessionStartParams,
    ) -> Result<(), MeetError> {
        tracing::info!(
            "start meeting {} as {} (session {generation})",
            params.meeting_id,
            params.attendee_id
        );

        let previous = self.lock().take();
        if let Some(previous) = previous {
            tracing::info!("stopping previous meeting session");
            previous.session.stop();
        }

        if !self.factory.permissions_granted() {
            return Err(MeetError::PermissionDenied(
                "Unable to start meeting as permissions are not granted".to_string(),
            ));
        }

        let session = self.factory.create_session(&params).map_err(|e| {
            let cause = e.bridge_message();
            if cause.is_empty() {
                MeetError::SessionCreation("Failed to create meeting session".to_string())
            } else {
                MeetError::SessionCreation(format!("Error starting the meeting session: {cause}"))
            }
        })?;

        let mut translator = EventTranslator::for_session(self.sink.clone(), generation);
        if let Some(hook) = &self.device_hook {
            translator = translator.with_device_hook(hook.clone());
        }
        let (observer, callbacks) = callback_queue();
        self.runtime.spawn(event_loop(callbacks, Arc::new(translator)));

        // Dropped on the error path below, which also ends the event loop.
        let subscriptions = SessionSubscriptions::acquire(session.clone(), observer, &self.topics);
        session.start()?;
        session.start_remote_video();

        let replaced = self.lock().replace(ActiveSession {
            generation,
            session,
            _subscriptions: subscriptions,
        });
        drop(replaced);
        Ok(())
    }

    pub fn stop(&self) {
        tracing::info!("stop meeting");
        let result = self.current().map(|session| session.stop());
        self.run("stop", result);
    }

    /// Unregister from whatever session is active.
    pub fn release(&self) {
        let released = self.lock().take();
        if released.is_some() {
            tracing::info!("meeting session released");
        }
    }

    /// Unregister from the session after both its media channels stopped.
    /// A newer session that replaced it is left alone.
    pub fn release_session(&self, generation: SessionGeneration) {
        let released = {
            let mut active = self.lock();
            if active.as_ref().is_some_and(|current| current.generation == generation) {
                active.take()
            } else {
                None
            }
        };
        if released.is_some() {
            tracing::info!("meeting session {generation} released");
        } else {
            tracing::debug!("session {generation} already released or replaced");
        }
    }

    pub fn set_mute(&self, mute: bool) {
        tracing::info!("set mute: {mute}");
        let result = self.current().map(|session| {
            let accepted = if mute {
                session.realtime_local_mute()
            } else {
                session.realtime_local_unmute()
            };
            if !accepted {
                tracing::warn!("sdk refused mute change to {mute}");
            }
        });
        self.run("set_mute", result);
    }

    pub fn set_camera_on(&self, enabled: bool) {
        tracing::info!("set camera on: {enabled}");
        let result = self.current().and_then(|session| {
            if enabled {
                session.start_local_video()
            } else {
                session.stop_local_video();
                Ok(())
            }
        });
        self.run("set_camera_on", result);
    }

    pub fn bind_view(&self, view: ViewHandle, tile_id: TileId) {
        tracing::info!("bind view {view} to tile {tile_id}");
        let result = validate_tile(tile_id)
            .and_then(|()| self.current())
            .map(|session| session.bind_video_view(view, tile_id));
        self.run("bind_view", result);
    }

    pub fn unbind_view(&self, tile_id: TileId) {
        tracing::info!("unbind view from tile {tile_id}");
        let result = validate_tile(tile_id)
            .and_then(|()| self.current())
            .map(|session| session.unbind_video_view(tile_id));
        self.run("unbind_view", result);
    }

    pub fn send_data_message(&self, topic: &str, data: &str, lifetime_ms: i32) {
        tracing::debug!("send data message on {topic} ({} bytes)", data.len());
        let result = validate_data_message(topic, data, lifetime_ms)
            .and_then(|()| self.current())
            .and_then(|session| session.send_data_message(topic, data, lifetime_ms));
        self.run("send_data_message", result);
    }
}

fn validate_tile(tile_id: TileId) -> Result<(), MeetError> {
    if tile_id < 0 {
        return Err(MeetError::InvalidCommand(format!("invalid tile id {tile_id}")));
    }
    Ok(())
}

fn validate_data_message(topic: &str, data: &str, lifetime_ms: i32) -> Result<(), MeetError> {
    let topic_ok = !topic.is_empty()
        && topic.len() <= MAX_TOPIC_LEN
        && topic.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !topic_ok {
        return Err(MeetError::InvalidCommand(format!("invalid data message topic '{topic}'")));
    }
    if data.len() > MAX_DATA_MESSAGE_BYTES {
        return Err(MeetError::InvalidCommand(format!(
            "data message of {} bytes exceeds {MAX_DATA_MESSAGE_BYTES}",
            data.len()
        )));
    }
    if lifetime_ms < 0 {
        return Err(MeetError::InvalidCommand(format!("negative lifetime {lifetime_ms}ms")));
    }
    Ok(())
}
