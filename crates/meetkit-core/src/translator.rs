//! Native callback translation.
//!
//! [`EventTranslator`] turns SDK callbacks into protocol events, one event
//! per attendee in a batch, in the order the SDK raised them. Apart from the
//! audio/video stop join in [`SessionGate`] it only extracts and renames.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::errors::ErrorKind;
use crate::events::EventEmitter;
use crate::native::{MediaDevice, NativeCallback, SessionObserver, SessionStatusCode};
use crate::protocol::{ErrorPayload, MeetingEvent};

/// Invoked when the set of audio devices changes.
pub type DeviceHook = Arc<dyn Fn(&[MediaDevice]) + Send + Sync>;

/// Counts session starts. Events from a replaced session carry a stale value.
pub type SessionGeneration = u64;

/// Receives translated events tagged with the session that produced them.
pub trait SessionEventSink: Send + Sync {
    fn deliver(&self, generation: SessionGeneration, event: MeetingEvent);
}

impl SessionEventSink for EventEmitter {
    fn deliver(&self, _generation: SessionGeneration, event: MeetingEvent) {
        self.emit(event);
    }
}

/// Audio and video channels stop independently; the meeting only ends once
/// both have reported stopped since the last start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGate {
    audio_stopped: bool,
    video_stopped: bool,
    started: bool,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self {
            audio_stopped: true,
            video_stopped: true,
            started: false,
        }
    }
}

impl SessionGate {
    pub fn on_start(&mut self) {
        self.audio_stopped = false;
        self.video_stopped = false;
        self.started = true;
    }

    /// Returns true when this stop completes the meeting.
    pub fn on_audio_stopped(&mut self) -> bool {
        self.audio_stopped = true;
        self.try_end()
    }

    /// Returns true when this stop completes the meeting.
    pub fn on_video_stopped(&mut self) -> bool {
        self.video_stopped = true;
        self.try_end()
    }

    fn try_end(&mut self) -> bool {
        if self.started && self.audio_stopped && self.video_stopped {
            self.started = false;
            true
        } else {
            false
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

pub struct EventTranslator {
    sink: Arc<dyn SessionEventSink>,
    generation: SessionGeneration,
    gate: Mutex<SessionGate>,
    device_hook: Option<DeviceHook>,
}

impl EventTranslator {
    pub fn new(emitter: EventEmitter) -> Self {
        Self::for_session(Arc::new(emitter), 0)
    }

    pub fn for_session(sink: Arc<dyn SessionEventSink>, generation: SessionGeneration) -> Self {
        Self {
            sink,
            generation,
            gate: Mutex::new(SessionGate::default()),
            device_hook: None,
        }
    }

    pub fn with_device_hook(mut self, hook: DeviceHook) -> Self {
        self.device_hook = Some(hook);
        self
    }

    pub fn gate(&self) -> SessionGate {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Translate and emit.
    pub fn handle(&self, callback: NativeCallback) {
        for event in self.translate(callback) {
            self.sink.deliver(self.generation, event);
        }
    }

    pub fn translate(&self, callback: NativeCallback) -> Vec<MeetingEvent> {
        match callback {
            NativeCallback::AudioSessionStarted { reconnecting } => {
                tracing::info!("audio session started, reconnecting: {reconnecting}");
                if reconnecting {
                    return Vec::new();
                }
                self.gate.lock().unwrap_or_else(PoisonError::into_inner).on_start();
                vec![MeetingEvent::MeetingStart]
            }
            NativeCallback::AudioSessionStopped { status } => {
                tracing::info!("audio session stopped with status {}", status.code());
                let ended = self.gate.lock().unwrap_or_else(PoisonError::into_inner).on_audio_stopped();
                if ended { vec![MeetingEvent::MeetingEnd] } else { Vec::new() }
            }
            NativeCallback::VideoSessionStarted { status } => {
                if status == SessionStatusCode::VideoAtCapacityViewOnly {
                    tracing::warn!("video session at capacity, view only");
                    vec![MeetingEvent::Error(ErrorPayload::Kind(
                        ErrorKind::MaximumConcurrentVideoReached,
                    ))]
                } else {
                    Vec::new()
                }
            }
            NativeCallback::VideoSessionStopped { status } => {
                tracing::info!("video session stopped with status {}", status.code());
                let ended = self.gate.lock().unwrap_or_else(PoisonError::into_inner).on_video_stopped();
                if ended { vec![MeetingEvent::MeetingEnd] } else { Vec::new() }
            }
            NativeCallback::AttendeesJoined(attendees) => attendees
                .into_iter()
                .inspect(|a| {
                    tracing::info!(
                        "attendee join: {} with externalUserId {}",
                        a.attendee_id,
                        a.external_user_id
                    )
                })
                .map(MeetingEvent::AttendeeJoin)
                .collect(),
            NativeCallback::AttendeesLeft(attendees) | NativeCallback::AttendeesDropped(attendees) => {
                attendees
                    .into_iter()
                    .inspect(|a| tracing::info!("attendee leave: {}", a.attendee_id))
                    .map(|a| MeetingEvent::AttendeeLeave(a.attendee_id))
                    .collect()
            }
            NativeCallback::AttendeesMuted(attendees) => attendees
                .into_iter()
                .map(|a| MeetingEvent::AttendeeMute(a.attendee_id))
                .collect(),
            NativeCallback::AttendeesUnmuted(attendees) => attendees
                .into_iter()
                .map(|a| MeetingEvent::AttendeeUnmute(a.attendee_id))
                .collect(),
            NativeCallback::VideoTileAdded(tile) => {
                tracing::info!("video tile {} added for attendee {}", tile.tile_id, tile.attendee_id);
                vec![MeetingEvent::AddVideoTile(tile)]
            }
            NativeCallback::VideoTileRemoved(tile) => {
                tracing::info!("video tile {} removed for attendee {}", tile.tile_id, tile.attendee_id);
                vec![MeetingEvent::RemoveVideoTile(tile)]
            }
            NativeCallback::DataMessageReceived(message) => {
                vec![MeetingEvent::DataMessageReceive(message)]
            }
            NativeCallback::AudioDeviceChanged(devices) => {
                tracing::debug!("audio devices changed: {} available", devices.len());
                if let Some(hook) = &self.device_hook {
                    hook(&devices);
                }
                Vec::new()
            }
            other => {
                tracing::debug!("ignored native callback: {other:?}");
                Vec::new()
            }
        }
    }
}

impl SessionObserver for EventTranslator {
    fn on_callback(&self, callback: NativeCallback) {
        self.handle(callback);
    }
}

/// Observer registered with the SDK: queues callbacks for the event loop.
pub struct QueuedObserver {
    tx: mpsc::UnboundedSender<NativeCallback>,
}

impl SessionObserver for QueuedObserver {
    fn on_callback(&self, callback: NativeCallback) {
        if self.tx.send(callback).is_err() {
            tracing::debug!("event loop gone, dropping native callback");
        }
    }
}

pub fn callback_queue() -> (Arc<QueuedObserver>, mpsc::UnboundedReceiver<NativeCallback>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(QueuedObserver { tx }), rx)
}

/// Single consumer: drains queued callbacks in FIFO order until every
/// sender has been dropped.
pub async fn event_loop(
    mut callbacks: mpsc::UnboundedReceiver<NativeCallback>,
    translator: Arc<EventTranslator>,
) {
    while let Some(callback) = callbacks.recv().await {
        translator.handle(callback);
    }
    tracing::info!("meeting event loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{AttendeeInfo, DataMessage, MediaDeviceKind, PauseState, VideoTileState};
    use crate::protocol::EventName;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn translator() -> EventTranslator {
        EventTranslator::new(EventEmitter::new())
    }

    fn tile(tile_id: i32) -> VideoTileState {
        VideoTileState {
            tile_id,
            attendee_id: "a1".into(),
            is_local: false,
            is_screen_share: false,
            pause_state: PauseState::Unpaused,
            content_height: 0,
            content_width: 0,
        }
    }

    #[test]
    fn join_batch_becomes_one_event_per_attendee_in_order() {
        let t = translator();
        let events = t.translate(NativeCallback::AttendeesJoined(vec![
            AttendeeInfo::new("a1", "a1#Alice"),
            AttendeeInfo::new("a2", "a2#Bob"),
        ]));
        assert_eq!(
            events,
            vec![
                MeetingEvent::AttendeeJoin(AttendeeInfo::new("a1", "a1#Alice")),
                MeetingEvent::AttendeeJoin(AttendeeInfo::new("a2", "a2#Bob")),
            ]
        );
    }

    #[test]
    fn dropped_attendees_are_reported_as_leave() {
        let t = translator();
        let events = t.translate(NativeCallback::AttendeesDropped(vec![AttendeeInfo::new("a1", "x#A")]));
        assert_eq!(events, vec![MeetingEvent::AttendeeLeave("a1".into())]);
    }

    #[test]
    fn reconnecting_audio_start_is_not_a_meeting_start() {
        let t = translator();
        assert!(t.translate(NativeCallback::AudioSessionStarted { reconnecting: true }).is_empty());
        assert!(!t.gate().is_started());
        assert_eq!(
            t.translate(NativeCallback::AudioSessionStarted { reconnecting: false }),
            vec![MeetingEvent::MeetingStart]
        );
    }

    #[test]
    fn meeting_end_waits_for_both_channels() {
        let t = translator();
        t.translate(NativeCallback::AudioSessionStarted { reconnecting: false });

        let video = t.translate(NativeCallback::VideoSessionStopped { status: SessionStatusCode::Ok });
        assert!(video.is_empty());
        let audio = t.translate(NativeCallback::AudioSessionStopped { status: SessionStatusCode::Left });
        assert_eq!(audio, vec![MeetingEvent::MeetingEnd]);

        // A trailing stop does not end the meeting twice.
        let again = t.translate(NativeCallback::AudioSessionStopped { status: SessionStatusCode::Ok });
        assert!(again.is_empty());
    }

    #[test]
    fn stops_before_any_start_do_not_end_the_meeting() {
        let t = translator();
        assert!(t.translate(NativeCallback::VideoSessionStopped { status: SessionStatusCode::Ok }).is_empty());
        assert!(t.translate(NativeCallback::AudioSessionStopped { status: SessionStatusCode::Ok }).is_empty());
    }

    #[test]
    fn video_at_capacity_is_the_distinguished_error() {
        let t = translator();
        let events = t.translate(NativeCallback::VideoSessionStarted {
            status: SessionStatusCode::VideoAtCapacityViewOnly,
        });
        assert_eq!(
            events,
            vec![MeetingEvent::Error(ErrorPayload::Kind(ErrorKind::MaximumConcurrentVideoReached))]
        );
        assert!(t
            .translate(NativeCallback::VideoSessionStarted { status: SessionStatusCode::Ok })
            .is_empty());
    }

    #[test]
    fn paused_and_resized_tiles_emit_nothing() {
        let t = translator();
        assert!(t.translate(NativeCallback::VideoTilePaused(tile(1))).is_empty());
        assert!(t.translate(NativeCallback::VideoTileResumed(tile(1))).is_empty());
        assert!(t.translate(NativeCallback::VideoTileSizeChanged(tile(1))).is_empty());
        assert_eq!(
            t.translate(NativeCallback::VideoTileAdded(tile(1))),
            vec![MeetingEvent::AddVideoTile(tile(1))]
        );
    }

    #[test]
    fn data_message_passes_through_untouched() {
        let t = translator();
        let msg = DataMessage {
            topic: "chat".into(),
            data: "hi".into(),
            sender_attendee_id: "a1".into(),
            sender_external_user_id: "a1#Alice".into(),
            throttled: false,
            timestamp_ms: 42,
        };
        assert_eq!(
            t.translate(NativeCallback::DataMessageReceived(msg.clone())),
            vec![MeetingEvent::DataMessageReceive(msg)]
        );
    }

    #[test]
    fn device_change_runs_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let t = translator().with_device_hook(Arc::new(move |devices: &[MediaDevice]| {
            seen.fetch_add(devices.len(), Ordering::SeqCst);
        }));
        let events = t.translate(NativeCallback::AudioDeviceChanged(vec![MediaDevice {
            label: "Speaker".into(),
            kind: MediaDeviceKind::AudioBuiltinSpeaker,
        }]));
        assert!(events.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn event_loop_drains_queue_in_order_and_stops_when_senders_drop() {
        use crate::events::MeetingEventListener;

        struct Capture(Mutex<Vec<MeetingEvent>>);
        impl MeetingEventListener for Capture {
            fn on_event(&self, event: MeetingEvent) {
                self.0.lock().unwrap().push(event);
            }
        }

        let emitter = EventEmitter::new();
        let capture = Arc::new(Capture(Mutex::new(Vec::new())));
        emitter.add_listener(capture.clone());

        let (observer, rx) = callback_queue();
        let handle = tokio::spawn(event_loop(rx, Arc::new(EventTranslator::new(emitter))));

        observer.on_callback(NativeCallback::AttendeesMuted(vec![AttendeeInfo::new("a1", "")]));
        observer.on_callback(NativeCallback::AttendeesUnmuted(vec![AttendeeInfo::new("a1", "")]));
        drop(observer);
        handle.await.unwrap();

        assert_eq!(
            *capture.0.lock().unwrap(),
            vec![
                MeetingEvent::AttendeeMute("a1".into()),
                MeetingEvent::AttendeeUnmute("a1".into()),
            ]
        );
    }

    #[test]
    fn events_are_tagged_with_their_session() {
        struct Tagged(Mutex<Vec<(SessionGeneration, EventName)>>);
        impl SessionEventSink for Tagged {
            fn deliver(&self, generation: SessionGeneration, event: MeetingEvent) {
                self.0.lock().unwrap().push((generation, event.name()));
            }
        }

        let sink = Arc::new(Tagged(Mutex::new(Vec::new())));
        let t = EventTranslator::for_session(sink.clone(), 7);
        t.handle(NativeCallback::AudioSessionStarted { reconnecting: false });
        t.handle(NativeCallback::AudioSessionStopped {
            status: SessionStatusCode::Ok,
        });
        t.handle(NativeCallback::VideoSessionStopped {
            status: SessionStatusCode::Ok,
        });

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![(7, EventName::MeetingStart), (7, EventName::MeetingEnd)]
        );
    }
}
