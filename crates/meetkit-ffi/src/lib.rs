//! UniFFI bindings for meetkit-core.
//!
//! Provides a MeetingClient object that wraps the MeetingBridge and the
//! settings store into a single FFI-safe interface. The host drives the
//! vendor SDK through [`NativeMeetingSdk`] and feeds every SDK observer
//! callback back in through [`MeetingClient::dispatch_native`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use meetkit_core::{
    self, MeetError,
    events::SubscriptionId,
    native::{
        AttendeeInfo as CoreAttendeeInfo, DataMessage as CoreDataMessage, MediaDevice as CoreMediaDevice,
        MediaDeviceKind as CoreMediaDeviceKind, MediaPlacement as CoreMediaPlacement,
        NativeCallback as CoreNativeCallback, NativeSession, PauseState as CorePauseState, SessionFactory,
        SessionObserver, SessionStartParams as CoreSessionStartParams, SessionStatusCode, TileId, ViewHandle,
        VideoTileState as CoreVideoTileState,
    },
    protocol::{EventName, MeetingEvent as CoreMeetingEvent},
    state::{
        Alert as CoreAlert, MeetingPhase as CoreMeetingPhase, MeetingState as CoreMeetingState,
        RosterEntry as CoreRosterEntry,
    },
    translator::DeviceHook,
};

uniffi::include_scaffolding!("meetkit");

// ── Namespace functions ──────────────────────────────────────────────

/// Initialize tracing/logging. Call once from the host before using MeetingClient.
fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("meetkit_core=debug,meetkit_ffi=debug")),
            )
            .with_ansi(false)
            .init();
    });
}

fn parse_join_info(body: String) -> Result<SessionStartParams, MeetingError> {
    Ok(meetkit_core::parse_join_info(&body)?.into())
}

// ── Error conversion ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum MeetingError {
    #[error("Session creation error: {msg}")]
    SessionCreation { msg: String },
    #[error("Permission denied: {msg}")]
    PermissionDenied { msg: String },
    #[error("Native SDK error: {msg}")]
    Native { msg: String },
    #[error("Invalid command: {msg}")]
    InvalidCommand { msg: String },
    #[error("Not started: {msg}")]
    NotStarted { msg: String },
    #[error("Join info error: {msg}")]
    JoinInfo { msg: String },
    #[error("Network error: {msg}")]
    Network { msg: String },
    #[error("Config error: {msg}")]
    Config { msg: String },
}

impl From<MeetError> for MeetingError {
    fn from(e: MeetError) -> Self {
        tracing::error!("MeetingError: {e}");
        match e {
            MeetError::SessionCreation(msg) => Self::SessionCreation { msg },
            MeetError::PermissionDenied(msg) => Self::PermissionDenied { msg },
            MeetError::Native(msg) => Self::Native { msg },
            MeetError::InvalidCommand(msg) => Self::InvalidCommand { msg },
            MeetError::NotStarted => Self::NotStarted {
                msg: "no active meeting session".to_string(),
            },
            MeetError::JoinInfo(msg) => Self::JoinInfo { msg },
            MeetError::NetworkRequest(msg) => Self::Network { msg },
            MeetError::Config(msg) => Self::Config { msg },
        }
    }
}

impl From<MeetingError> for MeetError {
    fn from(e: MeetingError) -> Self {
        match e {
            MeetingError::SessionCreation { msg } => Self::SessionCreation(msg),
            MeetingError::PermissionDenied { msg } => Self::PermissionDenied(msg),
            MeetingError::InvalidCommand { msg } => Self::InvalidCommand(msg),
            MeetingError::NotStarted { .. } => Self::NotStarted,
            MeetingError::JoinInfo { msg } => Self::JoinInfo(msg),
            MeetingError::Network { msg } => Self::NetworkRequest(msg),
            MeetingError::Config { msg } => Self::Config(msg),
            MeetingError::Native { msg } => Self::Native(msg),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for MeetingError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Native { msg: e.reason }
    }
}

// ── FFI-safe type conversions ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AttendeeInfo {
    pub attendee_id: String,
    pub external_user_id: String,
}

impl From<AttendeeInfo> for CoreAttendeeInfo {
    fn from(a: AttendeeInfo) -> Self {
        CoreAttendeeInfo::new(a.attendee_id, a.external_user_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PauseState {
    Unpaused,
    PausedByUserRequest,
    PausedForPoorConnection,
}

impl From<PauseState> for CorePauseState {
    fn from(p: PauseState) -> Self {
        match p {
            PauseState::Unpaused => Self::Unpaused,
            PauseState::PausedByUserRequest => Self::PausedByUserRequest,
            PauseState::PausedForPoorConnection => Self::PausedForPoorConnection,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoTileState {
    pub tile_id: i32,
    pub attendee_id: String,
    pub is_local: bool,
    pub is_screen_share: bool,
    pub pause_state: PauseState,
    pub content_height: i32,
    pub content_width: i32,
}

impl From<VideoTileState> for CoreVideoTileState {
    fn from(t: VideoTileState) -> Self {
        Self {
            tile_id: t.tile_id,
            attendee_id: t.attendee_id,
            is_local: t.is_local,
            is_screen_share: t.is_screen_share,
            pause_state: t.pause_state.into(),
            content_height: t.content_height,
            content_width: t.content_width,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataMessage {
    pub topic: String,
    pub data: String,
    pub sender_attendee_id: String,
    pub sender_external_user_id: String,
    pub throttled: bool,
    pub timestamp_ms: i64,
}

impl From<DataMessage> for CoreDataMessage {
    fn from(m: DataMessage) -> Self {
        Self {
            topic: m.topic,
            data: m.data,
            sender_attendee_id: m.sender_attendee_id,
            sender_external_user_id: m.sender_external_user_id,
            throttled: m.throttled,
            timestamp_ms: m.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MediaDeviceKind {
    AudioBluetooth,
    AudioWiredHeadset,
    AudioBuiltinSpeaker,
    AudioHandset,
    VideoFrontCamera,
    VideoBackCamera,
    Other,
}

impl From<MediaDeviceKind> for CoreMediaDeviceKind {
    fn from(k: MediaDeviceKind) -> Self {
        match k {
            MediaDeviceKind::AudioBluetooth => Self::AudioBluetooth,
            MediaDeviceKind::AudioWiredHeadset => Self::AudioWiredHeadset,
            MediaDeviceKind::AudioBuiltinSpeaker => Self::AudioBuiltinSpeaker,
            MediaDeviceKind::AudioHandset => Self::AudioHandset,
            MediaDeviceKind::VideoFrontCamera => Self::VideoFrontCamera,
            MediaDeviceKind::VideoBackCamera => Self::VideoBackCamera,
            MediaDeviceKind::Other => Self::Other,
        }
    }
}

impl From<CoreMediaDeviceKind> for MediaDeviceKind {
    fn from(k: CoreMediaDeviceKind) -> Self {
        match k {
            CoreMediaDeviceKind::AudioBluetooth => Self::AudioBluetooth,
            CoreMediaDeviceKind::AudioWiredHeadset => Self::AudioWiredHeadset,
            CoreMediaDeviceKind::AudioBuiltinSpeaker => Self::AudioBuiltinSpeaker,
            CoreMediaDeviceKind::AudioHandset => Self::AudioHandset,
            CoreMediaDeviceKind::VideoFrontCamera => Self::VideoFrontCamera,
            CoreMediaDeviceKind::VideoBackCamera => Self::VideoBackCamera,
            CoreMediaDeviceKind::Other => Self::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaDevice {
    pub label: String,
    pub kind: MediaDeviceKind,
}

impl From<MediaDevice> for CoreMediaDevice {
    fn from(d: MediaDevice) -> Self {
        Self {
            label: d.label,
            kind: d.kind.into(),
        }
    }
}

impl From<&CoreMediaDevice> for MediaDevice {
    fn from(d: &CoreMediaDevice) -> Self {
        Self {
            label: d.label.clone(),
            kind: d.kind.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaPlacement {
    pub audio_fallback_url: String,
    pub audio_host_url: String,
    pub turn_control_url: String,
    pub signaling_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStartParams {
    pub meeting_id: String,
    pub attendee_id: String,
    pub join_token: String,
    pub external_user_id: String,
    pub media_placement: MediaPlacement,
}

impl From<SessionStartParams> for CoreSessionStartParams {
    fn from(p: SessionStartParams) -> Self {
        let m = p.media_placement;
        Self {
            meeting_id: p.meeting_id,
            attendee_id: p.attendee_id,
            join_token: p.join_token,
            external_user_id: p.external_user_id,
            media_placement: CoreMediaPlacement {
                audio_fallback_url: m.audio_fallback_url,
                audio_host_url: m.audio_host_url,
                turn_control_url: m.turn_control_url,
                signaling_url: m.signaling_url,
            },
        }
    }
}

impl From<CoreSessionStartParams> for SessionStartParams {
    fn from(p: CoreSessionStartParams) -> Self {
        let m = p.media_placement;
        Self {
            meeting_id: p.meeting_id,
            attendee_id: p.attendee_id,
            join_token: p.join_token,
            external_user_id: p.external_user_id,
            media_placement: MediaPlacement {
                audio_fallback_url: m.audio_fallback_url,
                audio_host_url: m.audio_host_url,
                turn_control_url: m.turn_control_url,
                signaling_url: m.signaling_url,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum NativeCallback {
    AudioSessionStartedConnecting { reconnecting: bool },
    AudioSessionStarted { reconnecting: bool },
    AudioSessionStopped { status_code: u32 },
    AudioSessionDropped,
    AudioSessionCancelledReconnect,
    VideoSessionStartedConnecting,
    VideoSessionStarted { status_code: u32 },
    VideoSessionStopped { status_code: u32 },
    ConnectionBecamePoor,
    ConnectionRecovered,
    AttendeesJoined { attendees: Vec<AttendeeInfo> },
    AttendeesLeft { attendees: Vec<AttendeeInfo> },
    AttendeesDropped { attendees: Vec<AttendeeInfo> },
    AttendeesMuted { attendees: Vec<AttendeeInfo> },
    AttendeesUnmuted { attendees: Vec<AttendeeInfo> },
    SignalStrengthChanged,
    VolumeChanged,
    VideoTileAdded { tile: VideoTileState },
    VideoTileRemoved { tile: VideoTileState },
    VideoTilePaused { tile: VideoTileState },
    VideoTileResumed { tile: VideoTileState },
    VideoTileSizeChanged { tile: VideoTileState },
    DataMessageReceived { message: DataMessage },
    AudioDeviceChanged { devices: Vec<MediaDevice> },
}

fn attendees(list: Vec<AttendeeInfo>) -> Vec<CoreAttendeeInfo> {
    list.into_iter().map(Into::into).collect()
}

impl From<NativeCallback> for CoreNativeCallback {
    fn from(c: NativeCallback) -> Self {
        use NativeCallback as C;
        match c {
            C::AudioSessionStartedConnecting { reconnecting } => Self::AudioSessionStartedConnecting { reconnecting },
            C::AudioSessionStarted { reconnecting } => Self::AudioSessionStarted { reconnecting },
            C::AudioSessionStopped { status_code } => Self::AudioSessionStopped {
                status: SessionStatusCode::from_code(status_code),
            },
            C::AudioSessionDropped => Self::AudioSessionDropped,
            C::AudioSessionCancelledReconnect => Self::AudioSessionCancelledReconnect,
            C::VideoSessionStartedConnecting => Self::VideoSessionStartedConnecting,
            C::VideoSessionStarted { status_code } => Self::VideoSessionStarted {
                status: SessionStatusCode::from_code(status_code),
            },
            C::VideoSessionStopped { status_code } => Self::VideoSessionStopped {
                status: SessionStatusCode::from_code(status_code),
            },
            C::ConnectionBecamePoor => Self::ConnectionBecamePoor,
            C::ConnectionRecovered => Self::ConnectionRecovered,
            C::AttendeesJoined { attendees: a } => Self::AttendeesJoined(attendees(a)),
            C::AttendeesLeft { attendees: a } => Self::AttendeesLeft(attendees(a)),
            C::AttendeesDropped { attendees: a } => Self::AttendeesDropped(attendees(a)),
            C::AttendeesMuted { attendees: a } => Self::AttendeesMuted(attendees(a)),
            C::AttendeesUnmuted { attendees: a } => Self::AttendeesUnmuted(attendees(a)),
            C::SignalStrengthChanged => Self::SignalStrengthChanged,
            C::VolumeChanged => Self::VolumeChanged,
            C::VideoTileAdded { tile } => Self::VideoTileAdded(tile.into()),
            C::VideoTileRemoved { tile } => Self::VideoTileRemoved(tile.into()),
            C::VideoTilePaused { tile } => Self::VideoTilePaused(tile.into()),
            C::VideoTileResumed { tile } => Self::VideoTileResumed(tile.into()),
            C::VideoTileSizeChanged { tile } => Self::VideoTileSizeChanged(tile.into()),
            C::DataMessageReceived { message } => Self::DataMessageReceived(message.into()),
            C::AudioDeviceChanged { devices } => {
                Self::AudioDeviceChanged(devices.into_iter().map(Into::into).collect())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingPhase {
    NotInMeeting,
    Joining,
    InMeeting,
}

impl From<CoreMeetingPhase> for MeetingPhase {
    fn from(p: CoreMeetingPhase) -> Self {
        match p {
            CoreMeetingPhase::NotInMeeting => Self::NotInMeeting,
            CoreMeetingPhase::Joining => Self::Joining,
            CoreMeetingPhase::InMeeting => Self::InMeeting,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeetingSnapshot {
    pub attendees: Vec<String>,
    pub muted_attendees: Vec<String>,
    pub video_tiles: Vec<i32>,
    pub local_tile_id: Option<i32>,
    pub screen_share_tile: Option<i32>,
}

impl From<CoreMeetingState> for MeetingSnapshot {
    fn from(s: CoreMeetingState) -> Self {
        Self {
            attendees: s.attendees,
            muted_attendees: s.muted_attendees.into_iter().collect(),
            video_tiles: s.video_tiles,
            local_tile_id: s.local_tile_id,
            screen_share_tile: s.screen_share_tile,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub attendee_id: String,
    pub display_name: String,
    pub muted: bool,
}

impl From<CoreRosterEntry> for RosterEntry {
    fn from(r: CoreRosterEntry) -> Self {
        Self {
            attendee_id: r.attendee_id,
            display_name: r.display_name,
            muted: r.muted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLabel {
    pub page: u32,
    pub total: u32,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl From<CoreAlert> for Alert {
    fn from(a: CoreAlert) -> Self {
        Self {
            title: a.title,
            message: a.message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub server_region: String,
    pub data_topics: Vec<String>,
    pub remote_tiles_per_page: u32,
    pub echo_data_messages: bool,
    pub echo_lifetime_ms: i32,
}

impl From<meetkit_core::Settings> for Settings {
    fn from(s: meetkit_core::Settings) -> Self {
        Self {
            server_url: s.server_url,
            server_region: s.server_region,
            data_topics: s.data_topics,
            remote_tiles_per_page: to_u32(s.remote_tiles_per_page),
            echo_data_messages: s.echo_data_messages,
            echo_lifetime_ms: s.echo_lifetime_ms,
        }
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ── Callback interfaces ───────────────────────────────────────────────

/// Receives every event as its wire name and JSON payload.
pub trait MeetingEventListener: Send + Sync {
    fn on_event(&self, name: String, payload: String);
}

/// Host-side vendor SDK. The host keeps at most one session alive:
/// `create_session` replaces whatever session it held before.
pub trait NativeMeetingSdk: Send + Sync {
    fn permissions_granted(&self) -> bool;
    fn create_session(&self, params: SessionStartParams) -> Result<(), MeetingError>;
    fn subscribe_data_topic(&self, topic: String);
    fn unsubscribe_data_topic(&self, topic: String);
    fn start(&self) -> Result<(), MeetingError>;
    fn start_remote_video(&self);
    fn stop(&self);
    fn realtime_local_mute(&self) -> bool;
    fn realtime_local_unmute(&self) -> bool;
    fn start_local_video(&self) -> Result<(), MeetingError>;
    fn stop_local_video(&self);
    fn bind_video_view(&self, view: i64, tile_id: i32);
    fn unbind_video_view(&self, tile_id: i32);
    fn send_data_message(&self, topic: String, data: String, lifetime_ms: i32) -> Result<(), MeetingError>;
}

pub trait DeviceListener: Send + Sync {
    fn on_devices_changed(&self, devices: Vec<MediaDevice>);
}

// ── Bridge listener: core event → FFI callback ────────────────────────

struct BridgeListener {
    ffi_listener: Arc<dyn MeetingEventListener>,
}

impl meetkit_core::MeetingEventListener for BridgeListener {
    fn on_event(&self, event: CoreMeetingEvent) {
        let wire = event.to_wire();
        match serde_json::to_string(&wire.payload) {
            Ok(payload) => self.ffi_listener.on_event(wire.name.as_str().to_string(), payload),
            Err(e) => tracing::error!("failed to encode {} payload: {e}", wire.name),
        }
    }
}

// ── SDK session: core traits over the host callback ───────────────────

fn lock<T>(m: &StdMutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Observers are kept on this side; the host only forwards raw callbacks.
struct SdkSession {
    sdk: Arc<dyn NativeMeetingSdk>,
    observers: StdMutex<Vec<Arc<dyn SessionObserver>>>,
}

impl SdkSession {
    fn dispatch(&self, callback: CoreNativeCallback) {
        let observers = lock(&self.observers).clone();
        if observers.is_empty() {
            tracing::debug!("no observer for native callback {callback:?}");
        }
        for observer in observers {
            observer.on_callback(callback.clone());
        }
    }
}

impl NativeSession for SdkSession {
    fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        lock(&self.observers).push(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn SessionObserver>) {
        lock(&self.observers).retain(|o| !std::ptr::addr_eq(Arc::as_ptr(o), Arc::as_ptr(observer)));
    }

    fn subscribe_data_topic(&self, topic: &str) {
        self.sdk.subscribe_data_topic(topic.to_string());
    }

    fn unsubscribe_data_topic(&self, topic: &str) {
        self.sdk.unsubscribe_data_topic(topic.to_string());
    }

    fn start(&self) -> Result<(), MeetError> {
        self.sdk.start().map_err(MeetError::from)
    }

    fn start_remote_video(&self) {
        self.sdk.start_remote_video();
    }

    fn stop(&self) {
        self.sdk.stop();
    }

    fn realtime_local_mute(&self) -> bool {
        self.sdk.realtime_local_mute()
    }

    fn realtime_local_unmute(&self) -> bool {
        self.sdk.realtime_local_unmute()
    }

    fn start_local_video(&self) -> Result<(), MeetError> {
        self.sdk.start_local_video().map_err(MeetError::from)
    }

    fn stop_local_video(&self) {
        self.sdk.stop_local_video();
    }

    fn bind_video_view(&self, view: ViewHandle, tile_id: TileId) {
        self.sdk.bind_video_view(view, tile_id);
    }

    fn unbind_video_view(&self, tile_id: TileId) {
        self.sdk.unbind_video_view(tile_id);
    }

    fn send_data_message(&self, topic: &str, data: &str, lifetime_ms: i32) -> Result<(), MeetError> {
        self.sdk
            .send_data_message(topic.to_string(), data.to_string(), lifetime_ms)
            .map_err(MeetError::from)
    }
}

struct SdkFactory {
    sdk: Arc<dyn NativeMeetingSdk>,
    current: Arc<StdMutex<Option<Arc<SdkSession>>>>,
}

impl SessionFactory for SdkFactory {
    fn permissions_granted(&self) -> bool {
        self.sdk.permissions_granted()
    }

    fn create_session(&self, params: &CoreSessionStartParams) -> Result<Arc<dyn NativeSession>, MeetError> {
        self.sdk.create_session(params.clone().into())?;
        let session = Arc::new(SdkSession {
            sdk: self.sdk.clone(),
            observers: StdMutex::new(Vec::new()),
        });
        *lock(&self.current) = Some(session.clone());
        Ok(session)
    }
}

// ── MeetingClient: main FFI object ────────────────────────────────────

/// Settings are read once, when the client is created.
pub struct MeetingClient {
    bridge: meetkit_core::MeetingBridge,
    current_session: Arc<StdMutex<Option<Arc<SdkSession>>>>,
    device_listener: Arc<StdMutex<Option<Box<dyn DeviceListener>>>>,
    subscriptions: StdMutex<HashMap<String, SubscriptionId>>,
    settings: meetkit_core::SettingsStore,
    /// Runs the meeting event loops. Dropped after the bridge.
    _rt: tokio::runtime::Runtime,
}

impl MeetingClient {
    pub fn new(data_dir: String, sdk: Box<dyn NativeMeetingSdk>) -> Result<Self, MeetingError> {
        let rt = tokio::runtime::Runtime::new().map_err(|e| MeetingError::Config {
            msg: format!("failed to create tokio runtime: {e}"),
        })?;
        let settings = meetkit_core::SettingsStore::new(&data_dir);

        let current_session = Arc::new(StdMutex::new(None));
        let factory = Arc::new(SdkFactory {
            sdk: Arc::from(sdk),
            current: current_session.clone(),
        });

        let device_listener: Arc<StdMutex<Option<Box<dyn DeviceListener>>>> = Arc::new(StdMutex::new(None));
        let slot = device_listener.clone();
        let device_hook: DeviceHook = Arc::new(move |devices: &[CoreMediaDevice]| {
            if let Some(listener) = lock(&slot).as_ref() {
                listener.on_devices_changed(devices.iter().map(MediaDevice::from).collect());
            }
        });

        let bridge =
            meetkit_core::MeetingBridge::new(factory, &settings.get(), rt.handle().clone(), Some(device_hook));
        tracing::info!("meeting client created in {data_dir}");

        Ok(Self {
            bridge,
            current_session,
            device_listener,
            subscriptions: StdMutex::new(HashMap::new()),
            settings,
            _rt: rt,
        })
    }

    /// Entry point for every SDK observer callback of the current session.
    pub fn dispatch_native(&self, callback: NativeCallback) {
        let session = lock(&self.current_session).clone();
        match session {
            Some(session) => session.dispatch(callback.into()),
            None => tracing::warn!("native callback without a session: {callback:?}"),
        }
    }

    /// Receives the device list whenever the audio route changes.
    pub fn set_device_listener(&self, listener: Box<dyn DeviceListener>) {
        *lock(&self.device_listener) = Some(listener);
    }

    fn track(&self, id: SubscriptionId) -> String {
        let key = id.to_string();
        lock(&self.subscriptions).insert(key.clone(), id);
        key
    }

    pub fn add_listener(&self, listener: Box<dyn MeetingEventListener>) -> String {
        let bridge = Arc::new(BridgeListener {
            ffi_listener: Arc::from(listener),
        });
        self.track(self.bridge.add_listener(bridge))
    }

    pub fn subscribe(&self, event_name: String, listener: Box<dyn MeetingEventListener>) -> Result<String, MeetingError> {
        let name = EventName::parse(&event_name).ok_or_else(|| MeetingError::InvalidCommand {
            msg: format!("unknown event name '{event_name}'"),
        })?;
        let bridge = Arc::new(BridgeListener {
            ffi_listener: Arc::from(listener),
        });
        Ok(self.track(self.bridge.subscribe(name, bridge)))
    }

    pub fn remove_listener(&self, subscription_id: String) -> bool {
        match lock(&self.subscriptions).remove(&subscription_id) {
            Some(id) => self.bridge.remove_listener(id),
            None => false,
        }
    }

    pub fn remove_all_listeners(&self) {
        lock(&self.subscriptions).clear();
        self.bridge.remove_all_listeners();
    }

    /// URL of the join request for the configured server.
    pub fn join_url(&self, title: String, name: String) -> Result<String, MeetingError> {
        let settings = self.settings.get();
        let request = meetkit_core::JoinRequest::new(&title, &name, &settings.server_region)?;
        Ok(request.url(&settings.server_url)?)
    }

    /// Start a meeting from the body of a join response.
    pub fn start_meeting_from_join_info(&self, body: String) -> Result<(), MeetingError> {
        match meetkit_core::parse_join_info(&body) {
            Ok(params) => {
                self.bridge.start_meeting(params);
                Ok(())
            }
            Err(e) => {
                self.bridge.report_join_failure(&e);
                Err(e.into())
            }
        }
    }

    pub fn start_meeting(&self, params: SessionStartParams) {
        self.bridge.start_meeting(params.into());
    }

    /// The host's join request failed.
    pub fn report_join_failure(&self, cause: String) {
        self.bridge.report_join_failure(&MeetError::NetworkRequest(cause));
    }

    pub fn stop_meeting(&self) {
        self.bridge.stop_meeting();
    }

    pub fn set_mute(&self, mute: bool) {
        self.bridge.set_mute(mute);
    }

    pub fn set_camera_on(&self, enabled: bool) {
        self.bridge.set_camera_on(enabled);
    }

    pub fn bind_view(&self, view: i64, tile_id: i32) {
        self.bridge.bind_view(view, tile_id);
    }

    pub fn unbind_view(&self, tile_id: i32) {
        self.bridge.unbind_view(tile_id);
    }

    pub fn send_data_message(&self, topic: String, data: String, lifetime_ms: i32) {
        self.bridge.send_data_message(&topic, &data, lifetime_ms);
    }

    pub fn phase(&self) -> MeetingPhase {
        self.bridge.phase().into()
    }

    pub fn snapshot(&self) -> MeetingSnapshot {
        self.bridge.snapshot().into()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.bridge.roster().into_iter().map(RosterEntry::from).collect()
    }

    pub fn is_muted(&self, attendee_id: String) -> bool {
        self.bridge.is_muted(&attendee_id)
    }

    pub fn self_video_enabled(&self) -> bool {
        self.bridge.self_video_enabled()
    }

    pub fn visible_tiles(&self) -> Vec<i32> {
        self.bridge.visible_tiles()
    }

    pub fn next_page(&self) -> bool {
        self.bridge.next_page()
    }

    pub fn prev_page(&self) -> bool {
        self.bridge.prev_page()
    }

    pub fn page_label(&self) -> PageLabel {
        let (page, total) = self.bridge.page_label();
        PageLabel {
            page: to_u32(page),
            total: to_u32(total),
        }
    }

    pub fn take_alerts(&self) -> Vec<Alert> {
        self.bridge.take_alerts().into_iter().map(Alert::from).collect()
    }

    pub fn get_settings(&self) -> Settings {
        self.settings.get().into()
    }

    pub fn set_server(&self, url: String, region: String) -> Result<(), MeetingError> {
        Ok(self.settings.set_server(url, region)?)
    }

    pub fn set_data_topics(&self, topics: Vec<String>) -> Result<(), MeetingError> {
        Ok(self.settings.set_data_topics(topics)?)
    }

    pub fn set_remote_tiles_per_page(&self, per_page: u32) -> Result<(), MeetingError> {
        Ok(self.settings.set_remote_tiles_per_page(per_page as usize)?)
    }

    pub fn set_echo(&self, enabled: bool, lifetime_ms: i32) -> Result<(), MeetingError> {
        Ok(self.settings.set_echo(enabled, lifetime_ms)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct FakeSdk {
        calls: StdMutex<Vec<String>>,
        deny_permissions: bool,
    }

    impl FakeSdk {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    impl NativeMeetingSdk for Arc<FakeSdk> {
        fn permissions_granted(&self) -> bool {
            !self.deny_permissions
        }
        fn create_session(&self, params: SessionStartParams) -> Result<(), MeetingError> {
            self.record(format!("create {}", params.meeting_id));
            Ok(())
        }
        fn subscribe_data_topic(&self, topic: String) {
            self.record(format!("subscribe {topic}"));
        }
        fn unsubscribe_data_topic(&self, topic: String) {
            self.record(format!("unsubscribe {topic}"));
        }
        fn start(&self) -> Result<(), MeetingError> {
            self.record("start");
            Ok(())
        }
        fn start_remote_video(&self) {
            self.record("start_remote_video");
        }
        fn stop(&self) {
            self.record("stop");
        }
        fn realtime_local_mute(&self) -> bool {
            self.record("mute");
            true
        }
        fn realtime_local_unmute(&self) -> bool {
            self.record("unmute");
            true
        }
        fn start_local_video(&self) -> Result<(), MeetingError> {
            Err(MeetingError::Native { msg: "camera busy".into() })
        }
        fn stop_local_video(&self) {
            self.record("stop_local_video");
        }
        fn bind_video_view(&self, view: i64, tile_id: i32) {
            self.record(format!("bind {view} {tile_id}"));
        }
        fn unbind_video_view(&self, tile_id: i32) {
            self.record(format!("unbind {tile_id}"));
        }
        fn send_data_message(&self, topic: String, data: String, lifetime_ms: i32) -> Result<(), MeetingError> {
            self.record(format!("send {topic} {data} {lifetime_ms}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<(String, String)>>);

    impl MeetingEventListener for Arc<Recorder> {
        fn on_event(&self, name: String, payload: String) {
            self.0.lock().unwrap().push((name, payload));
        }
    }

    impl Recorder {
        fn has(&self, name: &str) -> bool {
            self.0.lock().unwrap().iter().any(|(n, _)| n == name)
        }
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn client(sdk: Arc<FakeSdk>) -> (MeetingClient, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let client = MeetingClient::new(dir.path().to_str().unwrap().to_string(), Box::new(sdk)).unwrap();
        (client, dir)
    }

    fn params() -> SessionStartParams {
        SessionStartParams {
            meeting_id: "m-1".into(),
            attendee_id: "a1".into(),
            ..SessionStartParams::default()
        }
    }

    #[test]
    fn test_start_meeting_drives_sdk_and_emits_wire_events() {
        let sdk = Arc::new(FakeSdk::default());
        let (client, _dir) = client(sdk.clone());
        let recorder = Arc::new(Recorder::default());
        client.add_listener(Box::new(recorder.clone()));

        client.start_meeting(params());
        assert_eq!(client.phase(), MeetingPhase::Joining);
        assert_eq!(
            *sdk.calls.lock().unwrap(),
            vec!["create m-1", "subscribe chat", "start", "start_remote_video"]
        );

        client.dispatch_native(NativeCallback::AudioSessionStarted { reconnecting: false });
        client.dispatch_native(NativeCallback::AttendeesJoined {
            attendees: vec![AttendeeInfo {
                attendee_id: "a2".into(),
                external_user_id: "a2#Bob".into(),
            }],
        });
        wait_until(|| recorder.has("OnAttendeesJoin"));

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events[0], ("OnMeetingStart".to_string(), "null".to_string()));
        assert_eq!(
            events[1],
            (
                "OnAttendeesJoin".to_string(),
                r#"{"attendeeId":"a2","externalUserId":"a2#Bob"}"#.to_string()
            )
        );
        assert_eq!(client.phase(), MeetingPhase::InMeeting);
        assert_eq!(client.roster()[0].display_name, "Bob");
    }

    #[test]
    fn test_subscribe_filters_by_name() {
        let (client, _dir) = client(Arc::new(FakeSdk::default()));
        let recorder = Arc::new(Recorder::default());
        let id = client.subscribe("OnError".into(), Box::new(recorder.clone())).unwrap();
        assert!(client.subscribe("OnNothing".into(), Box::new(recorder.clone())).is_err());

        client.start_meeting(params());
        client.set_camera_on(true);
        wait_until(|| recorder.has("OnError"));
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![("OnError".to_string(), r#""camera busy""#.to_string())]
        );

        assert!(client.remove_listener(id.clone()));
        assert!(!client.remove_listener(id));
    }

    #[test]
    fn test_meeting_end_after_both_channels_stop() {
        let sdk = Arc::new(FakeSdk::default());
        let (client, _dir) = client(sdk.clone());
        let recorder = Arc::new(Recorder::default());
        client.add_listener(Box::new(recorder.clone()));

        client.start_meeting(params());
        client.dispatch_native(NativeCallback::AudioSessionStarted { reconnecting: false });
        client.stop_meeting();
        client.dispatch_native(NativeCallback::AudioSessionStopped { status_code: 200 });
        client.dispatch_native(NativeCallback::VideoSessionStopped { status_code: 200 });

        wait_until(|| recorder.has("OnMeetingEnd"));
        wait_until(|| sdk.calls.lock().unwrap().contains(&"unsubscribe chat".to_string()));
        assert_eq!(client.phase(), MeetingPhase::NotInMeeting);
    }

    #[test]
    fn test_denied_permissions_raise_alert() {
        let sdk = Arc::new(FakeSdk {
            deny_permissions: true,
            ..FakeSdk::default()
        });
        let (client, _dir) = client(sdk.clone());
        client.start_meeting(params());

        let alerts = client.take_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Unable to start meeting as permissions are not granted");
        assert_eq!(client.phase(), MeetingPhase::NotInMeeting);
        assert!(sdk.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bad_join_info_reports_not_found() {
        let (client, _dir) = client(Arc::new(FakeSdk::default()));
        let result = client.start_meeting_from_join_info("{}".into());
        assert!(matches!(result, Err(MeetingError::JoinInfo { .. })));
        assert_eq!(client.take_alerts()[0].title, "Unable to find meeting");
    }

    #[test]
    fn test_join_url_uses_settings() {
        let (client, _dir) = client(Arc::new(FakeSdk::default()));
        assert!(matches!(
            client.join_url("standup".into(), "Alice".into()),
            Err(MeetingError::Config { .. })
        ));
        client.set_server("https://join.example.com/".into(), "eu-west-1".into()).unwrap();
        assert_eq!(
            client.join_url("standup".into(), "Alice".into()).unwrap(),
            "https://join.example.com/join?title=standup&name=Alice&region=eu-west-1"
        );
        assert_eq!(client.get_settings().server_region, "eu-west-1");
    }

    #[derive(Default)]
    struct Devices(StdMutex<Vec<String>>);

    impl DeviceListener for Arc<Devices> {
        fn on_devices_changed(&self, devices: Vec<MediaDevice>) {
            self.0.lock().unwrap().extend(devices.into_iter().map(|d| d.label));
        }
    }

    #[test]
    fn test_device_changes_reach_device_listener() {
        let (client, _dir) = client(Arc::new(FakeSdk::default()));
        let devices = Arc::new(Devices::default());
        client.set_device_listener(Box::new(devices.clone()));
        client.start_meeting(params());
        client.dispatch_native(NativeCallback::AudioDeviceChanged {
            devices: vec![MediaDevice {
                label: "Pixel Buds".into(),
                kind: MediaDeviceKind::AudioBluetooth,
            }],
        });
        wait_until(|| !devices.0.lock().unwrap().is_empty());
        assert_eq!(*devices.0.lock().unwrap(), vec!["Pixel Buds".to_string()]);
    }

    #[test]
    fn test_callbacks_without_session_are_dropped() {
        let (client, _dir) = client(Arc::new(FakeSdk::default()));
        client.dispatch_native(NativeCallback::AudioSessionStarted { reconnecting: false });
        assert_eq!(client.phase(), MeetingPhase::NotInMeeting);
    }
}
