//! Interface to the vendor media SDK.
//!
//! The real session (audio mixing, codecs, transport) lives on the platform
//! side. The core only sees it through [`SessionFactory`] and
//! [`NativeSession`], and receives its observer callbacks as
//! [`NativeCallback`] values through a single [`SessionObserver`] entry point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::MeetError;

pub type AttendeeId = String;
pub type TileId = i32;

/// Platform view identifier (React tag, view pointer id...) a tile is bound to.
pub type ViewHandle = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeInfo {
    pub attendee_id: AttendeeId,
    pub external_user_id: String,
}

impl AttendeeInfo {
    pub fn new(attendee_id: impl Into<String>, external_user_id: impl Into<String>) -> Self {
        Self {
            attendee_id: attendee_id.into(),
            external_user_id: external_user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseState {
    Unpaused,
    PausedByUserRequest,
    PausedForPoorConnection,
}

impl PauseState {
    /// Position in the SDK enumeration, which is what goes over the bridge.
    pub fn ordinal(&self) -> i32 {
        match self {
            PauseState::Unpaused => 0,
            PauseState::PausedByUserRequest => 1,
            PauseState::PausedForPoorConnection => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTileState {
    pub tile_id: TileId,
    pub attendee_id: AttendeeId,
    pub is_local: bool,
    pub is_screen_share: bool,
    pub pause_state: PauseState,
    pub content_height: i32,
    pub content_width: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMessage {
    pub topic: String,
    pub data: String,
    pub sender_attendee_id: AttendeeId,
    pub sender_external_user_id: String,
    pub throttled: bool,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDeviceKind {
    AudioBluetooth,
    AudioWiredHeadset,
    AudioBuiltinSpeaker,
    AudioHandset,
    VideoFrontCamera,
    VideoBackCamera,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDevice {
    pub label: String,
    pub kind: MediaDeviceKind,
}

/// Status codes reported with session lifecycle callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatusCode {
    Ok,
    Left,
    AudioJoinedFromAnotherDevice,
    AudioDisconnectAudio,
    AudioAuthenticationRejected,
    AudioCallAtCapacity,
    VideoAtCapacityViewOnly,
    Other(u32),
}

impl SessionStatusCode {
    pub fn from_code(code: u32) -> Self {
        match code {
            200 => Self::Ok,
            201 => Self::Left,
            202 => Self::AudioJoinedFromAnotherDevice,
            203 => Self::AudioDisconnectAudio,
            204 => Self::AudioAuthenticationRejected,
            205 => Self::AudioCallAtCapacity,
            206 => Self::VideoAtCapacityViewOnly,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Ok => 200,
            Self::Left => 201,
            Self::AudioJoinedFromAnotherDevice => 202,
            Self::AudioDisconnectAudio => 203,
            Self::AudioAuthenticationRejected => 204,
            Self::AudioCallAtCapacity => 205,
            Self::VideoAtCapacityViewOnly => 206,
            Self::Other(code) => *code,
        }
    }
}

/// Every observer callback the SDK can raise, as one tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCallback {
    AudioSessionStartedConnecting { reconnecting: bool },
    AudioSessionStarted { reconnecting: bool },
    AudioSessionStopped { status: SessionStatusCode },
    AudioSessionDropped,
    AudioSessionCancelledReconnect,
    VideoSessionStartedConnecting,
    VideoSessionStarted { status: SessionStatusCode },
    VideoSessionStopped { status: SessionStatusCode },
    ConnectionBecamePoor,
    ConnectionRecovered,
    AttendeesJoined(Vec<AttendeeInfo>),
    AttendeesLeft(Vec<AttendeeInfo>),
    AttendeesDropped(Vec<AttendeeInfo>),
    AttendeesMuted(Vec<AttendeeInfo>),
    AttendeesUnmuted(Vec<AttendeeInfo>),
    SignalStrengthChanged,
    VolumeChanged,
    VideoTileAdded(VideoTileState),
    VideoTileRemoved(VideoTileState),
    VideoTilePaused(VideoTileState),
    VideoTileResumed(VideoTileState),
    VideoTileSizeChanged(VideoTileState),
    DataMessageReceived(DataMessage),
    AudioDeviceChanged(Vec<MediaDevice>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPlacement {
    pub audio_fallback_url: String,
    pub audio_host_url: String,
    pub turn_control_url: String,
    pub signaling_url: String,
}

/// Everything the SDK needs to build a meeting session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartParams {
    pub meeting_id: String,
    pub attendee_id: AttendeeId,
    pub join_token: String,
    pub external_user_id: String,
    pub media_placement: MediaPlacement,
}

/// Single dispatch entry point for SDK callbacks.
///
/// The SDK must serialize its calls: the core never expects two callbacks
/// for the same meeting concurrently.
pub trait SessionObserver: Send + Sync {
    fn on_callback(&self, callback: NativeCallback);
}

/// A live SDK meeting session.
pub trait NativeSession: Send + Sync {
    fn add_observer(&self, observer: Arc<dyn SessionObserver>);
    fn remove_observer(&self, observer: &Arc<dyn SessionObserver>);
    fn subscribe_data_topic(&self, topic: &str);
    fn unsubscribe_data_topic(&self, topic: &str);

    fn start(&self) -> Result<(), MeetError>;
    fn start_remote_video(&self);
    fn stop(&self);

    /// Returns false when the SDK refused the mute change.
    fn realtime_local_mute(&self) -> bool;
    fn realtime_local_unmute(&self) -> bool;
    fn start_local_video(&self) -> Result<(), MeetError>;
    fn stop_local_video(&self);

    fn bind_video_view(&self, view: ViewHandle, tile_id: TileId);
    fn unbind_video_view(&self, tile_id: TileId);

    fn send_data_message(&self, topic: &str, data: &str, lifetime_ms: i32) -> Result<(), MeetError>;
}

/// Builds sessions and answers the device permission question.
pub trait SessionFactory: Send + Sync {
    fn permissions_granted(&self) -> bool;
    fn create_session(&self, params: &SessionStartParams) -> Result<Arc<dyn NativeSession>, MeetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_roundtrips_known_and_unknown_codes() {
        assert_eq!(SessionStatusCode::from_code(206), SessionStatusCode::VideoAtCapacityViewOnly);
        assert_eq!(SessionStatusCode::from_code(200), SessionStatusCode::Ok);
        assert_eq!(SessionStatusCode::from_code(418), SessionStatusCode::Other(418));
        assert_eq!(SessionStatusCode::Other(418).code(), 418);
    }

    #[test]
    fn pause_ordinals_follow_sdk_enumeration() {
        assert_eq!(PauseState::Unpaused.ordinal(), 0);
        assert_eq!(PauseState::PausedByUserRequest.ordinal(), 1);
        assert_eq!(PauseState::PausedForPoorConnection.ordinal(), 2);
    }
}
