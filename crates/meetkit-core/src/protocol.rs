//! The fixed event vocabulary shared by both ends of the bridge.
//!
//! Native side produces [`MeetingEvent`]s, the UI side receives them as
//! [`WireEvent`]s: an event name plus a JSON payload using the field names
//! the UI layer expects (`attendeeId`, `tileId`, ...).

use serde_json::Value;

use crate::errors::ErrorKind;
use crate::native::{AttendeeId, AttendeeInfo, DataMessage, VideoTileState};

#[derive(Debug, Clone, PartialEq)]
pub enum MeetingEvent {
    MeetingStart,
    MeetingEnd,
    AttendeeJoin(AttendeeInfo),
    AttendeeLeave(AttendeeId),
    AttendeeMute(AttendeeId),
    AttendeeUnmute(AttendeeId),
    AddVideoTile(VideoTileState),
    RemoveVideoTile(VideoTileState),
    DataMessageReceive(DataMessage),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPayload {
    Message(String),
    Kind(ErrorKind),
}

impl ErrorPayload {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn as_wire_str(&self) -> &str {
        match self {
            ErrorPayload::Message(msg) => msg,
            ErrorPayload::Kind(kind) => kind.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    MeetingStart,
    MeetingEnd,
    AttendeesJoin,
    AttendeesLeave,
    AttendeesMute,
    AttendeesUnmute,
    AddVideoTile,
    RemoveVideoTile,
    DataMessageReceive,
    Error,
}

impl EventName {
    pub const ALL: [EventName; 10] = [
        EventName::MeetingStart,
        EventName::MeetingEnd,
        EventName::AttendeesJoin,
        EventName::AttendeesLeave,
        EventName::AttendeesMute,
        EventName::AttendeesUnmute,
        EventName::AddVideoTile,
        EventName::RemoveVideoTile,
        EventName::DataMessageReceive,
        EventName::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::MeetingStart => "OnMeetingStart",
            EventName::MeetingEnd => "OnMeetingEnd",
            EventName::AttendeesJoin => "OnAttendeesJoin",
            EventName::AttendeesLeave => "OnAttendeesLeave",
            EventName::AttendeesMute => "OnAttendeesMute",
            EventName::AttendeesUnmute => "OnAttendeesUnmute",
            EventName::AddVideoTile => "OnAddVideoTile",
            EventName::RemoveVideoTile => "OnRemoveVideoTile",
            EventName::DataMessageReceive => "OnDataMessageReceive",
            EventName::Error => "OnError",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == name)
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event as it crosses into the UI process.
#[derive(Debug, Clone, PartialEq)]
pub struct WireEvent {
    pub name: EventName,
    pub payload: Value,
}

impl MeetingEvent {
    pub fn name(&self) -> EventName {
        match self {
            MeetingEvent::MeetingStart => EventName::MeetingStart,
            MeetingEvent::MeetingEnd => EventName::MeetingEnd,
            MeetingEvent::AttendeeJoin(_) => EventName::AttendeesJoin,
            MeetingEvent::AttendeeLeave(_) => EventName::AttendeesLeave,
            MeetingEvent::AttendeeMute(_) => EventName::AttendeesMute,
            MeetingEvent::AttendeeUnmute(_) => EventName::AttendeesUnmute,
            MeetingEvent::AddVideoTile(_) => EventName::AddVideoTile,
            MeetingEvent::RemoveVideoTile(_) => EventName::RemoveVideoTile,
            MeetingEvent::DataMessageReceive(_) => EventName::DataMessageReceive,
            MeetingEvent::Error(_) => EventName::Error,
        }
    }

    /// Field extraction and renaming only, no interpretation.
    pub fn to_wire(&self) -> WireEvent {
        let payload = match self {
            MeetingEvent::MeetingStart | MeetingEvent::MeetingEnd => Value::Null,
            MeetingEvent::AttendeeJoin(info) => serde_json::json!({
                "attendeeId": info.attendee_id,
                "externalUserId": info.external_user_id,
            }),
            MeetingEvent::AttendeeLeave(id) => serde_json::json!({ "attendeeId": id }),
            MeetingEvent::AttendeeMute(id) | MeetingEvent::AttendeeUnmute(id) => {
                Value::String(id.clone())
            }
            MeetingEvent::AddVideoTile(tile) | MeetingEvent::RemoveVideoTile(tile) => serde_json::json!({
                "tileId": tile.tile_id,
                "isLocal": tile.is_local,
                "isScreenShare": tile.is_screen_share,
                "attendeeId": tile.attendee_id,
                "pauseState": tile.pause_state.ordinal(),
                "videoStreamContentHeight": tile.content_height,
                "videoStreamContentWidth": tile.content_width,
            }),
            MeetingEvent::DataMessageReceive(msg) => serde_json::json!({
                "data": msg.data,
                "senderAttendeeId": msg.sender_attendee_id,
                "senderExternalUserId": msg.sender_external_user_id,
                "throttled": msg.throttled,
                "timestampMs": msg.timestamp_ms,
                "topic": msg.topic,
            }),
            MeetingEvent::Error(err) => Value::String(err.as_wire_str().to_string()),
        };
        WireEvent {
            name: self.name(),
            payload,
        }
    }
}
