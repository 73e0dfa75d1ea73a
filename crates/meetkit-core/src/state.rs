//! Meeting state machine.
//!
//! Folds protocol events into a [`MeetingState`] snapshot that renderers
//! read. The machine is the single owner of that state; every event is
//! applied synchronously in delivery order.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::commands::MAX_DATA_MESSAGE_BYTES;
use crate::errors::ErrorKind;
use crate::names::DisplayNameCache;
use crate::native::{AttendeeId, DataMessage, TileId, VideoTileState};
use crate::pager::VideoTilePager;
use crate::protocol::{ErrorPayload, MeetingEvent};

pub const MAX_VIDEO_ALERT_TITLE: &str = "Failed to enable video";
pub const MAX_VIDEO_ALERT_MESSAGE: &str = "maximum number of concurrent videos reached!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeetingPhase {
    NotInMeeting,
    Joining,
    InMeeting,
}

/// Renderable meeting state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeetingState {
    /// Join order minus removals. Duplicate joins are kept.
    pub attendees: Vec<AttendeeId>,
    pub muted_attendees: BTreeSet<AttendeeId>,
    /// Remote tiles in insertion order, no duplicates.
    pub video_tiles: Vec<TileId>,
    pub local_tile_id: Option<TileId>,
    pub screen_share_tile: Option<TileId>,
}

/// One row of the attendee list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub attendee_id: AttendeeId,
    pub display_name: String,
    pub muted: bool,
}

/// Blocking message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn for_error(error: &ErrorPayload) -> Self {
        match error {
            ErrorPayload::Kind(ErrorKind::MaximumConcurrentVideoReached) => Self {
                title: MAX_VIDEO_ALERT_TITLE.to_string(),
                message: MAX_VIDEO_ALERT_MESSAGE.to_string(),
            },
            ErrorPayload::Message(msg) => Self {
                title: "Error".to_string(),
                message: msg.clone(),
            },
        }
    }

    /// Shown when the meeting metadata could not be fetched.
    pub fn meeting_not_found(cause: &str) -> Self {
        Self {
            title: "Unable to find meeting".to_string(),
            message: format!(
                "There was an issue finding that meeting. The meeting may have already ended, or your authorization may have expired.\n {cause}"
            ),
        }
    }
}

/// Side effects a fold asks its owner to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Send a data message back on the topic it arrived on.
    Echo {
        topic: String,
        message: String,
        lifetime_ms: i32,
    },
    Alert(Alert),
    /// Both media channels stopped; release the native session.
    Teardown,
}

pub struct MeetingStateMachine {
    phase: MeetingPhase,
    state: MeetingState,
    /// Remote tile ids currently shown. Unbinding a remote view makes the
    /// SDK report the tile as added again; adds for ids in this set are
    /// dropped until the tile is removed.
    remote_tile_ids: HashSet<TileId>,
    names: DisplayNameCache,
    pager: VideoTilePager,
    echo_lifetime_ms: Option<i32>,
}

impl MeetingStateMachine {
    pub fn new(tiles_per_page: usize) -> Self {
        Self {
            phase: MeetingPhase::NotInMeeting,
            state: MeetingState::default(),
            remote_tile_ids: HashSet::new(),
            names: DisplayNameCache::new(),
            pager: VideoTilePager::new(tiles_per_page),
            echo_lifetime_ms: None,
        }
    }

    /// Reply to every received data message with a message of this lifetime.
    pub fn with_echo(mut self, lifetime_ms: i32) -> Self {
        self.echo_lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn phase(&self) -> MeetingPhase {
        self.phase
    }

    pub fn state(&self) -> &MeetingState {
        &self.state
    }

    pub fn names(&self) -> &DisplayNameCache {
        &self.names
    }

    pub fn pager(&self) -> &VideoTilePager {
        &self.pager
    }

    /// A start command went out; wait for MeetingStart.
    pub fn begin_joining(&mut self) {
        self.reset();
        self.phase = MeetingPhase::Joining;
    }

    /// The start command failed before any session came up.
    pub fn abort_joining(&mut self) {
        if self.phase == MeetingPhase::Joining {
            self.phase = MeetingPhase::NotInMeeting;
        }
    }

    pub fn apply(&mut self, event: &MeetingEvent) -> Option<Reaction> {
        tracing::debug!("folding {} in phase {:?}", event.name(), self.phase);
        match event {
            MeetingEvent::MeetingStart => {
                self.phase = MeetingPhase::InMeeting;
                None
            }
            MeetingEvent::MeetingEnd => {
                self.reset();
                Some(Reaction::Teardown)
            }
            MeetingEvent::AttendeeJoin(info) => {
                self.names.remember(&info.attendee_id, &info.external_user_id);
                self.state.attendees.push(info.attendee_id.clone());
                None
            }
            MeetingEvent::AttendeeLeave(attendee_id) => {
                self.state.attendees.retain(|a| a != attendee_id);
                None
            }
            MeetingEvent::AttendeeMute(attendee_id) => {
                self.state.muted_attendees.insert(attendee_id.clone());
                None
            }
            MeetingEvent::AttendeeUnmute(attendee_id) => {
                self.state.muted_attendees.remove(attendee_id);
                None
            }
            MeetingEvent::AddVideoTile(tile) => {
                self.add_tile(tile);
                None
            }
            MeetingEvent::RemoveVideoTile(tile) => {
                self.remove_tile(tile);
                None
            }
            MeetingEvent::DataMessageReceive(message) => self.echo(message),
            MeetingEvent::Error(error) => {
                tracing::warn!("meeting error: {}", error.as_wire_str());
                Some(Reaction::Alert(Alert::for_error(error)))
            }
        }
    }

    fn add_tile(&mut self, tile: &VideoTileState) {
        if tile.is_screen_share {
            self.state.screen_share_tile = Some(tile.tile_id);
        } else if tile.is_local {
            self.state.local_tile_id = Some(tile.tile_id);
        } else if self.remote_tile_ids.insert(tile.tile_id) {
            self.state.video_tiles.push(tile.tile_id);
            self.pager.on_tiles_changed(self.state.video_tiles.len());
        } else {
            tracing::debug!("discarding repeated add for remote tile {}", tile.tile_id);
        }
    }

    fn remove_tile(&mut self, tile: &VideoTileState) {
        if tile.is_screen_share {
            self.state.screen_share_tile = None;
        } else if tile.is_local {
            self.state.local_tile_id = None;
        } else {
            self.remote_tile_ids.remove(&tile.tile_id);
            self.state.video_tiles.retain(|t| *t != tile.tile_id);
            self.pager.on_tiles_changed(self.state.video_tiles.len());
        }
    }

    fn echo(&self, message: &DataMessage) -> Option<Reaction> {
        let mut text = format!(
            "Received Data message (topic: {}) {} from {}:{} at {} throttled: {}",
            message.topic,
            message.data,
            message.sender_attendee_id,
            message.sender_external_user_id,
            message.timestamp_ms,
            message.throttled
        );
        tracing::info!("{text}");
        if text.len() > MAX_DATA_MESSAGE_BYTES {
            tracing::warn!("echo of {} bytes truncated to {MAX_DATA_MESSAGE_BYTES}", text.len());
            truncate_at_char_boundary(&mut text, MAX_DATA_MESSAGE_BYTES);
        }
        self.echo_lifetime_ms.map(|lifetime_ms| Reaction::Echo {
            topic: message.topic.clone(),
            message: text,
            lifetime_ms,
        })
    }

    pub fn is_muted(&self, attendee_id: &str) -> bool {
        self.state.muted_attendees.contains(attendee_id)
    }

    pub fn self_video_enabled(&self) -> bool {
        self.state.local_tile_id.is_some()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.state
            .attendees
            .iter()
            .map(|id| RosterEntry {
                attendee_id: id.clone(),
                display_name: self.names.display_name(id).to_string(),
                muted: self.is_muted(id),
            })
            .collect()
    }

    /// Remote tiles on the current page.
    pub fn visible_tiles(&self) -> Vec<TileId> {
        self.pager.page(&self.state.video_tiles).to_vec()
    }

    pub fn next_page(&mut self) -> bool {
        self.pager.next(self.state.video_tiles.len())
    }

    pub fn prev_page(&mut self) -> bool {
        self.pager.prev()
    }

    /// Drop everything learned during the session.
    pub fn reset(&mut self) {
        self.phase = MeetingPhase::NotInMeeting;
        self.state = MeetingState::default();
        self.remote_tile_ids.clear();
        self.names.clear();
        self.pager.reset();
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
