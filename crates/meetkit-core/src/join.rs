//! Meeting-metadata exchange.
//!
//! The request itself is issued by the host application; this module builds
//! its URL and turns the response body into [`SessionStartParams`].

use serde::Deserialize;

use crate::errors::MeetError;
use crate::native::{MediaPlacement, SessionStartParams};

/// Response body of the join endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JoinResponse {
    join_info: JoinInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JoinInfo {
    meeting: MeetingEnvelope,
    attendee: AttendeeEnvelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MeetingEnvelope {
    meeting: MeetingDescriptor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttendeeEnvelope {
    attendee: AttendeeDescriptor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct MeetingDescriptor {
    meeting_id: String,
    media_placement: Option<PlacementDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PlacementDescriptor {
    audio_fallback_url: String,
    audio_host_url: String,
    turn_control_url: String,
    signaling_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct AttendeeDescriptor {
    attendee_id: String,
    external_user_id: String,
    join_token: String,
}

/// Parameters of one join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub title: String,
    pub name: String,
    pub region: String,
}

impl JoinRequest {
    /// Title and name are trimmed and must not be empty.
    pub fn new(title: &str, name: &str, region: &str) -> Result<Self, MeetError> {
        let title = title.trim();
        let name = name.trim();
        if title.is_empty() || name.is_empty() {
            return Err(MeetError::InvalidCommand(
                "Meeting name and user name can not be empty".to_string(),
            ));
        }
        Ok(Self {
            title: title.to_string(),
            name: name.to_string(),
            region: region.trim().to_string(),
        })
    }

    /// `POST` target: `<server>/join?title=..&name=..&region=..`.
    pub fn url(&self, server_url: &str) -> Result<String, MeetError> {
        let server = server_url.trim().trim_end_matches('/');
        if server.is_empty() {
            return Err(MeetError::Config("meeting server URL is not configured".to_string()));
        }
        Ok(format!(
            "{server}/join?title={}&name={}&region={}",
            urlencoding::encode(&self.title),
            urlencoding::encode(&self.name),
            urlencoding::encode(&self.region),
        ))
    }
}

/// Extract session-start parameters from a join response body.
///
/// Missing string fields become empty strings; a missing envelope is an error.
pub fn parse_join_info(body: &str) -> Result<SessionStartParams, MeetError> {
    let data: JoinResponse =
        serde_json::from_str(body).map_err(|e| MeetError::JoinInfo(format!("invalid join response: {e}")))?;

    let meeting = data.join_info.meeting.meeting;
    let attendee = data.join_info.attendee.attendee;
    let placement = meeting.media_placement.unwrap_or_default();

    Ok(SessionStartParams {
        meeting_id: meeting.meeting_id,
        attendee_id: attendee.attendee_id,
        join_token: attendee.join_token,
        external_user_id: attendee.external_user_id,
        media_placement: MediaPlacement {
            audio_fallback_url: placement.audio_fallback_url,
            audio_host_url: placement.audio_host_url,
            turn_control_url: placement.turn_control_url,
            signaling_url: placement.signaling_url,
        },
    })
}
