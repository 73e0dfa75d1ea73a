//! Meeting bridge core.
//!
//! Translates callbacks of a native meeting SDK into a small set of named
//! events, folds them into renderable meeting state and forwards UI commands
//! back to the SDK. Pure Rust, consumed by native shells via UniFFI bindings.

pub mod bridge;
pub mod commands;
pub mod errors;
pub mod events;
pub mod join;
pub mod names;
pub mod native;
pub mod pager;
pub mod protocol;
pub mod settings;
pub mod state;
pub mod translator;

pub use bridge::MeetingBridge;
pub use commands::CommandDispatcher;
pub use errors::{ErrorKind, MeetError};
pub use events::{EventEmitter, MeetingEventListener, SubscriptionId};
pub use join::{JoinRequest, parse_join_info};
pub use native::{
    AttendeeInfo, DataMessage, MediaDevice, MediaDeviceKind, MediaPlacement, NativeCallback, NativeSession,
    PauseState, SessionFactory, SessionObserver, SessionStartParams, SessionStatusCode, VideoTileState,
};
pub use pager::VideoTilePager;
pub use protocol::{ErrorPayload, EventName, MeetingEvent, WireEvent};
pub use settings::{Settings, SettingsStore};
pub use state::{Alert, MeetingPhase, MeetingState, MeetingStateMachine, RosterEntry};
