use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;

use crate::commands::CommandDispatcher;
use crate::errors::MeetError;
use crate::events::{EventEmitter, MeetingEventListener, SubscriptionId};
use crate::native::{SessionFactory, SessionStartParams, TileId, ViewHandle};
use crate::protocol::{EventName, MeetingEvent};
use crate::settings::Settings;
use crate::state::{Alert, MeetingPhase, MeetingState, MeetingStateMachine, Reaction, RosterEntry};
use crate::translator::{DeviceHook, SessionEventSink, SessionGeneration};

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Folds every translated event into the state machine, then forwards it
/// to UI listeners and carries out the fold's reaction.
struct StateListener {
    machine: Shared<MeetingStateMachine>,
    dispatcher: CommandDispatcher,
    alerts: Shared<VecDeque<Alert>>,
    ui: EventEmitter,
}

impl StateListener {
    /// `generation` is `None` for failures the dispatcher reports itself.
    fn fold(&self, generation: Option<SessionGeneration>, event: MeetingEvent) {
        let reaction = {
            let mut machine = lock(&self.machine);
            // Checked under the machine lock so a restart cannot slip in between.
            if generation.is_some_and(|g| !self.dispatcher.is_current(g)) {
                tracing::debug!("dropping {} from replaced session", event.name());
                return;
            }
            machine.apply(&event)
        };
        self.ui.emit(event);

        match reaction {
            Some(Reaction::Echo {
                topic,
                message,
                lifetime_ms,
            }) => self.dispatcher.send_data_message(&topic, &message, lifetime_ms),
            Some(Reaction::Alert(alert)) => lock(&self.alerts).push_back(alert),
            Some(Reaction::Teardown) => match generation {
                Some(g) => self.dispatcher.release_session(g),
                None => self.dispatcher.release(),
            },
            None => {}
        }
    }
}

impl MeetingEventListener for StateListener {
    fn on_event(&self, event: MeetingEvent) {
        self.fold(None, event);
    }
}

impl SessionEventSink for Weak<StateListener> {
    fn deliver(&self, generation: SessionGeneration, event: MeetingEvent) {
        if let Some(listener) = self.upgrade() {
            listener.fold(Some(generation), event);
        }
    }
}

/// One meeting screen: commands go down to the SDK, events come back up
/// through the state machine to subscribed listeners.
pub struct MeetingBridge {
    internal: EventEmitter,
    ui: EventEmitter,
    machine: Shared<MeetingStateMachine>,
    dispatcher: CommandDispatcher,
    alerts: Shared<VecDeque<Alert>>,
}

impl MeetingBridge {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        settings: &Settings,
        runtime: Handle,
        device_hook: Option<DeviceHook>,
    ) -> Self {
        let internal = EventEmitter::new();
        let ui = EventEmitter::new();

        let mut machine = MeetingStateMachine::new(settings.tiles_per_page());
        if settings.echo_data_messages {
            machine = machine.with_echo(settings.echo_lifetime_ms);
        }
        let machine = Arc::new(Mutex::new(machine));
        let alerts = Arc::new(Mutex::new(VecDeque::new()));

        let listener = Arc::new_cyclic(|weak: &Weak<StateListener>| StateListener {
            machine: machine.clone(),
            dispatcher: CommandDispatcher::new(
                factory,
                internal.clone(),
                settings.data_topics.clone(),
                runtime,
                device_hook,
            )
            .with_session_sink(Arc::new(weak.clone())),
            alerts: alerts.clone(),
            ui: ui.clone(),
        });
        let dispatcher = listener.dispatcher.clone();
        internal.add_listener(listener);

        Self {
            internal,
            ui,
            machine,
            dispatcher,
            alerts,
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Register a listener for every event.
    pub fn add_listener(&self, listener: Arc<dyn MeetingEventListener>) -> SubscriptionId {
        self.ui.add_listener(listener)
    }

    pub fn subscribe(&self, name: EventName, listener: Arc<dyn MeetingEventListener>) -> SubscriptionId {
        self.ui.subscribe(name, listener)
    }

    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.ui.remove(id)
    }

    /// Drop every UI listener. State keeps tracking the session.
    pub fn remove_all_listeners(&self) {
        self.ui.remove_all_listeners();
    }

    pub fn start_meeting(&self, params: SessionStartParams) {
        let generation = {
            let mut machine = lock(&self.machine);
            machine.begin_joining();
            self.dispatcher.next_generation()
        };
        if let Err(e) = self.dispatcher.try_start_session(generation, params) {
            lock(&self.machine).abort_joining();
            self.dispatcher.report(&e);
        }
    }

    pub fn stop_meeting(&self) {
        self.dispatcher.stop();
    }

    pub fn set_mute(&self, mute: bool) {
        self.dispatcher.set_mute(mute);
    }

    pub fn set_camera_on(&self, enabled: bool) {
        self.dispatcher.set_camera_on(enabled);
    }

    pub fn bind_view(&self, view: ViewHandle, tile_id: TileId) {
        self.dispatcher.bind_view(view, tile_id);
    }

    pub fn unbind_view(&self, tile_id: TileId) {
        self.dispatcher.unbind_view(tile_id);
    }

    pub fn send_data_message(&self, topic: &str, data: &str, lifetime_ms: i32) {
        self.dispatcher.send_data_message(topic, data, lifetime_ms);
    }

    /// The join request failed before any session existed.
    pub fn report_join_failure(&self, error: &MeetError) {
        tracing::error!("join failed: {error}");
        lock(&self.machine).abort_joining();
        lock(&self.alerts).push_back(Alert::meeting_not_found(&error.bridge_message()));
    }

    pub fn phase(&self) -> MeetingPhase {
        lock(&self.machine).phase()
    }

    pub fn snapshot(&self) -> MeetingState {
        lock(&self.machine).state().clone()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        lock(&self.machine).roster()
    }

    pub fn display_name(&self, attendee_id: &str) -> String {
        lock(&self.machine).names().display_name(attendee_id).to_string()
    }

    pub fn is_muted(&self, attendee_id: &str) -> bool {
        lock(&self.machine).is_muted(attendee_id)
    }

    pub fn self_video_enabled(&self) -> bool {
        lock(&self.machine).self_video_enabled()
    }

    pub fn visible_tiles(&self) -> Vec<TileId> {
        lock(&self.machine).visible_tiles()
    }

    pub fn next_page(&self) -> bool {
        lock(&self.machine).next_page()
    }

    pub fn prev_page(&self) -> bool {
        lock(&self.machine).prev_page()
    }

    /// 1-based page number and page count, e.g. `(1, 3)`.
    pub fn page_label(&self) -> (usize, usize) {
        let machine = lock(&self.machine);
        let pager = machine.pager();
        (pager.page_label(), pager.total_pages(machine.state().video_tiles.len()))
    }

    /// Alerts raised since the last call, oldest first.
    pub fn take_alerts(&self) -> Vec<Alert> {
        lock(&self.alerts).drain(..).collect()
    }
}

impl Drop for MeetingBridge {
    fn drop(&mut self) {
        self.ui.remove_all_listeners();
        self.dispatcher.release();
        // The state listener holds a dispatcher that holds this emitter.
        self.internal.remove_all_listeners();
    }
}
