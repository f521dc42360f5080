use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::Sender;

use crate::logging::*;

/// Session state. Variants are in priority order: everything above `Idle` is
/// an exception, and a raised exception only replaces one of lower or equal
/// priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    DataPhase,
    StatusPhase,
    Idle,
    AbortBulkOut,
    Reset,
    InterfaceChange,
    ConfigChange,
    Disconnect,
    Exit,
    Terminated,
}

impl State {
    pub fn is_exception(&self) -> bool {
        *self > State::Idle
    }
}

/// Counters the worker publishes for whoever holds the engine handle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub commands: u64,
    pub exceptions_handled: u64,
    /// True if the pool was all Empty with nothing in flight when the last
    /// exception finished resynchronizing
    pub pool_clean_after_exception: bool,
    /// Most transfer buffers ever in flight at once
    pub busy_high_water: usize,
    pub post_upgrade_actions: u64,
}

pub(crate) struct Shared {
    pub state: State,
    /// Bumped on every class control request
    pub ep0_req_tag: u32,
    /// `ep0_req_tag` as of the last raised exception
    pub exception_req_tag: u32,
    /// Configuration value carried by the pending ConfigChange; 0 is unconfigured
    pub new_config: u8,
    pub config: u8,
    pub running: bool,
    /// Set by the "upgrade successful" vendor command, taken on disconnect
    pub upgrade_latch: bool,
    pub stats: EngineStats,
}

/// Everything the control path and the worker share, behind one lock. Raising
/// an exception also rings the doorbell so a blocked worker wakes up.
pub(crate) struct Session {
    shared: Mutex<Shared>,
    doorbell: Sender<()>,
}

impl Session {
    pub fn new(doorbell: Sender<()>) -> Self {
        Session {
            shared: Mutex::new(Shared {
                state: State::Idle,
                ep0_req_tag: 0,
                exception_req_tag: 0,
                new_config: 0,
                config: 0,
                running: false,
                upgrade_latch: false,
                stats: EngineStats::default(),
            }),
            doorbell,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Shared> {
        // a panicked holder can't leave Shared half-updated in a way we care about
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn raise_exception(&self, new_state: State) {
        let mut shared = self.lock();
        Self::raise_locked(&mut shared, new_state);
        drop(shared);
        // a full doorbell already means "look at the state"
        self.doorbell.try_send(()).ok();
    }

    /// A class control request that raises `new_state`; the exception carries
    /// this request's tag so its status stage can be completed later
    pub fn raise_for_request(&self, new_state: State) {
        let mut shared = self.lock();
        shared.ep0_req_tag = shared.ep0_req_tag.wrapping_add(1);
        Self::raise_locked(&mut shared, new_state);
        drop(shared);
        self.doorbell.try_send(()).ok();
    }

    /// A class control request answered without involving the worker
    pub fn note_request(&self) {
        let mut shared = self.lock();
        shared.ep0_req_tag = shared.ep0_req_tag.wrapping_add(1);
    }

    pub fn raise_config_change(&self, config: u8) {
        let mut shared = self.lock();
        shared.new_config = config;
        Self::raise_locked(&mut shared, State::ConfigChange);
        drop(shared);
        self.doorbell.try_send(()).ok();
    }

    fn raise_locked(shared: &mut Shared, new_state: State) {
        if shared.state <= new_state {
            trace_exception!("EXCEPTION> raise {:?} over {:?}", new_state, shared.state);
            shared.exception_req_tag = shared.ep0_req_tag;
            shared.state = new_state;
        } else {
            trace_exception!("EXCEPTION> {:?} outranked by {:?}", new_state, shared.state);
        }
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    pub fn exception_pending(&self) -> bool {
        self.lock().state.is_exception()
    }

    /// Move between the normal phases unless an exception got there first
    pub fn set_phase(&self, phase: State) {
        let mut shared = self.lock();
        if !shared.state.is_exception() && shared.state != phase {
            trace_bot_states!("STATE> {:?} -> {:?}", shared.state, phase);
            shared.state = phase;
        }
    }

    pub fn running(&self) -> bool {
        self.lock().running
    }
}
