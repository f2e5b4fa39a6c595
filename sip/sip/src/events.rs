use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Externally observable call state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Initializing,
    Dialing,
    Ringing,
    Answered,
    Ended,
    Busy,
    Failed,
}

impl CallState {
    /// Terminal states are never left again
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Ended | CallState::Busy | CallState::Failed)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallState::Initializing => "INITIALIZING",
            CallState::Dialing => "DIALING",
            CallState::Ringing => "RINGING",
            CallState::Answered => "ANSWERED",
            CallState::Ended => "ENDED",
            CallState::Busy => "BUSY",
            CallState::Failed => "FAILED",
        };

        f.write_str(s)
    }
}

type StateCallback = Box<dyn Fn(CallState) + Send + Sync>;
type HangupCallback = Box<dyn Fn(&str) + Send + Sync>;
type DtmfCallback = Box<dyn Fn(char) + Send + Sync>;
type FrameCallback = Box<dyn Fn(&[u8]) + Send + Sync>;
type AmdCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Registered user callbacks, one closed list per event kind.
///
/// Callbacks are invoked in registration order. The hang-up event fires at
/// most once for the lifetime of a call, regardless of how often teardown
/// is attempted.
#[derive(Default)]
pub(crate) struct CallEvents {
    state_changed: Mutex<Vec<StateCallback>>,
    hanged_up: Mutex<Vec<HangupCallback>>,
    dtmf: Mutex<Vec<DtmfCallback>>,
    frame: Mutex<Vec<FrameCallback>>,
    amd: Mutex<Vec<AmdCallback>>,

    hangup_fired: AtomicBool,
}

impl CallEvents {
    pub(crate) fn on_state_changed(&self, cb: StateCallback) {
        self.state_changed.lock().push(cb);
    }

    pub(crate) fn on_hanged_up(&self, cb: HangupCallback) {
        self.hanged_up.lock().push(cb);
    }

    pub(crate) fn on_dtmf(&self, cb: DtmfCallback) {
        self.dtmf.lock().push(cb);
    }

    pub(crate) fn on_frame(&self, cb: FrameCallback) {
        self.frame.lock().push(cb);
    }

    pub(crate) fn on_amd(&self, cb: AmdCallback) {
        self.amd.lock().push(cb);
    }

    pub(crate) fn emit_state(&self, state: CallState) {
        for cb in self.state_changed.lock().iter() {
            cb(state);
        }
    }

    /// Fires the hang-up callbacks exactly once, later calls are ignored
    pub(crate) fn emit_hangup(&self, reason: &str) -> bool {
        if self.hangup_fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        for cb in self.hanged_up.lock().iter() {
            cb(reason);
        }

        true
    }

    pub(crate) fn emit_dtmf(&self, key: char) {
        for cb in self.dtmf.lock().iter() {
            cb(key);
        }
    }

    pub(crate) fn emit_frame(&self, frame: &[u8]) {
        for cb in self.frame.lock().iter() {
            cb(frame);
        }
    }

    pub(crate) fn emit_amd(&self, state: &str) {
        for cb in self.amd.lock().iter() {
            cb(state);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn hangup_fires_once() {
        let events = CallEvents::default();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        events.on_hanged_up(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(events.emit_hangup("normal"));
        assert!(!events.emit_hangup("again"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let events = CallEvents::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            events.on_state_changed(Box::new(move |_| order.lock().push(i)));
        }

        events.emit_state(CallState::Dialing);

        assert_eq!(*order.lock(), [0, 1, 2]);
    }
}
