//! Per-slot mirror runtime
//!
//! Owns the axis/button state vectors and the full-state re-broadcast:
//! every accepted legacy record re-emits the whole current state, one
//! event per field, each followed by its synchronization report. That
//! is deliberately redundant: consumers always observe a complete,
//! self-consistent snapshot after each physical update.

use evdev::{uinput::VirtualDevice, EventType, InputEvent};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use tracing::warn;

use crate::evnode::EventNode;
use crate::ffbridge::FfBridge;
use crate::joydev::{JoyDevice, JsRecord};
use crate::probe::Capabilities;

/// Axis/button state vectors, updated record by record.
pub struct PadState {
    axes: Vec<i32>,
    buttons: Vec<bool>,
}

impl PadState {
    pub fn new(axis_count: usize, button_count: usize) -> Self {
        Self {
            axes: vec![0; axis_count],
            buttons: vec![false; button_count],
        }
    }

    /// Apply one record, last write wins per field. Returns true on a
    /// press transition of the primary button (index 0), which is what
    /// triggers the acknowledgment pulse.
    pub fn apply(&mut self, record: &JsRecord) -> bool {
        match *record {
            JsRecord::Axis { index, value } => {
                match self.axes.get_mut(usize::from(index)) {
                    Some(slot) => *slot = i32::from(value),
                    None => warn!("axis index {} out of range", index),
                }
                false
            }
            JsRecord::Button { index, pressed } => {
                match self.buttons.get_mut(usize::from(index)) {
                    Some(slot) => {
                        let rising = index == 0 && pressed && !*slot;
                        *slot = pressed;
                        rising
                    }
                    None => {
                        warn!("button index {} out of range", index);
                        false
                    }
                }
            }
        }
    }

    pub fn axes(&self) -> &[i32] {
        &self.axes
    }

    pub fn buttons(&self) -> &[bool] {
        &self.buttons
    }
}

/// Everything a live slot owns. Dropping it destroys the mirror
/// device, removes resident effects, restores both physical nodes'
/// original permissions and closes them, in that order.
pub struct ActiveMirror {
    key: String,
    caps: Capabilities,
    state: PadState,
    mirror: VirtualDevice,
    bridge: FfBridge,
    joy: JoyDevice,
    node: EventNode,
}

impl ActiveMirror {
    pub fn new(
        key: String,
        joy: JoyDevice,
        node: EventNode,
        mirror: VirtualDevice,
        caps: Capabilities,
    ) -> Self {
        let state = PadState::new(caps.axis_count(), caps.button_count());
        Self {
            key,
            caps,
            state,
            mirror,
            bridge: FfBridge::new(),
            joy,
            node,
        }
    }

    pub fn pairing_key(&self) -> &str {
        &self.key
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn legacy_path(&self) -> &Path {
        self.joy.path()
    }

    pub fn joy_fd(&self) -> RawFd {
        self.joy.as_raw_fd()
    }

    pub fn mirror_fd(&self) -> RawFd {
        self.mirror.as_raw_fd()
    }

    /// One legacy-node readiness wake: read a record, fold it into the
    /// state vectors, re-broadcast the full snapshot, and fire the
    /// pulse on a primary-button press.
    pub fn handle_legacy_ready(&mut self) {
        let record = match self.joy.read_record() {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!("read from {} failed: {}", self.joy.path().display(), e);
                return;
            }
        };

        let fire = self.state.apply(&record);
        self.broadcast();
        if fire {
            self.bridge.fire_pulse(&mut self.node);
        }
    }

    /// Emit the entire state vector, one event per axis and button,
    /// each with its own synchronization report.
    fn broadcast(&mut self) {
        for (index, &value) in self.state.axes().iter().enumerate() {
            let Some(&code) = self.caps.axis_codes.get(index) else {
                break;
            };
            let event = InputEvent::new(EventType::ABSOLUTE, code, value);
            if let Err(e) = self.mirror.emit(&[event]) {
                warn!("mirror emit failed: {}", e);
            }
        }
        for (index, &pressed) in self.state.buttons().iter().enumerate() {
            let Some(&code) = self.caps.button_codes.get(index) else {
                break;
            };
            let event = InputEvent::new(EventType::KEY, code, i32::from(pressed));
            if let Err(e) = self.mirror.emit(&[event]) {
                warn!("mirror emit failed: {}", e);
            }
        }
    }

    /// One mirror readiness wake: drain pending force-feedback
    /// requests and hand each to the bridge.
    pub fn handle_mirror_ready(&mut self) {
        let events: Vec<_> = match self.mirror.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) => {
                warn!("mirror read failed: {}", e);
                return;
            }
        };

        for event in events {
            self.bridge.handle(&mut self.mirror, &mut self.node, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_last_write_wins() {
        let mut state = PadState::new(2, 2);
        let records = [
            JsRecord::Axis { index: 0, value: 100 },
            JsRecord::Button { index: 1, pressed: true },
            JsRecord::Axis { index: 0, value: -200 },
            JsRecord::Axis { index: 1, value: 50 },
            JsRecord::Button { index: 1, pressed: false },
        ];
        for record in &records {
            state.apply(record);
        }

        // Cumulative result of applying each record in arrival order.
        assert_eq!(state.axes(), &[-200, 50]);
        assert_eq!(state.buttons(), &[false, false]);
    }

    #[test]
    fn test_primary_button_press_edge() {
        let mut state = PadState::new(0, 2);

        assert!(state.apply(&JsRecord::Button { index: 0, pressed: true }));
        // Held, not a new press.
        assert!(!state.apply(&JsRecord::Button { index: 0, pressed: true }));
        assert!(!state.apply(&JsRecord::Button { index: 0, pressed: false }));
        // Pressed again after release.
        assert!(state.apply(&JsRecord::Button { index: 0, pressed: true }));
    }

    #[test]
    fn test_other_buttons_never_trigger_pulse() {
        let mut state = PadState::new(0, 3);
        assert!(!state.apply(&JsRecord::Button { index: 1, pressed: true }));
        assert!(!state.apply(&JsRecord::Button { index: 2, pressed: true }));
    }

    #[test]
    fn test_out_of_range_indices_ignored() {
        let mut state = PadState::new(1, 1);
        assert!(!state.apply(&JsRecord::Button { index: 5, pressed: true }));
        state.apply(&JsRecord::Axis { index: 9, value: 42 });
        assert_eq!(state.axes(), &[0]);
        assert_eq!(state.buttons(), &[false]);
    }
}
