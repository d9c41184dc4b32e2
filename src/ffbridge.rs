//! Force-feedback bridge
//!
//! Effects are driven from the mirror side and realized on the
//! physical device. Upload and erase requests arrive as uinput control
//! messages and are answered through the same handshake; play, stop
//! and gain events are written through verbatim. Physical-node
//! failures along the way are logged and swallowed; the mirror's
//! request is still answered with success.

use std::collections::HashMap;

use evdev::{
    uinput::{UInputEvent, VirtualDevice},
    EvdevEnum, EventType, FFEffect, FFEffectData, FFEffectKind, FFEffectType, FFReplay, FFTrigger,
    InputEvent, InputEventKind, UInputEventType,
};
use tracing::{debug, warn};

use crate::evnode::EventNode;

/// Fixed acknowledgment pulse fired on primary-button press.
const PULSE_STRONG_MAGNITUDE: u16 = 0x8000;
const PULSE_LENGTH_MS: u16 = 500;

/// Per-slot effect bookkeeping. Dropping an effect handle removes the
/// effect from the physical device.
pub struct FfBridge {
    /// Physical effects resident on behalf of the mirror, keyed by the
    /// identifier reported back to the mirror.
    effects: HashMap<i16, FFEffect>,
    /// The auto-generated rumble pulse, one at a time.
    pulse: Option<FFEffect>,
}

impl FfBridge {
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
            pulse: None,
        }
    }

    /// Dispatch one event read from the mirror device.
    pub fn handle(&mut self, mirror: &mut VirtualDevice, node: &mut EventNode, event: UInputEvent) {
        match event.kind() {
            InputEventKind::UInput(code) => match UInputEventType::from_index(code as usize) {
                UInputEventType::UI_FF_UPLOAD => self.upload(mirror, node, event),
                UInputEventType::UI_FF_ERASE => self.erase(mirror, node, event),
                other => debug!("unhandled uinput control event {:?}", other),
            },
            InputEventKind::ForceFeedback(code) => self.forward(node, code, event),
            kind => debug!("unhandled mirror event {:?}", kind),
        }
    }

    /// Realize an uploaded effect on the physical device and answer
    /// the handshake. Any effect previously resident under the
    /// requested identifier is dropped first, best-effort.
    fn upload(&mut self, mirror: &mut VirtualDevice, node: &mut EventNode, event: UInputEvent) {
        let mut request = match mirror.process_ff_upload(event) {
            Ok(request) => request,
            Err(e) => {
                warn!("force-feedback upload handshake failed: {}", e);
                return;
            }
        };

        let requested = request.effect_id();
        if self.effects.remove(&requested).is_some() {
            debug!("replaced resident effect {}", requested);
        }

        match node.upload_effect(request.effect()) {
            Ok(effect) => {
                let id = effect.id() as i16;
                debug!("installed effect {} on {}", id, node.path().display());
                self.effects.insert(id, effect);
                request.set_effect_id(id);
            }
            Err(e) => {
                // Swallowed: the mirror is still answered with success.
                warn!("effect upload to {} failed: {}", node.path().display(), e);
            }
        }
        request.set_retval(0);
    }

    /// Remove an effect. Erase is idempotent: unknown identifiers and
    /// physical failures still answer success.
    fn erase(&mut self, mirror: &mut VirtualDevice, node: &mut EventNode, event: UInputEvent) {
        let mut request = match mirror.process_ff_erase(event) {
            Ok(request) => request,
            Err(e) => {
                warn!("force-feedback erase handshake failed: {}", e);
                return;
            }
        };

        let id = request.effect_id() as i16;
        if self.effects.remove(&id).is_some() {
            debug!("erased effect {} from {}", id, node.path().display());
        }
        request.set_retval(0);
    }

    /// Write a play/stop/gain event through to the physical device.
    fn forward(&mut self, node: &mut EventNode, code: u16, event: UInputEvent) {
        if code == FFEffectType::FF_GAIN.0 {
            let percent = event.value() * 100 / 0xffff;
            debug!("setting force-feedback gain to {}%", percent);
        } else if event.value() != 0 {
            debug!(
                "playing effect {} on {}",
                code,
                node.path().display()
            );
        }

        let passthrough = InputEvent::new(EventType::FORCEFEEDBACK, event.code(), event.value());
        if let Err(e) = node.send(passthrough) {
            warn!("force-feedback write to {} failed: {}", node.path().display(), e);
        }
    }

    /// Install and play the fixed rumble pulse, replacing the previous
    /// one. Fired on each primary-button press as tactile
    /// acknowledgment.
    pub fn fire_pulse(&mut self, node: &mut EventNode) {
        self.pulse = None;

        let data = FFEffectData {
            direction: 0,
            trigger: FFTrigger {
                button: 0,
                interval: 0,
            },
            replay: FFReplay {
                length: PULSE_LENGTH_MS,
                delay: 0,
            },
            kind: FFEffectKind::Rumble {
                strong_magnitude: PULSE_STRONG_MAGNITUDE,
                weak_magnitude: 0,
            },
        };

        match node.upload_effect(data) {
            Ok(mut effect) => {
                if let Err(e) = effect.play(1) {
                    warn!("rumble pulse play on {} failed: {}", node.path().display(), e);
                }
                self.pulse = Some(effect);
            }
            Err(e) => {
                warn!("rumble pulse upload to {} failed: {}", node.path().display(), e);
            }
        }
    }
}

impl Default for FfBridge {
    fn default() -> Self {
        Self::new()
    }
}
