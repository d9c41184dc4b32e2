//! Pairing and capability flow over the pure pieces: discovery
//! classification → registry pairing → capability assembly → state
//! mirroring, without touching real devices.

use std::path::Path;

use evdev::{AbsInfo, Key};

use padmirror::hotplug::classify_node;
use padmirror::joydev::{parse_record, JsRecord, RECORD_SIZE};
use padmirror::mirror::PadState;
use padmirror::{Capabilities, NodeKind, Observation, Registry};

fn record(value: i16, kind: u8, number: u8) -> [u8; RECORD_SIZE] {
    let mut raw = [0u8; RECORD_SIZE];
    raw[4..6].copy_from_slice(&value.to_le_bytes());
    raw[6] = kind;
    raw[7] = number;
    raw
}

/// A controller attaching surfaces as two discovery events that must
/// collapse into one slot regardless of arrival order, and the
/// assembled capabilities must reuse the legacy interface's exact code
/// numbering.
#[test]
fn test_attach_pairs_and_assembles_capabilities() {
    let js_path = Path::new("/dev/input/js0");
    let event_path = Path::new("/dev/input/event4");

    assert_eq!(classify_node(js_path), Some(NodeKind::Legacy));
    assert_eq!(classify_node(event_path), Some(NodeKind::Raw));

    let mut registry: Registry<Capabilities> = Registry::new();

    // Raw node first, legacy second: still exactly one slot.
    assert_eq!(
        registry.observe(NodeKind::Raw, event_path, "pci-0000:00:14.0-usb-0:2"),
        Observation::Incomplete
    );
    let observation = registry.observe(NodeKind::Legacy, js_path, "pci-0000:00:14.0-usb-0:2");
    let Observation::Complete { slot, legacy, raw } = observation else {
        panic!("expected pair completion, got {:?}", observation);
    };
    assert_eq!(slot, 0);
    assert_eq!(legacy, js_path);
    assert_eq!(raw, event_path);

    // 2 buttons / 4 axes, as probed from the paired nodes.
    let info = AbsInfo::new(0, -32767, 32767, 16, 128, 0);
    let caps = Capabilities::assemble(
        4,
        &[0, 1, 3, 4],
        2,
        &[0x130, 0x131],
        &[0x130, 0x131],
        &[(0, info), (1, info), (3, info), (4, info)],
        &[0x50],
        16,
    );
    assert_eq!(caps.axis_count(), 4);
    assert_eq!(caps.button_count(), 2);
    assert_eq!(caps.button_codes, vec![0x130, 0x131]);
    assert_eq!(caps.advertised_keys, vec![Key::new(0x130), Key::new(0x131)]);
    assert_eq!(caps.ff_effects_max, 16);

    registry.activate(slot, legacy, caps);
    assert_eq!(registry.active_count(), 1);
}

/// The mirrored state after a run of legacy records equals the
/// cumulative, last-write-wins result of applying them in order, and
/// the primary-button press is flagged exactly on its rising edge.
#[test]
fn test_record_stream_mirrors_cumulatively() {
    let mut state = PadState::new(4, 2);
    let stream = [
        record(-300, 0x02, 0),
        record(1, 0x01, 0),
        record(7000, 0x02, 2),
        record(1, 0x01, 1),
        record(-300, 0x02, 0),
        record(0, 0x01, 1),
    ];

    let mut pulses = 0;
    for raw in &stream {
        let rec = parse_record(raw).expect("well-formed record");
        if state.apply(&rec) {
            pulses += 1;
        }
    }

    assert_eq!(state.axes(), &[-300, 0, 7000, 0]);
    assert_eq!(state.buttons(), &[true, false]);
    // One press transition of button 0, no repeat while held.
    assert_eq!(pulses, 1);
}

/// Detach clears the slot; the pairing key becomes reusable without
/// disturbing other slots.
#[test]
fn test_detach_frees_slot_for_reuse() {
    let mut registry: Registry<()> = Registry::new();

    for n in 0..3 {
        let key = format!("platform-usb-{}", n);
        let js = format!("/dev/input/js{}", n);
        let event = format!("/dev/input/event{}", n + 4);
        registry.observe(NodeKind::Legacy, Path::new(&js), &key);
        match registry.observe(NodeKind::Raw, Path::new(&event), &key) {
            Observation::Complete { slot, legacy, .. } => registry.activate(slot, legacy, ()),
            other => panic!("expected completion, got {:?}", other),
        }
    }
    assert_eq!(registry.active_count(), 3);

    // Teardown of js1: exactly once, second take is a no-op.
    let (slot, active) = registry.find_legacy(Path::new("/dev/input/js1")).unwrap();
    assert!(active);
    assert!(registry.take_active(slot).is_some());
    assert!(registry.take_active(slot).is_none());
    assert_eq!(registry.active_count(), 2);

    // The freed slot takes the next controller.
    registry.observe(NodeKind::Legacy, Path::new("/dev/input/js9"), "platform-usb-9");
    assert!(matches!(
        registry.observe(NodeKind::Raw, Path::new("/dev/input/event9"), "platform-usb-9"),
        Observation::Complete { .. }
    ));
}
