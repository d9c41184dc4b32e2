//! Discovery bus
//!
//! udev is the source of truth for controller attach/detach: a monitor
//! subscription filtered to the input subsystem, plus a one-shot
//! enumeration at startup so already-attached controllers flow through
//! the same pairing path as hotplugged ones.

use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::MirrorError;
use crate::registry::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugAction {
    Add,
    Remove,
}

/// One decoded discovery-bus notification.
#[derive(Debug, Clone)]
pub struct HotplugEvent {
    pub action: HotplugAction,
    pub kind: NodeKind,
    pub path: PathBuf,
    /// Topological pairing key (`ID_PATH`). Absent on nodes the
    /// registry cannot pair.
    pub key: Option<String>,
}

/// Classify a device node path into the pair half it represents.
pub fn classify_node(path: &Path) -> Option<NodeKind> {
    let name = path.file_name()?.to_str()?;
    if path.parent() != Some(Path::new("/dev/input")) {
        return None;
    }
    if name.starts_with("js") {
        Some(NodeKind::Legacy)
    } else if name.starts_with("event") {
        Some(NodeKind::Raw)
    } else {
        None
    }
}

/// Game-controller filter: the joystick property must be set and the
/// topological path must not be virtual. The mirrors themselves are
/// virtual devices and must never be re-mirrored.
fn is_mirror_candidate(device: &udev::Device) -> bool {
    device.property_value("ID_INPUT_JOYSTICK").is_some()
        && !device.devpath().to_string_lossy().contains("virtual")
}

fn pairing_key(device: &udev::Device) -> Option<String> {
    device
        .property_value("ID_PATH")
        .map(|v| v.to_string_lossy().into_owned())
}

/// The hotplug monitor half of the bus.
pub struct DiscoveryBus {
    socket: udev::MonitorSocket,
}

impl DiscoveryBus {
    pub fn open() -> Result<Self, MirrorError> {
        let socket = udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_subsystem("input"))
            .and_then(|builder| builder.listen())
            .map_err(MirrorError::Discovery)?;

        // Non-blocking so one readiness wake can drain every queued
        // notification.
        unsafe {
            let fd = socket.as_raw_fd();
            let flags = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }

        Ok(Self { socket })
    }

    /// Drain and decode every pending notification.
    pub fn drain(&mut self) -> Vec<HotplugEvent> {
        let mut events = Vec::new();
        for event in self.socket.iter() {
            let action = match event.event_type() {
                udev::EventType::Add => HotplugAction::Add,
                udev::EventType::Remove => HotplugAction::Remove,
                _ => continue,
            };
            if !is_mirror_candidate(&event) {
                continue;
            }
            let Some(devnode) = event.devnode() else {
                continue;
            };
            let Some(kind) = classify_node(devnode) else {
                continue;
            };

            debug!(
                "controller hotplug: {:?} {:?} {} (model {:?} {:?})",
                action,
                kind,
                devnode.display(),
                event.property_value("ID_VENDOR_ID"),
                event.property_value("ID_MODEL_ID"),
            );

            events.push(HotplugEvent {
                action,
                kind,
                path: devnode.to_path_buf(),
                key: pairing_key(&event),
            });
        }
        events
    }
}

impl AsRawFd for DiscoveryBus {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// One-shot enumeration of controllers attached before startup. Each
/// hit is shaped like an add notification so attach order and
/// pre-attachment are indistinguishable downstream.
pub fn enumerate_controllers() -> Result<Vec<HotplugEvent>, MirrorError> {
    let mut enumerator = udev::Enumerator::new().map_err(MirrorError::Discovery)?;
    enumerator
        .match_property("ID_INPUT_JOYSTICK", "1")
        .map_err(MirrorError::Discovery)?;

    let mut events = Vec::new();
    for device in enumerator.scan_devices().map_err(MirrorError::Discovery)? {
        if !is_mirror_candidate(&device) {
            continue;
        }
        let Some(devnode) = device.devnode() else {
            continue;
        };
        let Some(kind) = classify_node(devnode) else {
            continue;
        };

        debug!(
            "controller present at startup: {:?} {} (model {:?})",
            kind,
            devnode.display(),
            device.property_value("ID_MODEL"),
        );

        events.push(HotplugEvent {
            action: HotplugAction::Add,
            kind,
            path: devnode.to_path_buf(),
            key: pairing_key(&device),
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_legacy_node() {
        assert_eq!(
            classify_node(Path::new("/dev/input/js0")),
            Some(NodeKind::Legacy)
        );
    }

    #[test]
    fn test_classify_raw_node() {
        assert_eq!(
            classify_node(Path::new("/dev/input/event17")),
            Some(NodeKind::Raw)
        );
    }

    #[test]
    fn test_classify_rejects_other_nodes() {
        assert_eq!(classify_node(Path::new("/dev/input/mouse0")), None);
        assert_eq!(classify_node(Path::new("/dev/input/mice")), None);
        assert_eq!(classify_node(Path::new("/dev/js0")), None);
        assert_eq!(classify_node(Path::new("/tmp/event3")), None);
    }
}
