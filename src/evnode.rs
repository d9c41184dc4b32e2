//! Raw event node (`/dev/input/event*`)
//!
//! The raw interface is where capability bitmasks live and where force
//! feedback is realized. The `evdev` crate queries the supported-code
//! bitmasks eagerly when the device is opened; the effect-capacity
//! query is the one control call it does not cover.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use evdev::{Device, FFEffect, FFEffectData, InputEvent};
use nix::ioctl_read;

use crate::access::{self, OriginalMode, RW_NARROW, RW_WIDEN};
use crate::error::MirrorError;

ioctl_read!(ev_get_effect_capacity, b'E', 0x84, libc::c_int);

/// An open raw event node, access-restricted while the handle exists.
/// Dropping it restores the original mode bits.
pub struct EventNode {
    device: Device,
    path: PathBuf,
    orig_mode: OriginalMode,
}

impl EventNode {
    pub fn open(path: &Path) -> Result<Self, MirrorError> {
        let (device, orig_mode) = access::open_restricted(path, RW_WIDEN, RW_NARROW, Device::open)
            .map_err(|source| MirrorError::NodeOpen {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            device,
            path: path.to_path_buf(),
            orig_mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw key codes the node reports as supported.
    pub fn key_codes(&self) -> Vec<u16> {
        self.device
            .supported_keys()
            .map(|set| set.iter().map(|key| key.code()).collect())
            .unwrap_or_default()
    }

    /// Raw absolute-axis codes the node reports as supported.
    pub fn abs_codes(&self) -> Vec<u16> {
        self.device
            .supported_absolute_axes()
            .map(|set| set.iter().map(|axis| axis.0).collect())
            .unwrap_or_default()
    }

    /// Supported force-feedback effect kinds.
    pub fn ff_codes(&self) -> Vec<u16> {
        self.device
            .supported_ff()
            .map(|set| set.iter().map(|kind| kind.0).collect())
            .unwrap_or_default()
    }

    /// Per-code axis range state, indexed by absolute-axis code.
    pub fn abs_ranges(&self) -> Result<[libc::input_absinfo; 64], MirrorError> {
        self.device
            .get_abs_state()
            .map_err(|source| MirrorError::FeatureQuery {
                path: self.path.clone(),
                source,
            })
    }

    /// Maximum number of concurrently resident effects.
    pub fn effect_capacity(&self) -> Result<u32, MirrorError> {
        let mut count: libc::c_int = 0;
        unsafe { ev_get_effect_capacity(self.device.as_raw_fd(), &mut count) }.map_err(|errno| {
            MirrorError::FeatureQuery {
                path: self.path.clone(),
                source: errno.into(),
            }
        })?;
        Ok(count.max(0) as u32)
    }

    /// Install an effect on the physical device. The returned handle
    /// removes the effect when dropped.
    pub fn upload_effect(&mut self, data: FFEffectData) -> io::Result<FFEffect> {
        self.device.upload_ff_effect(data)
    }

    /// Write one event through to the physical device (force-feedback
    /// play/stop and gain changes).
    pub fn send(&mut self, event: InputEvent) -> io::Result<()> {
        self.device.send_events(&[event])
    }
}

impl AsRawFd for EventNode {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}

impl Drop for EventNode {
    fn drop(&mut self) {
        access::restore(self.device.as_raw_fd(), self.orig_mode);
    }
}
