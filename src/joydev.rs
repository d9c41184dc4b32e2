//! Legacy joystick node (`/dev/input/js*`)
//!
//! The legacy interface delivers fixed-size state records and answers
//! the axis/button count and code-map queries. The code maps are what
//! ties a legacy record index to the raw event code the mirror must
//! advertise.

use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::{ioctl_read, ioctl_read_buf};
use tracing::warn;

use crate::access::{self, OriginalMode, READ_NARROW, READ_WIDEN};
use crate::error::MirrorError;

/// One legacy state record on the wire.
pub const RECORD_SIZE: usize = 8;

/// Axis-code map length (`ABS_CNT` entries of one byte each).
pub const AXIS_MAP_LEN: usize = 0x40;

/// Button-code map length (`KEY_MAX - BTN_MISC + 1` entries).
pub const BUTTON_MAP_LEN: usize = 0x2ff - 0x100 + 1;

const EVENT_BUTTON: u8 = 0x01;
const EVENT_AXIS: u8 = 0x02;
/// Set on records replaying the device's state to a fresh reader.
const EVENT_INIT: u8 = 0x80;

ioctl_read!(js_get_axis_count, b'j', 0x11, u8);
ioctl_read!(js_get_button_count, b'j', 0x12, u8);
ioctl_read_buf!(js_get_axis_map, b'j', 0x32, u8);
ioctl_read_buf!(js_get_button_map, b'j', 0x34, u16);

/// A decoded legacy state record. Initial-value replays decode the
/// same as live records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsRecord {
    Button { index: u8, pressed: bool },
    Axis { index: u8, value: i16 },
}

/// Decode one raw record. Returns `None` for record types the mirror
/// does not track.
pub fn parse_record(raw: &[u8; RECORD_SIZE]) -> Option<JsRecord> {
    let value = i16::from_le_bytes([raw[4], raw[5]]);
    let kind = raw[6] & !EVENT_INIT;
    let index = raw[7];

    match kind {
        EVENT_BUTTON => Some(JsRecord::Button {
            index,
            pressed: value != 0,
        }),
        EVENT_AXIS => Some(JsRecord::Axis { index, value }),
        _ => None,
    }
}

/// An open legacy joystick node. The node is access-restricted while
/// this handle exists; dropping it restores the original mode bits.
pub struct JoyDevice {
    file: File,
    path: PathBuf,
    orig_mode: OriginalMode,
}

impl JoyDevice {
    pub fn open(path: &Path) -> Result<Self, MirrorError> {
        let (file, orig_mode) = access::open_restricted(path, READ_WIDEN, READ_NARROW, File::open)
            .map_err(|source| MirrorError::NodeOpen {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            orig_mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn axis_count(&self) -> io::Result<u8> {
        let mut count = 0u8;
        unsafe { js_get_axis_count(self.file.as_raw_fd(), &mut count) }?;
        Ok(count)
    }

    pub fn button_count(&self) -> io::Result<u8> {
        let mut count = 0u8;
        unsafe { js_get_button_count(self.file.as_raw_fd(), &mut count) }?;
        Ok(count)
    }

    /// Legacy axis index → raw absolute-axis code.
    pub fn axis_map(&self) -> io::Result<[u8; AXIS_MAP_LEN]> {
        let mut map = [0u8; AXIS_MAP_LEN];
        unsafe { js_get_axis_map(self.file.as_raw_fd(), &mut map) }?;
        Ok(map)
    }

    /// Legacy button index → raw key code.
    pub fn button_map(&self) -> io::Result<[u16; BUTTON_MAP_LEN]> {
        let mut map = [0u16; BUTTON_MAP_LEN];
        unsafe { js_get_button_map(self.file.as_raw_fd(), &mut map) }?;
        Ok(map)
    }

    /// Read one state record. Short or unrecognized reads are logged
    /// and reported as `None`; only a failed read surfaces as an error.
    pub fn read_record(&mut self) -> io::Result<Option<JsRecord>> {
        let mut raw = [0u8; RECORD_SIZE];
        let n = self.file.read(&mut raw)?;
        if n != RECORD_SIZE {
            warn!("short read ({} bytes) from {}", n, self.path.display());
            return Ok(None);
        }
        Ok(parse_record(&raw))
    }
}

impl AsRawFd for JoyDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl Drop for JoyDevice {
    fn drop(&mut self) {
        access::restore(self.file.as_raw_fd(), self.orig_mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: i16, kind: u8, number: u8) -> [u8; RECORD_SIZE] {
        let mut raw = [0u8; RECORD_SIZE];
        raw[4..6].copy_from_slice(&value.to_le_bytes());
        raw[6] = kind;
        raw[7] = number;
        raw
    }

    #[test]
    fn test_parse_button_press() {
        let rec = parse_record(&record(1, EVENT_BUTTON, 3));
        assert!(matches!(
            rec,
            Some(JsRecord::Button {
                index: 3,
                pressed: true
            })
        ));
    }

    #[test]
    fn test_parse_button_release() {
        let rec = parse_record(&record(0, EVENT_BUTTON, 0));
        assert!(matches!(
            rec,
            Some(JsRecord::Button {
                index: 0,
                pressed: false
            })
        ));
    }

    #[test]
    fn test_parse_axis_negative() {
        let rec = parse_record(&record(-32767, EVENT_AXIS, 1));
        assert!(matches!(
            rec,
            Some(JsRecord::Axis {
                index: 1,
                value: -32767
            })
        ));
    }

    #[test]
    fn test_parse_init_flag_masked() {
        // Initial-state replays carry the same payload as live records.
        let rec = parse_record(&record(200, EVENT_AXIS | EVENT_INIT, 2));
        assert!(matches!(
            rec,
            Some(JsRecord::Axis {
                index: 2,
                value: 200
            })
        ));
    }

    #[test]
    fn test_parse_unknown_type_ignored() {
        assert_eq!(parse_record(&record(1, 0x04, 0)), None);
        assert_eq!(parse_record(&record(1, 0x00, 0)), None);
    }
}
