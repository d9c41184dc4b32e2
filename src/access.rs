//! Scoped permission handling for physical device nodes
//!
//! Physical nodes are opened through a widen/open/narrow sequence: the
//! node's mode bits are widened just enough for the open to succeed,
//! then narrowed below the original so other processes cannot open the
//! node while it is mirrored. The original bits are kept and restored
//! through the open descriptor when the node is released.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::RawFd;
use std::path::Path;

use tracing::warn;

/// Only the permission bits, never the file-type bits.
const PERM_MASK: u32 = 0o7777;

/// Widen/narrow bit sets for a read-only open (legacy joystick node).
pub const READ_WIDEN: u32 = 0o440;
pub const READ_NARROW: u32 = 0o444;

/// Widen/narrow bit sets for a read-write open (raw event node, which
/// also carries force-feedback writes).
pub const RW_WIDEN: u32 = 0o660;
pub const RW_NARROW: u32 = 0o666;

/// A node's permission bits as they were before the mirror claimed it.
#[derive(Debug, Clone, Copy)]
pub struct OriginalMode(u32);

/// Widen the node's mode bits by `widen`, run `open`, then strip
/// `narrow` from the original bits so the node stays inaccessible for
/// the lifetime of the returned handle.
///
/// The sequence runs without yielding between the three steps; the
/// narrow window is still visible to other processes inspecting the
/// node concurrently, which is accepted.
pub fn open_restricted<T>(
    path: &Path,
    widen: u32,
    narrow: u32,
    open: impl FnOnce(&Path) -> io::Result<T>,
) -> io::Result<(T, OriginalMode)> {
    let orig = fs::metadata(path)?.permissions().mode() & PERM_MASK;

    fs::set_permissions(path, fs::Permissions::from_mode(orig | widen))?;
    let handle = match open(path) {
        Ok(handle) => handle,
        Err(err) => {
            // Failed open leaves nothing to restore through later, so
            // put the original bits back now.
            if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(orig)) {
                warn!("failed to restore mode of {}: {}", path.display(), e);
            }
            return Err(err);
        }
    };
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(orig & !narrow)) {
        warn!("failed to narrow mode of {}: {}", path.display(), e);
    }

    Ok((handle, OriginalMode(orig)))
}

/// Restore the node's original mode bits through its open descriptor.
pub fn restore(fd: RawFd, mode: OriginalMode) {
    let ret = unsafe { libc::fchmod(fd, mode.0 as libc::mode_t) };
    if ret == -1 {
        warn!(
            "failed to restore mode {:o} on fd {}: {}",
            mode.0,
            fd,
            io::Error::last_os_error()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::os::unix::io::AsRawFd;

    fn scratch_file(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("padmirror-{}-{}", name, std::process::id()));
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        path
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & PERM_MASK
    }

    #[test]
    fn test_open_narrows_and_restore_reverts() {
        let path = scratch_file("narrow");
        let (file, orig) = open_restricted(&path, RW_WIDEN, RW_NARROW, |p| File::open(p)).unwrap();

        // Narrowed below the original: no read bits left anywhere.
        assert_eq!(mode_of(&path), 0o644 & !RW_NARROW);

        restore(file.as_raw_fd(), orig);
        assert_eq!(mode_of(&path), 0o644);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_open_restores_original() {
        let path = scratch_file("failed-open");
        let err = open_restricted(&path, READ_WIDEN, READ_NARROW, |_| {
            Err::<File, _>(io::Error::from(io::ErrorKind::NotFound))
        });
        assert!(err.is_err());
        assert_eq!(mode_of(&path), 0o644);
        fs::remove_file(&path).unwrap();
    }
}
