//! Pairing-slot registry
//!
//! Each physical controller surfaces as two independently-discovered
//! kernel nodes that share a topological pairing key. The registry is
//! a fixed-capacity arena that folds those two discovery events into
//! one slot; a slot only activates once both halves have arrived.
//!
//! The registry does no I/O. Callers feed it discovery observations
//! and attach the constructed runtime state afterwards, which keeps
//! the pairing state machine testable on its own.

use std::path::{Path, PathBuf};

/// Bounded controller count; discoveries beyond it are rejected.
pub const MAX_MIRRORS: usize = 10;

/// Which of the pair's two node kinds a discovery names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Legacy joystick node (`/dev/input/js*`).
    Legacy,
    /// Raw event node (`/dev/input/event*`).
    Raw,
}

#[derive(Debug)]
enum Slot<M> {
    Empty,
    /// One half known; waiting for its partner.
    Pending {
        key: String,
        legacy: Option<PathBuf>,
        raw: Option<PathBuf>,
    },
    Active {
        legacy: PathBuf,
        payload: M,
    },
}

/// Outcome of feeding one discovery into the registry.
#[derive(Debug, PartialEq, Eq)]
pub enum Observation {
    /// First half of a pair recorded; nothing to construct yet.
    Incomplete,
    /// Both halves present. The caller constructs the mirror and then
    /// either `activate`s the slot or `clear`s it on failure.
    Complete {
        slot: usize,
        legacy: PathBuf,
        raw: PathBuf,
    },
    /// Every slot occupied; the discovery is dropped.
    Rejected,
}

pub struct Registry<M> {
    slots: Vec<Slot<M>>,
}

impl<M> Registry<M> {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_MIRRORS).map(|_| Slot::Empty).collect(),
        }
    }

    /// Record one discovered node. Matching a pending slot with the
    /// same key and the other kind completes the pair; otherwise the
    /// first empty slot records the half alone.
    pub fn observe(&mut self, kind: NodeKind, path: &Path, key: &str) -> Observation {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Slot::Pending { key: slot_key, legacy, raw } = slot else {
                continue;
            };
            if slot_key.as_str() != key {
                continue;
            }
            let other_present = match kind {
                NodeKind::Legacy => legacy.is_none() && raw.is_some(),
                NodeKind::Raw => raw.is_none() && legacy.is_some(),
            };
            if !other_present {
                continue;
            }

            match kind {
                NodeKind::Legacy => *legacy = Some(path.to_path_buf()),
                NodeKind::Raw => *raw = Some(path.to_path_buf()),
            }
            return Observation::Complete {
                slot: index,
                legacy: legacy.clone().unwrap(),
                raw: raw.clone().unwrap(),
            };
        }

        match self.slots.iter().position(|s| matches!(s, Slot::Empty)) {
            Some(index) => {
                let (mut legacy, mut raw) = (None, None);
                match kind {
                    NodeKind::Legacy => legacy = Some(path.to_path_buf()),
                    NodeKind::Raw => raw = Some(path.to_path_buf()),
                }
                self.slots[index] = Slot::Pending {
                    key: key.to_string(),
                    legacy,
                    raw,
                };
                Observation::Incomplete
            }
            None => Observation::Rejected,
        }
    }

    /// Attach the constructed runtime state to a completed slot.
    pub fn activate(&mut self, index: usize, legacy: PathBuf, payload: M) {
        self.slots[index] = Slot::Active { legacy, payload };
    }

    /// Reset a slot to empty, discarding whatever half-pair it held.
    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Slot::Empty;
        }
    }

    /// Detach and return a slot's runtime state, leaving it empty.
    /// Returns `None` for slots that are not active, which makes
    /// repeated teardown a no-op.
    pub fn take_active(&mut self, index: usize) -> Option<M> {
        let slot = self.slots.get_mut(index)?;
        if !matches!(slot, Slot::Active { .. }) {
            return None;
        }
        match std::mem::replace(slot, Slot::Empty) {
            Slot::Active { payload, .. } => Some(payload),
            _ => unreachable!(),
        }
    }

    pub fn active_mut(&mut self, index: usize) -> Option<&mut M> {
        match self.slots.get_mut(index) {
            Some(Slot::Active { payload, .. }) => Some(payload),
            _ => None,
        }
    }

    /// Find the slot tracking a legacy node path. The second element
    /// reports whether the slot is active (vs. still pending).
    pub fn find_legacy(&self, path: &Path) -> Option<(usize, bool)> {
        self.slots.iter().enumerate().find_map(|(index, slot)| match slot {
            Slot::Active { legacy, .. } if legacy == path => Some((index, true)),
            Slot::Pending { legacy: Some(p), .. } if p == path => Some((index, false)),
            _ => None,
        })
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Active { .. }))
            .count()
    }
}

impl<M> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}
