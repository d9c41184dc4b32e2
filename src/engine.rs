//! Reactor loop and slot lifecycle
//!
//! One thread owns all state. The loop blocks on the multiplexer and
//! services whatever became ready: discovery notifications feed the
//! pairing registry, legacy records feed the mirrors, mirror events
//! feed the force-feedback bridge, and the signal descriptor requests
//! shutdown. Shutdown therefore runs on the same thread as every state
//! mutation; there is no signal-handler reentrancy.

use std::path::{Path, PathBuf};

use nix::sys::epoll::EpollEvent;
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::os::unix::io::AsRawFd;
use tracing::{debug, error, info, warn};

use crate::error::MirrorError;
use crate::evnode::EventNode;
use crate::hotplug::{self, DiscoveryBus, HotplugAction, HotplugEvent};
use crate::joydev::JoyDevice;
use crate::mirror::ActiveMirror;
use crate::mux::{Mux, Stream, Token, WAIT_BATCH};
use crate::probe;
use crate::registry::{NodeKind, Observation, Registry, MAX_MIRRORS};
use crate::virtdev;

pub struct Engine {
    mux: Mux,
    registry: Registry<ActiveMirror>,
    bus: DiscoveryBus,
    signals: SignalFd,
}

impl Engine {
    /// Build the reactor: block the termination signals into a signal
    /// descriptor, open the discovery bus, and register both with the
    /// multiplexer. Failure here is fatal for the process.
    pub fn new() -> Result<Self, MirrorError> {
        let mux = Mux::new().map_err(MirrorError::Multiplexer)?;

        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.add(Signal::SIGTERM);
        mask.thread_block()
            .map_err(|errno| MirrorError::Multiplexer(errno.into()))?;
        let signals = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .map_err(|errno| MirrorError::Multiplexer(errno.into()))?;

        let bus = DiscoveryBus::open()?;

        mux.register(bus.as_raw_fd(), Token::Discovery)
            .map_err(MirrorError::Multiplexer)?;
        mux.register(signals.as_raw_fd(), Token::Shutdown)
            .map_err(MirrorError::Multiplexer)?;

        Ok(Self {
            mux,
            registry: Registry::new(),
            bus,
            signals,
        })
    }

    /// Enumerate already-attached controllers, then react until a
    /// termination signal arrives. Runs full shutdown exactly once
    /// before returning.
    pub fn run(&mut self) -> Result<(), MirrorError> {
        for event in hotplug::enumerate_controllers()? {
            self.observe_node(event.kind, event.path, event.key)?;
        }

        let mut events = [EpollEvent::empty(); WAIT_BATCH];
        'reactor: loop {
            let ready = self
                .mux
                .wait(&mut events)
                .map_err(MirrorError::Multiplexer)?;

            for event in &events[..ready] {
                match Token::decode(event.data()) {
                    Token::Shutdown => {
                        if let Ok(Some(info)) = self.signals.read_signal() {
                            info!("received signal {}, shutting down", info.ssi_signo);
                        }
                        break 'reactor;
                    }
                    Token::Discovery => self.handle_discovery()?,
                    Token::Slot { slot, stream } => self.handle_slot(slot, stream),
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn handle_discovery(&mut self) -> Result<(), MirrorError> {
        for event in self.bus.drain() {
            let HotplugEvent {
                action,
                kind,
                path,
                key,
            } = event;
            match action {
                HotplugAction::Add => self.observe_node(kind, path, key)?,
                // Only the legacy node's removal signals the
                // controller's logical removal.
                HotplugAction::Remove if kind == NodeKind::Legacy => self.remove_legacy(&path),
                HotplugAction::Remove => {}
            }
        }
        Ok(())
    }

    fn observe_node(
        &mut self,
        kind: NodeKind,
        path: PathBuf,
        key: Option<String>,
    ) -> Result<(), MirrorError> {
        let Some(key) = key else {
            debug!("{} carries no pairing key, ignoring", path.display());
            return Ok(());
        };

        match self.registry.observe(kind, &path, &key) {
            Observation::Incomplete => {}
            Observation::Rejected => {
                warn!(
                    "{} controllers maximum, ignoring {}",
                    MAX_MIRRORS,
                    path.display()
                );
            }
            Observation::Complete { slot, legacy, raw } => {
                self.build_slot(slot, legacy, raw, key)?;
            }
        }
        Ok(())
    }

    /// Both halves of a pair are known: open them, probe, create the
    /// mirror and bring the slot live. Feature-query failure aborts
    /// the process; everything else aborts only this slot.
    fn build_slot(
        &mut self,
        slot: usize,
        legacy: PathBuf,
        raw: PathBuf,
        key: String,
    ) -> Result<(), MirrorError> {
        let built = (|| -> Result<ActiveMirror, MirrorError> {
            let joy = JoyDevice::open(&legacy)?;
            let node = EventNode::open(&raw)?;
            let caps = probe::probe(&joy, &node)?;
            let mirror = virtdev::create(&caps, slot)?;
            Ok(ActiveMirror::new(key, joy, node, mirror, caps))
        })();

        let mirror = match built {
            Ok(mirror) => mirror,
            Err(e @ MirrorError::FeatureQuery { .. }) => {
                // Undefined capabilities; do not continue.
                self.registry.clear(slot);
                return Err(e);
            }
            Err(e) => {
                error!("slot {} failed to come up: {}", slot, e);
                self.registry.clear(slot);
                return Ok(());
            }
        };

        let registered = self
            .mux
            .register(mirror.joy_fd(), Token::Slot { slot, stream: Stream::Legacy })
            .and_then(|_| {
                self.mux
                    .register(mirror.mirror_fd(), Token::Slot { slot, stream: Stream::Mirror })
            });
        if let Err(e) = registered {
            error!("slot {} multiplexer registration failed: {}", slot, e);
            let _ = self.mux.deregister(mirror.joy_fd());
            self.registry.clear(slot);
            return Ok(());
        }

        let caps = mirror.capabilities();
        info!(
            "mirror {} live: {} + {} ({} axes, {} buttons, {} effect slots)",
            slot,
            mirror.legacy_path().display(),
            raw.display(),
            caps.axis_count(),
            caps.button_count(),
            caps.ff_effects_max,
        );
        self.registry.activate(slot, legacy, mirror);
        Ok(())
    }

    fn handle_slot(&mut self, slot: usize, stream: Stream) {
        let Some(mirror) = self.registry.active_mut(slot) else {
            // A teardown earlier in this batch already freed the slot.
            debug!("stale readiness token for slot {}", slot);
            return;
        };
        match stream {
            Stream::Legacy => mirror.handle_legacy_ready(),
            Stream::Mirror => mirror.handle_mirror_ready(),
        }
    }

    fn remove_legacy(&mut self, path: &Path) {
        match self.registry.find_legacy(path) {
            Some((slot, true)) => self.teardown(slot),
            Some((slot, false)) => {
                info!("unpaired controller {} removed", path.display());
                self.registry.clear(slot);
            }
            None => {}
        }
    }

    /// Free a slot's resources: deregister both streams, then drop the
    /// runtime state, which destroys the mirror device and restores
    /// the physical nodes' original permissions. No-op on slots that
    /// are not active.
    fn teardown(&mut self, slot: usize) {
        let Some(mirror) = self.registry.take_active(slot) else {
            return;
        };
        info!("removing mirror {} ({})", slot, mirror.legacy_path().display());

        if let Err(e) = self.mux.deregister(mirror.joy_fd()) {
            warn!("failed to deregister legacy stream of slot {}: {}", slot, e);
        }
        if let Err(e) = self.mux.deregister(mirror.mirror_fd()) {
            warn!("failed to deregister mirror stream of slot {}: {}", slot, e);
        }
        drop(mirror);
    }

    fn shutdown(&mut self) {
        for slot in 0..MAX_MIRRORS {
            self.teardown(slot);
        }
        info!("all mirrors removed");
    }
}
