//! Capability probing
//!
//! Derives the mirror's capability descriptor from a paired legacy +
//! raw node: counts and code maps from the legacy interface, supported
//! code sets and force-feedback kinds from the raw interface. The
//! mirror advertises exactly these codes, so consuming applications
//! see the same axis/button numbering on both devices.

use std::io;

use evdev::{AbsInfo, AbsoluteAxisType, FFEffectType, Key};

use crate::error::MirrorError;
use crate::evnode::EventNode;
use crate::joydev::JoyDevice;

/// The legacy protocol's button-code window (`BTN_MISC..=BTN_GEAR_UP`).
/// Key codes outside it are never reported through a legacy node.
const BUTTON_CODE_MIN: u16 = 0x100;
const BUTTON_CODE_MAX: u16 = 0x151;

/// Absolute-axis codes run `ABS_X..ABS_CNT`.
const AXIS_CODE_LIMIT: u16 = 0x40;

/// Force-feedback effect kinds run `FF_EFFECT_MIN..=FF_MAX`.
const FF_KIND_MIN: u16 = 0x50;
const FF_KIND_MAX: u16 = 0x7f;

/// Everything the mirror needs to advertise itself. Computed once per
/// pairing, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Legacy axis index → raw absolute-axis code.
    pub axis_codes: Vec<u16>,
    /// Legacy button index → raw key code.
    pub button_codes: Vec<u16>,
    /// Key codes to advertise (raw key bitmask ∩ legacy button window).
    pub advertised_keys: Vec<Key>,
    /// Absolute axes to advertise, with the physical node's ranges.
    pub advertised_axes: Vec<(AbsoluteAxisType, AbsInfo)>,
    /// Supported force-feedback effect kinds.
    pub ff_kinds: Vec<FFEffectType>,
    /// Maximum concurrently resident effects.
    pub ff_effects_max: u32,
}

impl Capabilities {
    pub fn axis_count(&self) -> usize {
        self.axis_codes.len()
    }

    pub fn button_count(&self) -> usize {
        self.button_codes.len()
    }

    /// Assemble the descriptor from already-fetched raw data.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        axis_count: u8,
        axis_map: &[u8],
        button_count: u8,
        button_map: &[u16],
        key_bits: &[u16],
        abs_bits: &[(u16, AbsInfo)],
        ff_bits: &[u16],
        ff_effects_max: u32,
    ) -> Self {
        let axis_codes = axis_map
            .iter()
            .take(usize::from(axis_count).min(axis_map.len()))
            .map(|&code| u16::from(code))
            .collect();
        let button_codes = button_map
            .iter()
            .take(usize::from(button_count).min(button_map.len()))
            .copied()
            .collect();

        let advertised_keys = key_bits
            .iter()
            .filter(|&&code| (BUTTON_CODE_MIN..=BUTTON_CODE_MAX).contains(&code))
            .map(|&code| Key::new(code))
            .collect();
        let advertised_axes = abs_bits
            .iter()
            .filter(|&&(code, _)| code < AXIS_CODE_LIMIT)
            .map(|&(code, info)| (AbsoluteAxisType(code), info))
            .collect();
        let ff_kinds: Vec<FFEffectType> = ff_bits
            .iter()
            .filter(|&&code| (FF_KIND_MIN..=FF_KIND_MAX).contains(&code))
            .map(|&code| FFEffectType(code))
            .collect();

        // Without any effect kind there is nothing to host.
        let ff_effects_max = if ff_kinds.is_empty() { 0 } else { ff_effects_max };

        Self {
            axis_codes,
            button_codes,
            advertised_keys,
            advertised_axes,
            ff_kinds,
            ff_effects_max,
        }
    }
}

/// Probe a paired legacy + raw node. Query failures are fatal: a
/// mirror with undefined capabilities must never come up.
pub fn probe(joy: &JoyDevice, node: &EventNode) -> Result<Capabilities, MirrorError> {
    let legacy_query = |source: io::Error| MirrorError::FeatureQuery {
        path: joy.path().to_path_buf(),
        source,
    };

    let axis_count = joy.axis_count().map_err(legacy_query)?;
    let button_count = joy.button_count().map_err(legacy_query)?;
    let axis_map = joy.axis_map().map_err(legacy_query)?;
    let button_map = joy.button_map().map_err(legacy_query)?;

    let ranges = node.abs_ranges()?;
    let abs_bits: Vec<(u16, AbsInfo)> = node
        .abs_codes()
        .into_iter()
        .filter(|&code| usize::from(code) < ranges.len())
        .map(|code| {
            let st = ranges[usize::from(code)];
            let info = AbsInfo::new(st.value, st.minimum, st.maximum, st.fuzz, st.flat, st.resolution);
            (code, info)
        })
        .collect();

    let ff_bits = node.ff_codes();
    let ff_effects_max = if ff_bits.is_empty() {
        0
    } else {
        node.effect_capacity()?
    };

    Ok(Capabilities::assemble(
        axis_count,
        &axis_map,
        button_count,
        &button_map,
        &node.key_codes(),
        &abs_bits,
        &ff_bits,
        ff_effects_max,
    ))
}
