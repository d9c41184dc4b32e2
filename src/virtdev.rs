//! Virtual mirror device construction
//!
//! Builds one uinput device per paired controller, advertising exactly
//! the probed capability set. The identity constants mark the device
//! as a mirror rather than any real hardware vendor.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, BusType, FFEffectType, InputId, Key, UinputAbsSetup,
};

use crate::error::MirrorError;
use crate::probe::Capabilities;

/// "mp"/"js" in ASCII; no real vendor uses these ids.
pub const VENDOR_ID: u16 = 0x6d70;
pub const PRODUCT_ID: u16 = 0x6a73;
pub const VERSION: u16 = 0x0100;

/// Mirror device name, derived from the slot index so multiple
/// controllers stay distinguishable.
pub fn device_name(slot: usize) -> String {
    format!("Mirror Pad {}", slot)
}

/// Declare and create the mirror. Event classes are only declared when
/// the descriptor carries codes for them; failure is fatal for the
/// slot alone.
pub fn create(caps: &Capabilities, slot: usize) -> Result<VirtualDevice, MirrorError> {
    let mut builder = VirtualDeviceBuilder::new()
        .map_err(MirrorError::MirrorCreate)?
        .name(&device_name(slot))
        .input_id(InputId::new(BusType::BUS_USB, VENDOR_ID, PRODUCT_ID, VERSION));

    if !caps.advertised_keys.is_empty() {
        let keys: AttributeSet<Key> = caps.advertised_keys.iter().copied().collect();
        builder = builder.with_keys(&keys).map_err(MirrorError::MirrorCreate)?;
    }

    for &(code, info) in &caps.advertised_axes {
        let setup = UinputAbsSetup::new(code, info);
        builder = builder
            .with_absolute_axis(&setup)
            .map_err(MirrorError::MirrorCreate)?;
    }

    if !caps.ff_kinds.is_empty() {
        let kinds: AttributeSet<FFEffectType> = caps.ff_kinds.iter().copied().collect();
        builder = builder
            .with_ff(&kinds)
            .map_err(MirrorError::MirrorCreate)?
            .with_ff_effects_max(caps.ff_effects_max);
    }

    builder.build().map_err(MirrorError::MirrorCreate)
}
