//! The exported descriptor struct and its layout rules.
//!
//! A plugin module exports one `extern "C"` function,
//! [`ENTRY_SYMBOL_NAME`], returning a pointer to a [`RawDescriptor`] that
//! stays valid for the lifetime of the loaded module.
//!
//! Layout evolution rules:
//! - fields are never reordered or removed; new capability slots are
//!   appended at the end,
//! - every appended slot is optional (`None` means unsupported),
//! - [`API_LEVEL`] is bumped exactly when the struct grows, never for
//!   behavior changes,
//! - `size_bytes` records the struct size the plugin was compiled
//!   against; the host never reads past it.

use std::os::raw::{c_char, c_int, c_void};

use crate::slot::SlotId;

/// Magic stamped into the first field of every descriptor ("PDK1").
pub const DESCRIPTOR_MAGIC: u32 = 0x5044_4b31;

/// Current schema level of [`RawDescriptor`] as this host knows it.
///
/// Level 0 carried the header plus `get_name_for_keycode` and `reset`;
/// level 1 appended `get_action_for_keycombo`.
pub const API_LEVEL: u32 = 1;

/// Descriptor flag: the plugin's capabilities may be invoked from several
/// threads at once. Without it the host serializes calls per module.
pub const FLAG_REENTRANT: u32 = 1 << 0;

/// Nul-terminated entry symbol, as the dynamic loader wants it.
pub const ENTRY_SYMBOL: &[u8] = b"playdeck_plugin_descriptor\0";

/// Entry symbol as printable text, for diagnostics.
pub const ENTRY_SYMBOL_NAME: &str = "playdeck_plugin_descriptor";

/// Signature of the exported entry function.
pub type EntryFn = unsafe extern "C" fn() -> *const RawDescriptor;

/// Resolve a display name for a key code. Returns null when the plugin
/// has no name for it. Since level 0.
pub type NameForKeycodeFn = unsafe extern "C" fn(c_int) -> *const c_char;

/// Notification that host-side hotkey state was rebuilt. Since level 0.
pub type ResetFn = unsafe extern "C" fn();

/// Resolve an action for `(key, mods, isglobal)` within an opaque action
/// context. Returns null when no binding exists. Since level 1.
pub type ActionForKeycomboFn =
    unsafe extern "C" fn(c_int, c_int, c_int, *mut c_void) -> *mut c_void;

/// The descriptor a plugin module exports.
///
/// Field order is ABI order. The capability slots at the tail follow the
/// append-only rules in the module docs.
#[repr(C)]
pub struct RawDescriptor {
    pub magic: u32,
    pub size_bytes: u32,
    pub api_level: u32,
    pub flags: u32,
    pub name: *const c_char,
    pub version: *const c_char,

    // Capability slots, oldest first.
    pub get_name_for_keycode: Option<NameForKeycodeFn>,
    pub reset: Option<ResetFn>,
    pub get_action_for_keycombo: Option<ActionForKeycomboFn>,
}

impl RawDescriptor {
    /// Size of the level-0 prefix: header plus the two original slots.
    /// Anything smaller is not a descriptor at all.
    pub fn min_prefix_size() -> usize {
        std::mem::offset_of!(RawDescriptor, get_action_for_keycombo)
    }

    /// Minimum `size_bytes` a descriptor declaring `level` must carry.
    pub fn min_size_for_level(level: u32) -> usize {
        SlotId::ALL
            .iter()
            .filter(|slot| slot.since_level() <= level)
            .map(|slot| slot.end_offset())
            .max()
            .unwrap_or_else(Self::min_prefix_size)
    }

    /// Whether a declared `size_bytes` covers `slot`'s field. The host
    /// must not read the field when this is false.
    pub fn covers(size_bytes: u32, slot: SlotId) -> bool {
        slot.end_offset() <= size_bytes as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_sizes_are_monotonic() {
        let level0 = RawDescriptor::min_size_for_level(0);
        let level1 = RawDescriptor::min_size_for_level(1);
        assert!(level0 < level1);
        assert_eq!(level0, RawDescriptor::min_prefix_size());
        assert_eq!(level1, std::mem::size_of::<RawDescriptor>());
    }

    #[test]
    fn unknown_future_levels_require_no_more_than_current() {
        assert_eq!(
            RawDescriptor::min_size_for_level(17),
            RawDescriptor::min_size_for_level(API_LEVEL)
        );
    }

    #[test]
    fn coverage_tracks_declared_size() {
        let full = std::mem::size_of::<RawDescriptor>() as u32;
        assert!(RawDescriptor::covers(full, SlotId::Reset));
        assert!(RawDescriptor::covers(full, SlotId::ActionForKeycombo));

        let truncated = RawDescriptor::min_prefix_size() as u32;
        assert!(RawDescriptor::covers(truncated, SlotId::NameForKeycode));
        assert!(RawDescriptor::covers(truncated, SlotId::Reset));
        assert!(!RawDescriptor::covers(truncated, SlotId::ActionForKeycombo));
    }

    #[test]
    fn null_slot_is_free() {
        // The ABI relies on Option<fn> using the null representation.
        assert_eq!(
            std::mem::size_of::<Option<ResetFn>>(),
            std::mem::size_of::<usize>()
        );
    }
}
