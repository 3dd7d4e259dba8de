//! Decoding and validation of a raw exported descriptor.
//!
//! Everything here runs exactly once per load. The raw struct is read
//! through field-granular pointer reads so that a descriptor compiled
//! against an older, shorter schema is never read past its declared
//! size.

use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_char;

use serde::Serialize;
use tracing::debug;

use playdeck_abi::{
    ActionForKeycomboFn, NameForKeycodeFn, RawDescriptor, ResetFn, SlotId, API_LEVEL,
    DESCRIPTOR_MAGIC, FLAG_REENTRANT,
};

use crate::error::{LoadError, MalformedDescriptor};
use crate::negotiate::{negotiate, HostPolicy};

/// Availability of one capability slot, computed once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Slot is carried by the descriptor and non-null.
    Present,
    /// The plugin's api level predates the slot.
    AbsentByVersion,
    /// The plugin's schema carries the slot but left it null.
    AbsentByPlugin,
}

impl SlotStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, SlotStatus::Present)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotStatus::Present => "present",
            SlotStatus::AbsentByVersion => "absent by version",
            SlotStatus::AbsentByPlugin => "absent by plugin",
        };
        f.write_str(s)
    }
}

/// Identity of a loaded plugin, copied out of the raw descriptor.
/// Immutable after load.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorInfo {
    pub name: String,
    pub version: String,
    pub api_level: u32,
    pub flags: u32,
}

impl DescriptorInfo {
    /// Whether the plugin declared its capabilities safe for concurrent
    /// invocation. Without this the host must serialize calls.
    pub fn is_reentrant(&self) -> bool {
        self.flags & FLAG_REENTRANT != 0
    }
}

/// Function pointers copied out of the descriptor tail. Only fields the
/// declared size covers are ever read; everything else stays `None`.
#[derive(Debug)]
pub(crate) struct CapabilityTable {
    pub name_for_keycode: Option<NameForKeycodeFn>,
    pub reset: Option<ResetFn>,
    pub action_for_keycombo: Option<ActionForKeycomboFn>,
}

impl CapabilityTable {
    fn has(&self, slot: SlotId) -> bool {
        match slot {
            SlotId::NameForKeycode => self.name_for_keycode.is_some(),
            SlotId::Reset => self.reset.is_some(),
            SlotId::ActionForKeycombo => self.action_for_keycombo.is_some(),
        }
    }
}

/// Per-slot statuses, indexed in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotStatuses([SlotStatus; SlotId::ALL.len()]);

impl SlotStatuses {
    pub fn get(&self, slot: SlotId) -> SlotStatus {
        self.0[Self::index(slot)]
    }

    // Must mirror the order of `SlotId::ALL`.
    fn index(slot: SlotId) -> usize {
        match slot {
            SlotId::NameForKeycode => 0,
            SlotId::Reset => 1,
            SlotId::ActionForKeycombo => 2,
        }
    }
}

pub(crate) struct Decoded {
    pub info: DescriptorInfo,
    pub table: CapabilityTable,
    pub statuses: SlotStatuses,
}

/// Validate and copy out a raw descriptor.
///
/// # Safety
///
/// `raw` must either be null (rejected cleanly) or point to a descriptor
/// whose allocation spans at least the level-0 prefix and its own
/// declared `size_bytes`, with `name`/`version` pointing to
/// nul-terminated strings valid for the duration of this call.
pub(crate) unsafe fn decode(
    raw: *const RawDescriptor,
    policy: &HostPolicy,
) -> Result<Decoded, LoadError> {
    if raw.is_null() {
        return Err(MalformedDescriptor::NullDescriptor.into());
    }

    // The header lives inside the minimum prefix, which every descriptor
    // regardless of level must carry.
    let magic = unsafe { (&raw const (*raw).magic).read() };
    let size_bytes = unsafe { (&raw const (*raw).size_bytes).read() };
    let api_level = unsafe { (&raw const (*raw).api_level).read() };
    let flags = unsafe { (&raw const (*raw).flags).read() };

    if magic != DESCRIPTOR_MAGIC {
        return Err(MalformedDescriptor::BadMagic { found: magic }.into());
    }

    // A plugin newer than the host only needs the fields the host knows
    // about; its extra tail is ignored.
    let effective_level = api_level.min(API_LEVEL);
    let required = RawDescriptor::min_size_for_level(effective_level);
    if (size_bytes as usize) < required {
        return Err(MalformedDescriptor::TruncatedPrefix {
            size_bytes,
            required,
            api_level,
        }
        .into());
    }

    let level = negotiate(policy, api_level)?;

    let name = unsafe { read_cstr((&raw const (*raw).name).read(), "name") }?;
    let version_ptr = unsafe { (&raw const (*raw).version).read() };
    let version = if version_ptr.is_null() {
        debug!(plugin = %name, "descriptor carries no version string");
        String::new()
    } else {
        unsafe { read_cstr(version_ptr, "version") }?
    };

    let covers = |slot: SlotId| RawDescriptor::covers(size_bytes, slot);
    let table = CapabilityTable {
        name_for_keycode: if covers(SlotId::NameForKeycode) {
            unsafe { (&raw const (*raw).get_name_for_keycode).read() }
        } else {
            None
        },
        reset: if covers(SlotId::Reset) {
            unsafe { (&raw const (*raw).reset).read() }
        } else {
            None
        },
        action_for_keycombo: if covers(SlotId::ActionForKeycombo) {
            unsafe { (&raw const (*raw).get_action_for_keycombo).read() }
        } else {
            None
        },
    };

    let statuses = SlotStatuses(SlotId::ALL.map(|slot| {
        if level < slot.since_level() {
            SlotStatus::AbsentByVersion
        } else if table.has(slot) {
            SlotStatus::Present
        } else {
            SlotStatus::AbsentByPlugin
        }
    }));

    Ok(Decoded {
        info: DescriptorInfo {
            name,
            version,
            api_level,
            flags,
        },
        table,
        statuses,
    })
}

unsafe fn read_cstr(
    ptr: *const c_char,
    field: &'static str,
) -> Result<String, MalformedDescriptor> {
    if ptr.is_null() {
        return Err(MalformedDescriptor::BadString { field });
    }
    let s = unsafe { CStr::from_ptr(ptr) };
    s.to_str()
        .map(str::to_owned)
        .map_err(|_| MalformedDescriptor::BadString { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_indices_follow_schema_order() {
        for (i, slot) in SlotId::ALL.into_iter().enumerate() {
            assert_eq!(SlotStatuses::index(slot), i);
        }
    }
}
