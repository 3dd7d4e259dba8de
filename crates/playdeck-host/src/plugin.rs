//! A loaded plugin and the checked invocation adapter around its
//! capability table.

use std::ffi::CStr;
use std::os::raw::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Mutex;

use libloading::Library;
use tracing::debug;

use playdeck_abi::{RawDescriptor, SlotId};
use playdeck_common::{ActionScope, KeyCode, KeyCombo};

use crate::descriptor::{decode, CapabilityTable, DescriptorInfo, SlotStatus, SlotStatuses};
use crate::error::{InvokeError, LoadError};
use crate::gate::{CallGate, CallPermit};
use crate::negotiate::HostPolicy;

/// Opaque host-owned scope handle passed into action resolution (for
/// example "main window" vs "playlist"). The plugin borrows it only for
/// the duration of the call.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext(*mut c_void);

impl ActionContext {
    pub fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

/// Opaque handle to a plugin-provided action. Never dereferenced by the
/// host; only passed back to plugin code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionHandle(NonNull<c_void>);

impl ActionHandle {
    pub(crate) fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// A validated, version-checked plugin whose capability table is
/// read-only for the rest of its lifetime.
///
/// No thread-safety is promised for the plugin code itself: unless
/// [`LoadedPlugin::is_reentrant`] returns true, callers wanting
/// concurrent invocations must serialize them.
#[derive(Debug)]
pub struct LoadedPlugin {
    info: DescriptorInfo,
    table: CapabilityTable,
    statuses: SlotStatuses,
    gate: CallGate,
    path: Option<PathBuf>,
    // Dropped last among the users of its symbols; `unload` drains the
    // gate before the handle is released.
    module: Mutex<Option<Library>>,
}

impl LoadedPlugin {
    pub(crate) unsafe fn from_parts(
        raw: *const RawDescriptor,
        policy: &HostPolicy,
        module: Option<Library>,
        path: Option<PathBuf>,
    ) -> Result<Self, LoadError> {
        let decoded = unsafe { decode(raw, policy) }?;
        Ok(Self {
            info: decoded.info,
            table: decoded.table,
            statuses: decoded.statuses,
            gate: CallGate::new(),
            path,
            module: Mutex::new(module),
        })
    }

    /// Build a plugin from a descriptor that is not backed by a dynamic
    /// module, e.g. a statically linked capability table.
    ///
    /// # Safety
    ///
    /// `descriptor`, its strings, and every function pointer it carries
    /// must stay valid for the lifetime of the returned plugin.
    pub unsafe fn from_raw(
        descriptor: *const RawDescriptor,
        policy: &HostPolicy,
    ) -> Result<Self, LoadError> {
        unsafe { Self::from_parts(descriptor, policy, None, None) }
    }

    pub fn info(&self) -> &DescriptorInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn version(&self) -> &str {
        &self.info.version
    }

    pub fn api_level(&self) -> u32 {
        self.info.api_level
    }

    pub fn is_reentrant(&self) -> bool {
        self.info.is_reentrant()
    }

    /// Path the module was loaded from, if it came from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Availability of one capability slot, as computed at load time.
    pub fn slot_status(&self, slot: SlotId) -> SlotStatus {
        self.statuses.get(slot)
    }

    /// All slots with their statuses, in schema order.
    pub fn capabilities(&self) -> impl Iterator<Item = (SlotId, SlotStatus)> + '_ {
        SlotId::ALL.into_iter().map(|s| (s, self.statuses.get(s)))
    }

    fn checked(&self, slot: SlotId) -> Result<CallPermit<'_>, InvokeError> {
        let status = self.statuses.get(slot);
        if !status.is_present() {
            return Err(InvokeError::NotSupported { slot, status });
        }
        self.gate.begin()
    }

    /// Ask the plugin for a display name for `key`. `None` means the
    /// plugin has no name for that code.
    pub fn name_for_keycode(&self, key: KeyCode) -> Result<Option<String>, InvokeError> {
        let _permit = self.checked(SlotId::NameForKeycode)?;
        let Some(f) = self.table.name_for_keycode else {
            return Err(InvokeError::NotSupported {
                slot: SlotId::NameForKeycode,
                status: SlotStatus::AbsentByPlugin,
            });
        };
        // Present implies non-null and inside the declared size.
        let ptr = unsafe { f(key.raw()) };
        if ptr.is_null() {
            return Ok(None);
        }
        // Copied out immediately; only valid until the call returns.
        let name = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        Ok(Some(name))
    }

    /// Tell the plugin that host-side hotkey state was rebuilt.
    /// Fire-and-forget, but presence is still checked first.
    pub fn reset(&self) -> Result<(), InvokeError> {
        let _permit = self.checked(SlotId::Reset)?;
        let Some(f) = self.table.reset else {
            return Err(InvokeError::NotSupported {
                slot: SlotId::Reset,
                status: SlotStatus::AbsentByPlugin,
            });
        };
        unsafe { f() };
        Ok(())
    }

    /// Resolve an action bound to `combo` in `scope`. `None` means no
    /// binding. `ctx` is borrowed by the plugin only for this call.
    pub fn action_for_keycombo(
        &self,
        combo: KeyCombo,
        scope: ActionScope,
        ctx: ActionContext,
    ) -> Result<Option<ActionHandle>, InvokeError> {
        let _permit = self.checked(SlotId::ActionForKeycombo)?;
        let Some(f) = self.table.action_for_keycombo else {
            return Err(InvokeError::NotSupported {
                slot: SlotId::ActionForKeycombo,
                status: SlotStatus::AbsentByPlugin,
            });
        };
        let raw = unsafe {
            f(
                combo.key.raw(),
                combo.mods.bits() as c_int,
                scope.is_global() as c_int,
                ctx.as_ptr(),
            )
        };
        Ok(ActionHandle::from_raw(raw))
    }

    /// Barrier teardown: block new invocations, wait for in-flight ones
    /// to finish, then release the module handle. Idempotent; every
    /// invocation afterwards fails with [`InvokeError::Unloading`].
    pub fn unload(&self) {
        self.gate.drain();
        let mut module = self.module.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lib) = module.take() {
            debug!(plugin = %self.info.name, "releasing module handle");
            drop(lib);
        }
    }
}
