//! Binary contract between the Playdeck host and native hotkey plugins.
//!
//! Everything in this crate is ABI: field order, sizes, and the entry
//! symbol are frozen per API level and may only grow append-only.

pub mod descriptor;
pub mod slot;

pub use descriptor::{
    ActionForKeycomboFn, EntryFn, NameForKeycodeFn, RawDescriptor, ResetFn, API_LEVEL,
    DESCRIPTOR_MAGIC, ENTRY_SYMBOL, ENTRY_SYMBOL_NAME, FLAG_REENTRANT,
};
pub use slot::SlotId;
