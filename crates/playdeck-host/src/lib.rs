//! Host side of the Playdeck plugin protocol.
//!
//! A module is opened, its exported descriptor validated and
//! version-checked exactly once, and every optional capability is exposed
//! through a typed wrapper that checks presence before touching the
//! underlying pointer.

pub mod descriptor;
pub mod error;
pub mod loader;
pub mod negotiate;
pub mod plugin;

mod gate;

pub use descriptor::{DescriptorInfo, SlotStatus};
pub use error::{InvokeError, LoadError, MalformedDescriptor, UnsupportedPlugin};
pub use loader::{PluginLoader, PluginRegistry};
pub use negotiate::{negotiate, HostPolicy};
pub use plugin::{ActionContext, ActionHandle, LoadedPlugin};
