use std::path::PathBuf;

use thiserror::Error;

use playdeck_abi::SlotId;

use crate::descriptor::SlotStatus;

/// Structural validation failure. Fatal to that module's load only.
#[derive(Error, Debug)]
pub enum MalformedDescriptor {
    #[error("entry function returned a null descriptor")]
    NullDescriptor,

    #[error("bad descriptor magic {found:#010x}")]
    BadMagic { found: u32 },

    #[error(
        "declared size {size_bytes} is below the {required} bytes required for api level {api_level}"
    )]
    TruncatedPrefix {
        size_bytes: u32,
        required: usize,
        api_level: u32,
    },

    #[error("descriptor field `{field}` is null or not valid UTF-8")]
    BadString { field: &'static str },
}

/// Version negotiation failure: the plugin predates the oldest schema
/// level this host still supports.
#[derive(Error, Debug)]
#[error("plugin declares api level {plugin_level}, host requires at least {host_min}")]
pub struct UnsupportedPlugin {
    pub plugin_level: u32,
    pub host_min: u32,
}

/// Aggregate over everything that can go wrong while loading one module.
/// A failed load never leaves a partially opened module behind.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open module {}", .path.display())]
    OpenModule {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("module {} does not export `{symbol}`", .path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("malformed descriptor: {0}")]
    Malformed(#[from] MalformedDescriptor),

    #[error("unsupported plugin: {0}")]
    Unsupported(#[from] UnsupportedPlugin),
}

/// Per-call outcome for an unavailable capability. This is expected
/// control flow, not a fault: callers fall back to default behavior.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvokeError {
    #[error("capability `{slot}` is not supported ({status})")]
    NotSupported { slot: SlotId, status: SlotStatus },

    #[error("plugin is unloading, no new invocations accepted")]
    Unloading,
}
