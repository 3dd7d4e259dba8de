//! API-level negotiation between host and plugin.

use playdeck_abi::API_LEVEL;

use crate::error::UnsupportedPlugin;

/// The range of descriptor schema levels this host is willing to accept.
///
/// `max_level` is informational for callers; levels above it are still
/// accepted because the schema is append-only and unknown trailing fields
/// are simply never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPolicy {
    pub min_level: u32,
    pub max_level: u32,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self {
            min_level: 0,
            max_level: API_LEVEL,
        }
    }
}

impl HostPolicy {
    pub fn new(min_level: u32, max_level: u32) -> Self {
        Self {
            min_level,
            max_level,
        }
    }

    /// Require at least `min_level`, keeping the current maximum.
    pub fn with_min_level(min_level: u32) -> Self {
        Self {
            min_level,
            ..Self::default()
        }
    }
}

/// Pure compatibility check. Succeeds iff the plugin's declared level is
/// not older than the host minimum, returning the plugin's level as the
/// negotiated one.
pub fn negotiate(policy: &HostPolicy, plugin_level: u32) -> Result<u32, UnsupportedPlugin> {
    if plugin_level < policy.min_level {
        return Err(UnsupportedPlugin {
            plugin_level,
            host_min: policy.min_level,
        });
    }
    Ok(plugin_level)
}
