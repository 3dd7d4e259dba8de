use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::RawDescriptor;

/// Identifier for one capability slot in the descriptor tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotId {
    NameForKeycode,
    Reset,
    ActionForKeycombo,
}

impl SlotId {
    pub const ALL: [SlotId; 3] = [
        SlotId::NameForKeycode,
        SlotId::Reset,
        SlotId::ActionForKeycombo,
    ];

    /// API level at which this slot entered the schema. Older plugins do
    /// not carry the field and must be treated as unsupported.
    pub fn since_level(&self) -> u32 {
        match self {
            SlotId::NameForKeycode => 0,
            SlotId::Reset => 0,
            SlotId::ActionForKeycombo => 1,
        }
    }

    /// One past the last byte of this slot's field in [`RawDescriptor`].
    pub fn end_offset(&self) -> usize {
        let ptr = std::mem::size_of::<usize>();
        let offset = match self {
            SlotId::NameForKeycode => {
                std::mem::offset_of!(RawDescriptor, get_name_for_keycode)
            }
            SlotId::Reset => std::mem::offset_of!(RawDescriptor, reset),
            SlotId::ActionForKeycombo => {
                std::mem::offset_of!(RawDescriptor, get_action_for_keycombo)
            }
        };
        offset + ptr
    }

    /// Field name in the descriptor struct, for logs and CLI output.
    pub fn field_name(&self) -> &'static str {
        match self {
            SlotId::NameForKeycode => "get_name_for_keycode",
            SlotId::Reset => "reset",
            SlotId::ActionForKeycombo => "get_action_for_keycombo",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_appear_in_schema_order() {
        let ends: Vec<usize> = SlotId::ALL.iter().map(|s| s.end_offset()).collect();
        let mut sorted = ends.clone();
        sorted.sort_unstable();
        assert_eq!(ends, sorted);
    }

    #[test]
    fn since_levels_never_decrease_along_the_tail() {
        let levels: Vec<u32> = SlotId::ALL.iter().map(|s| s.since_level()).collect();
        let mut sorted = levels.clone();
        sorted.sort_unstable();
        assert_eq!(levels, sorted);
    }

    #[test]
    fn slot_id_serialization() {
        let json = serde_json::to_string(&SlotId::ActionForKeycombo).unwrap();
        assert_eq!(json, "\"action_for_keycombo\"");

        let parsed: SlotId = serde_json::from_str("\"reset\"").unwrap();
        assert_eq!(parsed, SlotId::Reset);
    }
}
