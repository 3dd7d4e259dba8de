use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Platform key code as delivered by the host's input layer.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyCode(pub i32);

impl KeyCode {
    pub fn raw(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Modifier key mask. Bit layout is part of the plugin ABI.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const SHIFT: Modifiers = Modifiers(1 << 0);
    pub const CTRL: Modifiers = Modifiers(1 << 1);
    pub const ALT: Modifiers = Modifiers(1 << 2);
    pub const SUPER: Modifiers = Modifiers(1 << 3);

    pub fn from_bits(bits: u32) -> Self {
        Modifiers(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

/// A key code plus its modifier mask, the unit hotkey lookups are keyed by.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: KeyCode,
    pub mods: Modifiers,
}

impl KeyCombo {
    pub fn new(key: KeyCode, mods: Modifiers) -> Self {
        Self { key, mods }
    }
}

/// Whether a hotkey lookup is scoped to the focused window or the whole
/// desktop session.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionScope {
    Local,
    Global,
}

impl ActionScope {
    pub fn is_global(&self) -> bool {
        matches!(self, ActionScope::Global)
    }
}
