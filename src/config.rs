// Engine configuration (§4.J).
//
// Grounded on the teacher's `config.rs`/`v1.rs`: `serde`-derived structs
// deserialized from `ron`. The teacher's own fields (screen geometry,
// gauge layout, channel sources) have no counterpart here and are
// replaced wholesale; what's kept is the mechanism -- small, flat,
// `Deserialize` structs with `serde(default)` so a session has a sane
// configuration even with no file at all.

use serde::Deserialize;

use crate::memory::{AddressWidth, Prot, ProtSet};
use crate::value::ValueType;

#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    Width32,
    Width64,
}

impl Default for Width {
    fn default() -> Self {
        Width::Width64
    }
}

impl Width {
    pub fn to_address_width(self) -> AddressWidth {
        match self {
            Width::Width32 => AddressWidth::Width32,
            Width::Width64 => AddressWidth::Width64,
        }
    }
}

#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ElementType {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
}

impl Default for ElementType {
    fn default() -> Self {
        ElementType::S32
    }
}

impl ElementType {
    pub fn to_value_type(self) -> ValueType {
        match self {
            ElementType::S8 => ValueType::S8,
            ElementType::U8 => ValueType::U8,
            ElementType::S16 => ValueType::S16,
            ElementType::U16 => ValueType::U16,
            ElementType::S32 => ValueType::S32,
            ElementType::U32 => ValueType::U32,
            ElementType::S64 => ValueType::S64,
            ElementType::U64 => ValueType::U64,
            ElementType::F32 => ValueType::F32,
            ElementType::F64 => ValueType::F64,
        }
    }
}

/// Scan-region protection filter: only regions whose protection bits
/// are a superset of this set are visited by `search`. Mirrors `Prot`
/// (§4.H) but stored as three plain booleans since `BitFlags<Prot>`
/// doesn't derive `Deserialize` on its own.
#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScanProtFilter {
    #[serde(default = "default_true")]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub execute: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScanProtFilter {
    fn default() -> Self {
        ScanProtFilter { read: true, write: false, execute: false }
    }
}

impl ScanProtFilter {
    pub fn to_prot_set(self) -> ProtSet {
        let mut set = ProtSet::empty();
        if self.read {
            set |= Prot::R;
        }
        if self.write {
            set |= Prot::W;
        }
        if self.execute {
            set |= Prot::X;
        }
        set
    }
}

/// Engine-wide configuration, loaded via `ron` (§4.J). Every field is
/// `serde(default)`, so `EngineConfig::default()` and a config loaded
/// from an empty `()` document agree -- config is ambient, not a
/// feature the user must opt into.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub address_width: Width,

    /// Mirrors the compile-time `int64` feature for the shell's benefit
    /// (e.g. explaining a rejected parse); can only narrow what the
    /// build supports, never widen it -- see `effective_int64`.
    #[serde(default = "default_int64_enabled")]
    pub int64_enabled: bool,

    #[serde(default)]
    pub default_element_type: ElementType,

    #[serde(default)]
    pub scan_protection: ScanProtFilter,
}

fn default_int64_enabled() -> bool {
    cfg!(feature = "int64")
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            address_width: Width::default(),
            int64_enabled: default_int64_enabled(),
            default_element_type: ElementType::default(),
            scan_protection: ScanProtFilter::default(),
        }
    }
}

impl EngineConfig {
    /// The config can only narrow 64-bit support, never widen past what
    /// the build was compiled with.
    pub fn effective_int64(&self) -> bool {
        self.int64_enabled && cfg!(feature = "int64")
    }

    pub fn from_ron_str(text: &str) -> std::result::Result<EngineConfig, ron::de::Error> {
        ron::de::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane_with_no_file() {
        let config = EngineConfig::default();
        assert_eq!(config.address_width, Width::Width64);
        assert_eq!(config.default_element_type, ElementType::S32);
        assert!(config.scan_protection.read);
        assert!(!config.scan_protection.write);
    }

    #[test]
    fn round_trips_through_ron() {
        let text = "(address_width: Width32, int64_enabled: false, default_element_type: U32, scan_protection: (read: true, write: true, execute: false))";
        let config = EngineConfig::from_ron_str(text).unwrap();
        assert_eq!(config.address_width, Width::Width32);
        assert_eq!(config.default_element_type, ElementType::U32);
        assert!(config.scan_protection.write);
        assert!(!config.int64_enabled);
    }

    #[test]
    fn empty_document_falls_back_to_defaults_via_serde_default() {
        let config = EngineConfig::from_ron_str("()").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn narrowing_never_widens_past_the_compiled_feature() {
        let mut config = EngineConfig::default();
        config.int64_enabled = true;
        // effective_int64 can only be true if the build itself has the feature on.
        assert_eq!(config.effective_int64(), cfg!(feature = "int64"));
    }
}
