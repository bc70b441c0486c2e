//! Console target/version registry.
//!
//! A [`Target`] identifies a specific console variant and the wire protocol
//! version it speaks. `version_string`/`version_parse` are the sole
//! authority for the mapping between a `Target` and its `Rp-Version` header
//! value, no other code in this crate should reimplement that mapping.

/// A specific console variant and its wire protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Ps4V8,
    Ps4V9,
    Ps4V10,
    Ps4Unknown,
    Ps5V1,
    Ps5Unknown,
}

impl Target {
    /// The base (least permissive) target to start negotiation from, given
    /// whether the console is a PS5.
    pub fn base(ps5: bool) -> Self {
        if ps5 { Target::Ps5V1 } else { Target::Ps4V10 }
    }

    pub fn is_ps5(self) -> bool {
        matches!(self, Target::Ps5V1 | Target::Ps5Unknown)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Target::Ps4Unknown | Target::Ps5Unknown)
    }

    /// The canonical `Rp-Version` wire string for this target, or `None` for
    /// the unknown sentinels.
    pub fn version_string(self) -> Option<&'static str> {
        match self {
            Target::Ps4V8 => Some("8.0"),
            Target::Ps4V9 => Some("9.0"),
            Target::Ps4V10 => Some("10.0"),
            Target::Ps5V1 => Some("1.0"),
            Target::Ps4Unknown | Target::Ps5Unknown => None,
        }
    }

    /// Parse a wire version string into the matching `Target`, falling back
    /// to the appropriate unknown sentinel for the requested console family.
    ///
    /// No other mapping is authoritative, callers must not special-case
    /// version strings outside this function.
    pub fn version_parse(version: &str, is_ps5: bool) -> Target {
        if is_ps5 {
            match version {
                "1.0" => Target::Ps5V1,
                _ => Target::Ps5Unknown,
            }
        } else {
            match version {
                "8.0" => Target::Ps4V8,
                "9.0" => Target::Ps4V9,
                "10.0" => Target::Ps4V10,
                _ => Target::Ps4Unknown,
            }
        }
    }
}
