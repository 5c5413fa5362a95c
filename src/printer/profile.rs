//! # Printer Profiles
//!
//! Hardware specifications for supported Bluetooth LE "cat" printers.
//!
//! Models are grouped into families that share a print head and the same
//! GATT layout. A device is matched to a family by its advertised name.
//!
//! ## Supported Printers
//!
//! | Family | Models | Width (dots) |
//! |--------|--------|--------------|
//! | GB | GB01 GB02 GB03 GB04 | 384 |
//! | MX | MX10 | 384 |
//! | XW | XW001 … XW009 | 384 |
//! | JX | JX001 … JX006 | 384 |
//! | LY | LY01 LY02 LY03 LY10 | 384 |
//! | Misc | M01 PR02 PR07 AI01 GT01 | 384 |
//!
//! ## Usage
//!
//! ```
//! use thermy::printer::profile;
//!
//! let profile = profile::match_name("GB02-1234").unwrap();
//! assert_eq!(profile.paper_width_dots, 384);
//! assert_eq!(profile.width_bytes(), 48);
//! ```

use uuid::Uuid;

/// Expand a 16-bit assigned number into the Bluetooth base UUID
/// `0000xxxx-0000-1000-8000-00805F9B34FB`.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5F9B_34FB)
}

/// GATT services exposed by the printers, in probe order.
pub const SERVICE_UUIDS: &[Uuid] = &[
    uuid_from_u16(0xAE00),
    uuid_from_u16(0xFF00),
    uuid_from_u16(0xAB00),
];

/// Write characteristics, in probe order. Index `i` lives under `SERVICE_UUIDS[i]`.
pub const WRITE_CHARACTERISTIC_UUIDS: &[Uuid] = &[
    uuid_from_u16(0xAE01),
    uuid_from_u16(0xFF02),
    uuid_from_u16(0xAB01),
];

/// # Printer Profile
///
/// Immutable description of one printer family.
///
/// - **model_prefixes**: advertised-name prefixes that select this profile
/// - **paper_width_dots**: print head width in dots (one raster line)
/// - **service_uuids** / **write_characteristic_uuids**: GATT candidates,
///   probed in order until one resolves
#[derive(Debug, PartialEq, Eq)]
pub struct PrinterProfile {
    /// Family name
    pub name: &'static str,

    /// Advertised-name prefixes that select this profile
    pub model_prefixes: &'static [&'static str],

    /// Print head width in dots
    pub paper_width_dots: u16,

    /// Candidate GATT services
    pub service_uuids: &'static [Uuid],

    /// Candidate write characteristics
    pub write_characteristic_uuids: &'static [Uuid],
}

impl PrinterProfile {
    /// Width of one raster line in bytes
    #[inline]
    pub fn width_bytes(&self) -> usize {
        (self.paper_width_dots as usize).div_ceil(8)
    }

    /// Does an advertised name select this profile?
    ///
    /// Matching trims the name and compares prefixes ASCII case-insensitively.
    pub fn matches(&self, advertised_name: &str) -> bool {
        let name = advertised_name.trim();
        self.model_prefixes.iter().any(|prefix| {
            name.len() >= prefix.len()
                && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
        })
    }
}

/// GB series, the most common 58mm cat printers.
pub const GB: PrinterProfile = PrinterProfile {
    name: "GB",
    model_prefixes: &["GB01", "GB02", "GB03", "GB04"],
    paper_width_dots: 384,
    service_uuids: SERVICE_UUIDS,
    write_characteristic_uuids: WRITE_CHARACTERISTIC_UUIDS,
};

/// MX series.
pub const MX: PrinterProfile = PrinterProfile {
    name: "MX",
    model_prefixes: &["MX10"],
    paper_width_dots: 384,
    service_uuids: SERVICE_UUIDS,
    write_characteristic_uuids: WRITE_CHARACTERISTIC_UUIDS,
};

/// XW series.
pub const XW: PrinterProfile = PrinterProfile {
    name: "XW",
    model_prefixes: &[
        "XW001", "XW002", "XW003", "XW004", "XW005", "XW006", "XW007", "XW008", "XW009",
    ],
    paper_width_dots: 384,
    service_uuids: SERVICE_UUIDS,
    write_characteristic_uuids: WRITE_CHARACTERISTIC_UUIDS,
};

/// JX series.
pub const JX: PrinterProfile = PrinterProfile {
    name: "JX",
    model_prefixes: &["JX001", "JX002", "JX003", "JX004", "JX005", "JX006"],
    paper_width_dots: 384,
    service_uuids: SERVICE_UUIDS,
    write_characteristic_uuids: WRITE_CHARACTERISTIC_UUIDS,
};

/// LY series.
pub const LY: PrinterProfile = PrinterProfile {
    name: "LY",
    model_prefixes: &["LY01", "LY02", "LY03", "LY10"],
    paper_width_dots: 384,
    service_uuids: SERVICE_UUIDS,
    write_characteristic_uuids: WRITE_CHARACTERISTIC_UUIDS,
};

/// Remaining models sold under various brands.
pub const MISC: PrinterProfile = PrinterProfile {
    name: "Misc",
    model_prefixes: &["M01", "PR07", "PR02", "AI01", "GT01"],
    paper_width_dots: 384,
    service_uuids: SERVICE_UUIDS,
    write_characteristic_uuids: WRITE_CHARACTERISTIC_UUIDS,
};

/// All known profiles, in match order.
pub const PROFILES: &[&PrinterProfile] = &[&GB, &MX, &XW, &JX, &LY, &MISC];

/// Profile used when the model is not known up front (`--device` without `--model`).
pub const DEFAULT_PROFILE: &PrinterProfile = &GB;

/// Find the profile selected by an advertised device name.
pub fn match_name(advertised_name: &str) -> Option<&'static PrinterProfile> {
    PROFILES.iter().copied().find(|p| p.matches(advertised_name))
}

/// Look up a profile by family name ("GB") or by model name ("GB02").
pub fn by_name(name: &str) -> Option<&'static PrinterProfile> {
    PROFILES
        .iter()
        .copied()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
        .or_else(|| match_name(name))
}

/// List every supported model prefix.
pub fn list_models() -> Vec<&'static str> {
    PROFILES
        .iter()
        .flat_map(|p| p.model_prefixes.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_from_u16() {
        let uuid = uuid_from_u16(0xAE01);
        assert_eq!(
            uuid.to_string().to_uppercase(),
            "0000AE01-0000-1000-8000-00805F9B34FB"
        );
    }

    #[test]
    fn test_match_prefix() {
        assert_eq!(match_name("GB01").map(|p| p.name), Some("GB"));
        assert_eq!(match_name("MX10-ABCD").map(|p| p.name), Some("MX"));
        assert_eq!(match_name("  xw003 ").map(|p| p.name), Some("XW"));
        assert_eq!(match_name("PR02").map(|p| p.name), Some("Misc"));
    }

    #[test]
    fn test_no_match() {
        assert!(match_name("").is_none());
        assert!(match_name("Headphones").is_none());
        // Prefix match, not substring match
        assert!(match_name("My GB01").is_none());
        assert!(match_name("GB0").is_none());
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("ly").map(|p| p.name), Some("LY"));
        assert_eq!(by_name("JX004").map(|p| p.name), Some("JX"));
        assert!(by_name("TSP650II").is_none());
    }

    #[test]
    fn test_profiles_are_consistent() {
        for profile in PROFILES {
            assert_eq!(profile.paper_width_dots % 8, 0, "{}", profile.name);
            assert!(!profile.model_prefixes.is_empty());
            assert!(!profile.write_characteristic_uuids.is_empty());
        }
    }

    #[test]
    fn test_list_models() {
        let models = list_models();
        assert_eq!(models.len(), 29);
        assert!(models.contains(&"GT01"));
    }
}
