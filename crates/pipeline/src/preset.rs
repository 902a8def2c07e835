//! Named encode presets.
//!
//! Every preset is the base record with a handful of fields overridden. The
//! table is fixed at compile time and never mutated; an unknown name resolves
//! to the base record.

use serde::Serialize;
use std::fmt;

/// Output frame size for the scale filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Encoder speed/quality tradeoff, as x264 preset names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderEffort {
    Slow,
    VerySlow,
}

impl EncoderEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderEffort::Slow => "slow",
            EncoderEffort::VerySlow => "veryslow",
        }
    }
}

/// Resolved encode settings for stage 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preset {
    /// Constant rate factor; lower is better quality
    pub quality_factor: u8,
    pub target_resolution: Resolution,
    pub encoder_effort: EncoderEffort,
    pub pixel_format: &'static str,
    pub audio_bitrate_kbps: u32,
    /// Video track timescale of the output container
    pub timestamp_scale: u32,
}

/// Fields a named preset changes relative to the base record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PresetOverride {
    pub quality_factor: Option<u8>,
    pub target_resolution: Option<Resolution>,
    pub encoder_effort: Option<EncoderEffort>,
    pub pixel_format: Option<&'static str>,
    pub audio_bitrate_kbps: Option<u32>,
    pub timestamp_scale: Option<u32>,
}

impl PresetOverride {
    const NONE: Self = Self {
        quality_factor: None,
        target_resolution: None,
        encoder_effort: None,
        pixel_format: None,
        audio_bitrate_kbps: None,
        timestamp_scale: None,
    };
}

impl Preset {
    /// Base fields, except those the override sets.
    pub fn merged(&self, delta: &PresetOverride) -> Preset {
        Preset {
            quality_factor: delta.quality_factor.unwrap_or(self.quality_factor),
            target_resolution: delta.target_resolution.unwrap_or(self.target_resolution),
            encoder_effort: delta.encoder_effort.unwrap_or(self.encoder_effort),
            pixel_format: delta.pixel_format.unwrap_or(self.pixel_format),
            audio_bitrate_kbps: delta.audio_bitrate_kbps.unwrap_or(self.audio_bitrate_kbps),
            timestamp_scale: delta.timestamp_scale.unwrap_or(self.timestamp_scale),
        }
    }
}

/// Vertical 9:16 short-form defaults.
pub const BASE_PRESET: Preset = Preset {
    quality_factor: 20,
    target_resolution: Resolution {
        width: 1080,
        height: 1920,
    },
    encoder_effort: EncoderEffort::Slow,
    pixel_format: "yuv420p",
    audio_bitrate_kbps: 128,
    timestamp_scale: 30000,
};

/// Name used when none is given.
pub const DEFAULT_PRESET_NAME: &str = "tiktok";

const PORTRAIT_4_5: Resolution = Resolution {
    width: 1080,
    height: 1350,
};

const PRESET_TABLE: &[(&str, PresetOverride)] = &[
    ("tiktok", PresetOverride::NONE),
    (
        "highest",
        PresetOverride {
            quality_factor: Some(18),
            encoder_effort: Some(EncoderEffort::VerySlow),
            timestamp_scale: Some(90000),
            ..PresetOverride::NONE
        },
    ),
    (
        "youtube",
        PresetOverride {
            quality_factor: Some(21),
            target_resolution: Some(Resolution {
                width: 1920,
                height: 1080,
            }),
            ..PresetOverride::NONE
        },
    ),
    (
        "facebook",
        PresetOverride {
            quality_factor: Some(22),
            target_resolution: Some(PORTRAIT_4_5),
            ..PresetOverride::NONE
        },
    ),
    (
        "instagram",
        PresetOverride {
            quality_factor: Some(21),
            target_resolution: Some(PORTRAIT_4_5),
            ..PresetOverride::NONE
        },
    ),
];

/// A preset looked up by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPreset {
    /// The name as requested; used in output file names
    pub name: String,
    /// False when the name was unknown and the base record was used
    pub registered: bool,
    pub settings: Preset,
}

/// Lookup over the fixed preset table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetRegistry;

impl PresetRegistry {
    /// Names of all registered presets, in table order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        PRESET_TABLE.iter().map(|(name, _)| *name)
    }

    /// The record every preset inherits from.
    pub fn base() -> Preset {
        BASE_PRESET
    }

    /// Look up a preset by exact name. Unknown names get the base record.
    pub fn lookup(name: &str) -> ResolvedPreset {
        let delta = PRESET_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, delta)| delta);

        ResolvedPreset {
            name: name.to_string(),
            registered: delta.is_some(),
            settings: delta.map_or(BASE_PRESET, |d| BASE_PRESET.merged(d)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_registered_names() {
        let names: Vec<_> = PresetRegistry::names().collect();
        assert_eq!(names, vec!["tiktok", "highest", "youtube", "facebook", "instagram"]);
    }

    #[test]
    fn test_default_name_is_base() {
        let resolved = PresetRegistry::lookup(DEFAULT_PRESET_NAME);
        assert!(resolved.registered);
        assert_eq!(resolved.settings, BASE_PRESET);
    }

    #[test]
    fn test_highest_overrides_only_its_fields() {
        let p = PresetRegistry::lookup("highest").settings;
        assert_eq!(p.quality_factor, 18);
        assert_eq!(p.encoder_effort, EncoderEffort::VerySlow);
        assert_eq!(p.timestamp_scale, 90000);
        assert_eq!(p.target_resolution, BASE_PRESET.target_resolution);
        assert_eq!(p.pixel_format, "yuv420p");
        assert_eq!(p.audio_bitrate_kbps, 128);
    }

    #[test]
    fn test_landscape_and_portrait_presets() {
        let youtube = PresetRegistry::lookup("youtube").settings;
        assert_eq!(youtube.target_resolution.to_string(), "1920:1080");
        assert_eq!(youtube.quality_factor, 21);
        assert_eq!(youtube.encoder_effort, EncoderEffort::Slow);

        let facebook = PresetRegistry::lookup("facebook").settings;
        assert_eq!(facebook.target_resolution.to_string(), "1080:1350");
        assert_eq!(facebook.quality_factor, 22);

        let instagram = PresetRegistry::lookup("instagram").settings;
        assert_eq!(instagram.target_resolution, PORTRAIT_4_5);
        assert_eq!(instagram.quality_factor, 21);
        assert_eq!(instagram.timestamp_scale, 30000);
    }

    #[test]
    fn test_unknown_name_falls_back_to_base() {
        let resolved = PresetRegistry::lookup("vimeo");
        assert!(!resolved.registered);
        assert_eq!(resolved.name, "vimeo");
        assert_eq!(resolved.settings, PresetRegistry::base());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(!PresetRegistry::lookup("YouTube").registered);
    }

    #[test]
    fn test_empty_override_is_identity() {
        assert_eq!(BASE_PRESET.merged(&PresetOverride::default()), BASE_PRESET);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // Any unregistered name resolves to the base record, field for field.
        #[test]
        fn prop_unknown_preset_is_base(name in "[a-zA-Z0-9_-]{0,16}") {
            prop_assume!(PresetRegistry::names().all(|n| n != name));
            let resolved = PresetRegistry::lookup(&name);
            prop_assert!(!resolved.registered);
            prop_assert_eq!(resolved.settings, BASE_PRESET);
            prop_assert_eq!(resolved.name, name);
        }
    }
}
