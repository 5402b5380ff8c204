//! Build presets: partition quality and node layout.

use serde::{Deserialize, Serialize};

/// Partitioning strategy for the recursive split
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildQuality {
    /// Largest-axis median split, cheapest
    Fast,
    /// Binned SAH split, better trees for static geometry
    #[default]
    High,
}

/// Ordering of emitted node pairs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLayout {
    /// Children pairs follow their parent (preorder)
    #[default]
    DepthFirst,
    /// Level-order pairs, siblings of one level packed together
    BreadthFirst,
}

/// Resolved (quality, layout) pair selecting a build strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPreset {
    pub quality: BuildQuality,
    pub layout: NodeLayout,
}

const PRESET_NAMES: &[(&str, BuildPreset)] = &[
    ("median_fast", BuildPreset { quality: BuildQuality::Fast, layout: NodeLayout::DepthFirst }),
    ("median_fast_bfs", BuildPreset { quality: BuildQuality::Fast, layout: NodeLayout::BreadthFirst }),
    ("sah", BuildPreset { quality: BuildQuality::High, layout: NodeLayout::DepthFirst }),
    ("sah_bfs", BuildPreset { quality: BuildQuality::High, layout: NodeLayout::BreadthFirst }),
];

impl BuildPreset {
    /// Build-once, favor-quality preset used for TLAS construction
    pub fn high_quality() -> Self {
        Self::default()
    }

    /// Resolve a human-readable preset name.
    ///
    /// Unrecognized names fall back to the default preset (`"sah"`).
    pub fn from_name(name: &str) -> Self {
        for (n, preset) in PRESET_NAMES {
            if *n == name {
                return *preset;
            }
        }
        log::warn!("unknown BVH build preset '{name}', using default");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        let p = BuildPreset::from_name("median_fast_bfs");
        assert_eq!(p.quality, BuildQuality::Fast);
        assert_eq!(p.layout, NodeLayout::BreadthFirst);
    }

    #[test]
    fn test_unknown_name_falls_back() {
        assert_eq!(BuildPreset::from_name("no_such_preset"), BuildPreset::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let p = BuildPreset::from_name("sah_bfs");
        let s = serde_json::to_string(&p).unwrap();
        let back: BuildPreset = serde_json::from_str(&s).unwrap();
        assert_eq!(p, back);
    }
}
