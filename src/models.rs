//! Core data types for loadlab.
//!
//! `Scenario` is the shape descriptor consumed by the tree generator, the
//! workload scheduler and the synthetic workload. It is a plain value: the
//! core never validates it (see `config::validator` for the control-surface
//! range checks).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Leaf variant rendered at the bottom of the synthetic tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafKind {
    Text,
    Layout,
    List,
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafKind::Text => write!(f, "text"),
            LeafKind::Layout => write!(f, "layout"),
            LeafKind::List => write!(f, "list"),
        }
    }
}

impl FromStr for LeafKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LeafKind::Text),
            "layout" => Ok(LeafKind::Layout),
            "list" => Ok(LeafKind::List),
            _ => Err(format!("Unknown leaf kind: {}", s)),
        }
    }
}

/// Independent update stream driven by the workload scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Structural churn: the root seed changes and the whole tree re-derives.
    Structural,
    /// Internal-state churn: every node bumps one state slot.
    State,
    /// Shared-context churn: provider values change, consumers re-read.
    Context,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Structural, ChannelKind::State, ChannelKind::Context];
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Structural => write!(f, "structural"),
            ChannelKind::State => write!(f, "state"),
            ChannelKind::Context => write!(f, "context"),
        }
    }
}

/// Tree shape: depth, breadth and the leaf variants to cycle through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub depth: u32,
    pub breadth: u32,
    pub component_types: Vec<LeafKind>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            depth: 2,
            breadth: 3,
            component_types: vec![LeafKind::Text, LeafKind::Layout],
        }
    }
}

/// Simulated per-node hook counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub state_per_node: u32,
    pub effect_per_node: u32,
    pub layout_effect_per_node: u32,
    pub memo_per_node: u32,
    pub callback_per_node: u32,
    pub ref_per_node: u32,
}

impl HooksConfig {
    /// Total hook slots instantiated per node
    pub fn total(&self) -> u32 {
        [
            self.effect_per_node,
            self.layout_effect_per_node,
            self.memo_per_node,
            self.callback_per_node,
            self.ref_per_node,
        ]
        .iter()
        .fold(self.state_per_node, |acc, n| acc.saturating_add(*n))
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        HooksConfig {
            state_per_node: 1,
            effect_per_node: 1,
            layout_effect_per_node: 0,
            memo_per_node: 1,
            callback_per_node: 1,
            ref_per_node: 1,
        }
    }
}

/// Shared-context fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub providers: u32,
    pub consumers_per_provider: u32,
    pub update_hz: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            providers: 1,
            consumers_per_provider: 2,
            update_hz: 2.0,
        }
    }
}

/// Update pressure per channel plus the deferred-lane probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    pub prop_hz: f64,
    pub state_hz: f64,
    pub context_hz: f64,
    /// Probability (0..1) that a tick is submitted to the deferred lane
    pub transition_ratio: f64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        ChurnConfig {
            prop_hz: 2.0,
            state_hz: 2.0,
            context_hz: 1.0,
            transition_ratio: 0.3,
        }
    }
}

/// Leaf payload sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub dom_nodes_per_leaf: u32,
    pub list_rows: u32,
    pub virtualization: bool,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        PayloadConfig {
            dom_nodes_per_leaf: 2,
            list_rows: 200,
            virtualization: true,
        }
    }
}

/// Workload rendering flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadFlags {
    /// Render every pass twice and discard the first result
    pub strict_mode: bool,
}

impl Default for WorkloadFlags {
    fn default() -> Self {
        WorkloadFlags { strict_mode: true }
    }
}

/// Complete scenario description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub tree: TreeConfig,
    pub hooks: HooksConfig,
    pub context: ContextConfig,
    pub churn: ChurnConfig,
    pub payload: PayloadConfig,
    pub flags: WorkloadFlags,
    /// Auto-stop bound in seconds; 0 runs until stopped
    pub duration_sec: u64,
    /// Seed for the lane-selection RNG; entropy when absent
    pub seed: Option<u64>,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            tree: TreeConfig::default(),
            hooks: HooksConfig::default(),
            context: ContextConfig::default(),
            churn: ChurnConfig::default(),
            payload: PayloadConfig::default(),
            flags: WorkloadFlags::default(),
            duration_sec: 60,
            seed: None,
        }
    }
}

impl Scenario {
    /// Frequency driving each scheduler channel.
    ///
    /// The context channel falls back to `context.update_hz` when
    /// `churn.context_hz` is zero, so it is only disabled when both are zero.
    pub fn channel_hz(&self, channel: ChannelKind) -> f64 {
        match channel {
            ChannelKind::Structural => self.churn.prop_hz,
            ChannelKind::State => self.churn.state_hz,
            ChannelKind::Context => {
                if self.churn.context_hz != 0.0 {
                    self.churn.context_hz
                } else {
                    self.context.update_hz
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_matches_reference_values() {
        let scenario = Scenario::default();
        assert_eq!(scenario.tree.depth, 2);
        assert_eq!(scenario.tree.breadth, 3);
        assert_eq!(scenario.tree.component_types, vec![LeafKind::Text, LeafKind::Layout]);
        assert_eq!(scenario.hooks.total(), 5);
        assert_eq!(scenario.churn.transition_ratio, 0.3);
        assert!(scenario.payload.virtualization);
        assert!(scenario.flags.strict_mode);
        assert_eq!(scenario.duration_sec, 60);
        assert!(scenario.seed.is_none());
    }

    #[test]
    fn test_context_channel_falls_back_to_update_hz() {
        let mut scenario = Scenario::default();
        scenario.churn.context_hz = 0.0;
        scenario.context.update_hz = 4.0;
        assert_eq!(scenario.channel_hz(ChannelKind::Context), 4.0);

        scenario.churn.context_hz = 7.0;
        assert_eq!(scenario.channel_hz(ChannelKind::Context), 7.0);

        scenario.churn.context_hz = 0.0;
        scenario.context.update_hz = 0.0;
        assert_eq!(scenario.channel_hz(ChannelKind::Context), 0.0);
    }

    #[test]
    fn test_leaf_kind_parsing() {
        assert_eq!("TEXT".parse::<LeafKind>().unwrap(), LeafKind::Text);
        assert_eq!("list".parse::<LeafKind>().unwrap(), LeafKind::List);
        assert!("grid".parse::<LeafKind>().is_err());
        assert_eq!(LeafKind::Layout.to_string(), "layout");
    }

    #[test]
    fn test_partial_scenario_uses_defaults() {
        let json = r#"{ "tree": { "depth": 4 }, "churn": { "prop_hz": 10 } }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.tree.depth, 4);
        assert_eq!(scenario.tree.breadth, 3);
        assert_eq!(scenario.churn.prop_hz, 10.0);
        assert_eq!(scenario.churn.state_hz, 2.0);
    }

    #[test]
    fn test_hook_total_saturates() {
        let hooks = HooksConfig {
            state_per_node: u32::MAX,
            effect_per_node: u32::MAX,
            ..HooksConfig::default()
        };
        assert_eq!(hooks.total(), u32::MAX);
        assert_eq!(HooksConfig::default().total(), 5);
    }
}
