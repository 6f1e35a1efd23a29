//! Scenario validation.
//!
//! Every numeric field has an inclusive range. The node budget caps the
//! `depth`/`breadth` combinations a single materialization pass may produce.

use crate::error::ConfigError;
use crate::models::Scenario;
use crate::workload::tree;

pub const MAX_DEPTH: u32 = 10;
pub const MAX_BREADTH: u32 = 100;
pub const MAX_HOOKS_PER_KIND: u32 = 20;
pub const MAX_PROVIDERS: u32 = 20;
pub const MAX_CONSUMERS_PER_PROVIDER: u32 = 50;
pub const MAX_HZ: f64 = 240.0;
pub const MAX_DOM_NODES_PER_LEAF: u32 = 200;
pub const MAX_LIST_ROWS: u32 = 20_000;
pub const MAX_DURATION_SEC: u64 = 3600;

/// Upper bound on materialized nodes for one tree pass.
pub const MAX_TREE_NODES: u64 = 250_000;

fn check_max(name: &str, value: u32, max: u32) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::ValidationFailed(format!(
            "{} must be between 0 and {}, got {}",
            name, max, value
        )));
    }
    Ok(())
}

fn check_hz(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=MAX_HZ).contains(&value) {
        return Err(ConfigError::ValidationFailed(format!(
            "{} must be between 0 and {} Hz, got {}",
            name, MAX_HZ, value
        )));
    }
    Ok(())
}

/// Validate tree shape and the node budget.
pub fn validate_tree(scenario: &Scenario) -> Result<(), ConfigError> {
    check_max("tree.depth", scenario.tree.depth, MAX_DEPTH)?;
    check_max("tree.breadth", scenario.tree.breadth, MAX_BREADTH)?;

    let nodes = tree::node_count(scenario.tree.depth, scenario.tree.breadth);
    if nodes > MAX_TREE_NODES {
        return Err(ConfigError::ValidationFailed(format!(
            "Tree of depth {} and breadth {} materializes {} nodes (limit {})",
            scenario.tree.depth, scenario.tree.breadth, nodes, MAX_TREE_NODES
        )));
    }

    Ok(())
}

/// Validate hook counts and context fan-out.
pub fn validate_hooks_and_context(scenario: &Scenario) -> Result<(), ConfigError> {
    let hooks = &scenario.hooks;
    check_max("hooks.state_per_node", hooks.state_per_node, MAX_HOOKS_PER_KIND)?;
    check_max("hooks.effect_per_node", hooks.effect_per_node, MAX_HOOKS_PER_KIND)?;
    check_max(
        "hooks.layout_effect_per_node",
        hooks.layout_effect_per_node,
        MAX_HOOKS_PER_KIND,
    )?;
    check_max("hooks.memo_per_node", hooks.memo_per_node, MAX_HOOKS_PER_KIND)?;
    check_max("hooks.callback_per_node", hooks.callback_per_node, MAX_HOOKS_PER_KIND)?;
    check_max("hooks.ref_per_node", hooks.ref_per_node, MAX_HOOKS_PER_KIND)?;

    check_max("context.providers", scenario.context.providers, MAX_PROVIDERS)?;
    check_max(
        "context.consumers_per_provider",
        scenario.context.consumers_per_provider,
        MAX_CONSUMERS_PER_PROVIDER,
    )?;
    check_hz("context.update_hz", scenario.context.update_hz)?;

    Ok(())
}

/// Validate churn frequencies and the transition ratio.
pub fn validate_churn(scenario: &Scenario) -> Result<(), ConfigError> {
    let churn = &scenario.churn;
    check_hz("churn.prop_hz", churn.prop_hz)?;
    check_hz("churn.state_hz", churn.state_hz)?;
    check_hz("churn.context_hz", churn.context_hz)?;

    if !churn.transition_ratio.is_finite() || !(0.0..=1.0).contains(&churn.transition_ratio) {
        return Err(ConfigError::ValidationFailed(format!(
            "churn.transition_ratio must be between 0 and 1, got {}",
            churn.transition_ratio
        )));
    }

    Ok(())
}

/// Validate payload sizing and run duration.
pub fn validate_payload_and_duration(scenario: &Scenario) -> Result<(), ConfigError> {
    check_max(
        "payload.dom_nodes_per_leaf",
        scenario.payload.dom_nodes_per_leaf,
        MAX_DOM_NODES_PER_LEAF,
    )?;
    check_max("payload.list_rows", scenario.payload.list_rows, MAX_LIST_ROWS)?;

    if scenario.duration_sec == 0 || scenario.duration_sec > MAX_DURATION_SEC {
        return Err(ConfigError::ValidationFailed(format!(
            "duration_sec must be between 1 and {}, got {}",
            MAX_DURATION_SEC, scenario.duration_sec
        )));
    }

    Ok(())
}

/// Run every scenario check.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), ConfigError> {
    validate_tree(scenario)?;
    validate_hooks_and_context(scenario)?;
    validate_churn(scenario)?;
    validate_payload_and_duration(scenario)?;

    if scenario.tree.component_types.is_empty() {
        log::warn!("[CONFIG] Scenario has no leaf component types; leaves render without payload");
    }

    Ok(())
}
