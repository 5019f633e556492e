//! Model router (C11): maps `(task_type, token_estimate, route_override)` to
//! a `(model, max_output_tokens)` route, following `SPEC_FULL.md` section
//! 4.11. Token estimation is shared with the answer orchestrator via
//! `common::tokens`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub model: String,
    pub max_output_tokens: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteThresholds {
    pub small_max: usize,
    pub big_mid_max: usize,
    pub long_context_max: usize,
}

impl Default for RouteThresholds {
    fn default() -> Self {
        Self {
            small_max: 200_000,
            big_mid_max: 400_000,
            long_context_max: 1_000_000,
        }
    }
}

/// A model-name substring and the minimum `max_output_tokens` it requires so
/// a reasoning-heavy model isn't truncated to an unusably small budget.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFloor {
    pub model_pattern: String,
    pub min_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub routes: BTreeMap<String, RouteConfig>,
    pub providers: BTreeMap<String, String>,
    pub default_provider_max_output_tokens: usize,
    pub thresholds: RouteThresholds,
    pub output_floors: Vec<OutputFloor>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert("small-fast".to_string(), RouteConfig { model: "small-fast".to_string(), max_output_tokens: 4_096 });
        routes.insert("general".to_string(), RouteConfig { model: "general".to_string(), max_output_tokens: 4_096 });
        routes.insert("reason-large".to_string(), RouteConfig { model: "reason-large".to_string(), max_output_tokens: 8_192 });
        routes.insert("big-mid".to_string(), RouteConfig { model: "big-mid".to_string(), max_output_tokens: 8_192 });
        routes.insert("long-context".to_string(), RouteConfig { model: "long-context".to_string(), max_output_tokens: 16_384 });
        routes.insert("ultra-long-context".to_string(), RouteConfig { model: "ultra-long-context".to_string(), max_output_tokens: 32_768 });

        Self {
            routes,
            providers: BTreeMap::new(),
            default_provider_max_output_tokens: 4_096,
            thresholds: RouteThresholds::default(),
            output_floors: vec![OutputFloor { model_pattern: "reason".to_string(), min_tokens: 2_048 }],
        }
    }
}

/// Resolves a route for a tool call. `route_override` of `"auto"` or `None`
/// triggers auto-selection; any other value is tried first as a named route,
/// then as a provider alias.
#[must_use]
pub fn get_route_config(
    config: &RouterConfig,
    task_type: &str,
    total_tokens_est: usize,
    route_override: Option<&str>,
) -> RouteConfig {
    let resolved = match route_override {
        Some(name) if name != "auto" => resolve_override(config, name)
            .unwrap_or_else(|| auto_select(config, task_type, total_tokens_est)),
        _ => auto_select(config, task_type, total_tokens_est),
    };
    apply_floor(config, resolved)
}

fn resolve_override(config: &RouterConfig, name: &str) -> Option<RouteConfig> {
    if let Some(route) = config.routes.get(name) {
        return Some(route.clone());
    }
    config.providers.get(name).map(|model| RouteConfig {
        model: model.clone(),
        max_output_tokens: config.default_provider_max_output_tokens,
    })
}

fn auto_select(config: &RouterConfig, task_type: &str, total_tokens_est: usize) -> RouteConfig {
    let name = if total_tokens_est > config.thresholds.long_context_max {
        "ultra-long-context"
    } else if total_tokens_est > config.thresholds.big_mid_max {
        "long-context"
    } else if total_tokens_est > config.thresholds.small_max {
        "big-mid"
    } else {
        match task_type {
            "lookup" | "small_fix" => "small-fast",
            "refactor" | "reason" => "reason-large",
            _ => "general",
        }
    };
    config
        .routes
        .get(name)
        .cloned()
        .unwrap_or_else(|| RouteConfig { model: name.to_string(), max_output_tokens: config.default_provider_max_output_tokens })
}

fn apply_floor(config: &RouterConfig, mut route: RouteConfig) -> RouteConfig {
    for floor in &config.output_floors {
        if route.model.contains(&floor.model_pattern) && route.max_output_tokens < floor.min_tokens {
            route.max_output_tokens = floor.min_tokens;
        }
    }
    route
}

#[cfg(test)]
mod tests {
    use super::{RouterConfig, get_route_config};

    #[test]
    fn auto_selects_by_task_type_below_small_threshold() {
        let config = RouterConfig::default();
        assert_eq!(get_route_config(&config, "lookup", 500, None).model, "small-fast");
        assert_eq!(get_route_config(&config, "refactor", 500, None).model, "reason-large");
        assert_eq!(get_route_config(&config, "other", 500, None).model, "general");
    }

    #[test]
    fn token_threshold_escalation_matches_spec_scenario() {
        let config = RouterConfig::default();
        assert_eq!(get_route_config(&config, "lookup", 500, None).model, "small-fast");
        assert_eq!(get_route_config(&config, "lookup", 250_000, None).model, "big-mid");
        assert_eq!(get_route_config(&config, "lookup", 500_000, None).model, "long-context");
        assert_eq!(get_route_config(&config, "lookup", 1_500_000, None).model, "ultra-long-context");
    }

    #[test]
    fn exact_threshold_selects_higher_tier() {
        let config = RouterConfig::default();
        let at_threshold = get_route_config(&config, "lookup", config.thresholds.small_max + 1, None);
        assert_eq!(at_threshold.model, "big-mid");
    }

    #[test]
    fn named_route_override_wins_over_auto_selection() {
        let config = RouterConfig::default();
        let route = get_route_config(&config, "lookup", 1_500_000, Some("small-fast"));
        assert_eq!(route.model, "small-fast");
    }

    #[test]
    fn unknown_override_falls_back_to_auto_selection() {
        let config = RouterConfig::default();
        let route = get_route_config(&config, "lookup", 500, Some("nonexistent"));
        assert_eq!(route.model, "small-fast");
    }

    #[test]
    fn output_floor_raises_max_tokens_for_matching_model() {
        let mut config = RouterConfig::default();
        config.routes.insert(
            "reason-large".to_string(),
            super::RouteConfig { model: "reason-deep".to_string(), max_output_tokens: 512 },
        );
        let route = get_route_config(&config, "reason", 500, None);
        assert_eq!(route.max_output_tokens, 2_048);
    }
}
