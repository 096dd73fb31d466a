use serde::{Deserialize, Serialize};

use crate::internal::common::error::RgError;
use crate::internal::common::utils::{format_comma_delimited, window_end};
use crate::internal::policy::{MatcherData, POLICY_NAMES, PruneFilters, SubsystemSelector};
use crate::{Duration, Time};

/// Settings of a [`crate::query::ResourceQuery`], usually read from a TOML file.
///
/// ```toml
/// policy = "low"
/// subsystems = ["containment", "power:supplies_to"]
/// prune_filters = "ALL:core,node:gpu"
/// default_duration = 3600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Name of the match policy, see [`POLICY_NAMES`].
    pub policy: String,
    /// Subsystem selectors; the first one is dominant.
    pub subsystems: Vec<String>,
    pub prune_filters: String,
    /// Used for specifications without a duration.
    pub default_duration: Duration,
    pub max_duration: Duration,
    pub plan_start: Time,
    pub plan_duration: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            policy: "first".to_string(),
            subsystems: vec![crate::DEFAULT_SUBSYSTEM.to_string()],
            prune_filters: "ALL:core".to_string(),
            default_duration: crate::SYSTEM_DEFAULT_DURATION,
            max_duration: crate::SYSTEM_MAX_DURATION,
            plan_start: 0,
            plan_duration: crate::DEFAULT_PLAN_HORIZON,
        }
    }
}

impl QueryConfig {
    pub fn from_toml_str(input: &str) -> crate::Result<Self> {
        let config: QueryConfig = toml::from_str(input)?;
        config.validate()?;
        log::debug!(
            "Loaded query config: policy '{}', subsystems [{}], pruning filters '{}'",
            config.policy,
            format_comma_delimited(&config.subsystems),
            config.prune_filters
        );
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !POLICY_NAMES.contains(&self.policy.as_str()) {
            return Err(RgError::ConfigError(format!(
                "unknown match policy '{}', expected one of: {}",
                self.policy,
                POLICY_NAMES.join(", ")
            )));
        }
        self.matcher_data()?;
        if self.default_duration == 0 || self.max_duration == 0 {
            return Err(RgError::ConfigError("durations must be positive".into()));
        }
        if self.default_duration > self.max_duration {
            return Err(RgError::ConfigError(format!(
                "default duration {} exceeds maximum duration {}",
                self.default_duration, self.max_duration
            )));
        }
        if self.plan_duration == 0 || window_end(self.plan_start, self.plan_duration).is_none() {
            return Err(RgError::ConfigError(format!(
                "invalid planning horizon {}+{}",
                self.plan_start, self.plan_duration
            )));
        }
        Ok(())
    }

    pub fn matcher_data(&self) -> crate::Result<MatcherData> {
        let subsystems = self
            .subsystems
            .iter()
            .map(|s| s.parse::<SubsystemSelector>())
            .collect::<crate::Result<Vec<_>>>()?;
        let filters: PruneFilters = self.prune_filters.parse()?;
        MatcherData::new(subsystems, filters)
    }
}
