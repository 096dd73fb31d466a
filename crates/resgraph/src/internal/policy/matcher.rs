use std::fmt;
use std::str::FromStr;

use crate::internal::common::error::RgError;
use crate::internal::common::Set;

/// Vertex types that carry a subtree aggregate planner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PruneAnchor {
    Any,
    Type(String),
}

/// Pruning filters of one subsystem, written as `anchor:type` pairs separated by commas,
/// e.g. `ALL:core,node:gpu`. Every vertex of the anchor type tracks how many units of
/// the pruned type are free below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneFilters {
    pairs: Vec<(PruneAnchor, String)>,
}

impl PruneFilters {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_pruning_type(&self, resource_type: &str) -> bool {
        self.pairs.iter().any(|(_, t)| t == resource_type)
    }

    /// Types whose aggregates a vertex of the given type tracks, in declaration order.
    pub fn pruning_types_of(&self, anchor_type: &str) -> Vec<&str> {
        let mut seen: Set<&str> = Set::default();
        self.pairs
            .iter()
            .filter(|(anchor, _)| match anchor {
                PruneAnchor::Any => true,
                PruneAnchor::Type(t) => t == anchor_type,
            })
            .map(|(_, t)| t.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }
}

impl FromStr for PruneFilters {
    type Err = RgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pairs = Vec::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((anchor, pruned)) = pair.split_once(':') else {
                return Err(RgError::ConfigError(format!(
                    "pruning filter '{pair}' is not in the form anchor:type"
                )));
            };
            let (anchor, pruned) = (anchor.trim(), pruned.trim());
            if anchor.is_empty() || pruned.is_empty() {
                return Err(RgError::ConfigError(format!(
                    "pruning filter '{pair}' has an empty side"
                )));
            }
            let anchor = if anchor == "ALL" {
                PruneAnchor::Any
            } else {
                PruneAnchor::Type(anchor.to_string())
            };
            pairs.push((anchor, pruned.to_string()));
        }
        Ok(PruneFilters { pairs })
    }
}

impl fmt::Display for PruneFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (anchor, pruned)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match anchor {
                PruneAnchor::Any => write!(f, "ALL:{pruned}")?,
                PruneAnchor::Type(t) => write!(f, "{t}:{pruned}")?,
            }
        }
        Ok(())
    }
}

/// A subsystem taking part in matching, optionally restricted to some relations,
/// written as `name` or `name:rel1|rel2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemSelector {
    pub name: String,
    pub relations: Vec<String>,
}

impl SubsystemSelector {
    pub fn new(name: &str) -> Self {
        SubsystemSelector {
            name: name.to_string(),
            relations: Vec::new(),
        }
    }

    pub fn accepts(&self, relation: &str) -> bool {
        self.relations.is_empty() || self.relations.iter().any(|r| r == relation)
    }
}

impl FromStr for SubsystemSelector {
    type Err = RgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, relations) = match s.split_once(':') {
            Some((name, relations)) => (
                name.trim(),
                relations
                    .split('|')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(|r| r.to_string())
                    .collect(),
            ),
            None => (s.trim(), Vec::new()),
        };
        if name.is_empty() {
            return Err(RgError::ConfigError(format!(
                "subsystem selector '{s}' has no name"
            )));
        }
        Ok(SubsystemSelector {
            name: name.to_string(),
            relations,
        })
    }
}

/// Which subsystems a match walks and which aggregates it maintains.
/// The first subsystem is the dominant one; the rest are auxiliary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherData {
    subsystems: Vec<SubsystemSelector>,
    prune_filters: PruneFilters,
}

impl MatcherData {
    pub fn new(subsystems: Vec<SubsystemSelector>, prune_filters: PruneFilters) -> crate::Result<Self> {
        if subsystems.is_empty() {
            return Err(RgError::ConfigError(
                "at least the dominant subsystem has to be given".into(),
            ));
        }
        {
            let mut names: Set<&str> = Set::default();
            for selector in &subsystems {
                if !names.insert(&selector.name) {
                    return Err(RgError::ConfigError(format!(
                        "subsystem '{}' is listed twice",
                        selector.name
                    )));
                }
            }
        }
        Ok(MatcherData {
            subsystems,
            prune_filters,
        })
    }

    #[inline]
    pub fn dominant(&self) -> &SubsystemSelector {
        &self.subsystems[0]
    }

    pub fn auxiliary(&self) -> &[SubsystemSelector] {
        &self.subsystems[1..]
    }

    pub fn subsystems(&self) -> &[SubsystemSelector] {
        &self.subsystems
    }

    #[inline]
    pub fn prune_filters(&self) -> &PruneFilters {
        &self.prune_filters
    }
}

impl Default for MatcherData {
    fn default() -> Self {
        MatcherData {
            subsystems: vec![SubsystemSelector::new(crate::DEFAULT_SUBSYSTEM)],
            prune_filters: PruneFilters {
                pairs: vec![(PruneAnchor::Any, "core".to_string())],
            },
        }
    }
}
