use serde::{Deserialize, Serialize};

use crate::internal::common::error::RgError;
use crate::internal::common::Set;
use crate::internal::graph::SLOT_TYPE;
use crate::internal::jobspec::count::Count;
use crate::{Duration, SYSTEM_DEFAULT_DURATION, SYSTEM_MAX_DURATION};

/// Exclusivity requested for a specification node.
///
/// Serialized as an optional boolean (`null`, `true`, `false`).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Exclusivity {
    #[default]
    Unspecified,
    Exclusive,
    Shared,
}

impl From<Option<bool>> for Exclusivity {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Exclusivity::Unspecified,
            Some(true) => Exclusivity::Exclusive,
            Some(false) => Exclusivity::Shared,
        }
    }
}

impl From<Exclusivity> for Option<bool> {
    fn from(value: Exclusivity) -> Self {
        match value {
            Exclusivity::Unspecified => None,
            Exclusivity::Exclusive => Some(true),
            Exclusivity::Shared => Some(false),
        }
    }
}

/// Pool property that a matched pool has to carry. Without a value only presence is checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyConstraint {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub count: Count,
    #[serde(default)]
    pub exclusive: Exclusivity,
    #[serde(default)]
    pub with: Vec<ResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<PropertyConstraint>,
}

impl ResourceSpec {
    pub fn new(resource_type: &str, count: impl Into<Count>) -> Self {
        ResourceSpec {
            resource_type: resource_type.to_string(),
            count: count.into(),
            exclusive: Exclusivity::Unspecified,
            with: Vec::new(),
            label: None,
            requires: Vec::new(),
        }
    }

    /// Slot of `count` copies of the shape described by `with`.
    pub fn slot(count: impl Into<Count>, with: Vec<ResourceSpec>) -> Self {
        ResourceSpec {
            with,
            ..ResourceSpec::new(SLOT_TYPE, count)
        }
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = Exclusivity::Exclusive;
        self
    }

    pub fn shared(mut self) -> Self {
        self.exclusive = Exclusivity::Shared;
        self
    }

    pub fn child(mut self, child: ResourceSpec) -> Self {
        self.with.push(child);
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn requires(mut self, name: &str, value: Option<&str>) -> Self {
        self.requires.push(PropertyConstraint {
            name: name.to_string(),
            value: value.map(|v| v.to_string()),
        });
        self
    }

    #[inline]
    pub fn is_slot(&self) -> bool {
        self.resource_type == SLOT_TYPE
    }

    pub fn validate(&self) -> crate::Result<()> {
        validate_level(std::slice::from_ref(self), false)
    }
}

fn validate_level(specs: &[ResourceSpec], exclusive_above: bool) -> crate::Result<()> {
    let mut seen: Set<&str> = Set::default();
    for spec in specs {
        if spec.resource_type.is_empty() {
            return Err(RgError::InvalidSpecification(
                "resource type must not be empty".into(),
            ));
        }
        spec.count.validate().map_err(|e| match e {
            RgError::InvalidSpecification(msg) => {
                RgError::InvalidSpecification(format!("{}: {msg}", spec.resource_type))
            }
            e => e,
        })?;
        if !seen.insert(&spec.resource_type) {
            return Err(RgError::InvalidSpecification(format!(
                "resource type '{}' is requested twice at the same level",
                spec.resource_type
            )));
        }
        if exclusive_above && spec.exclusive == Exclusivity::Shared {
            return Err(RgError::InvalidSpecification(format!(
                "'{}' is requested as shared inside an exclusive resource",
                spec.resource_type
            )));
        }
        if spec.is_slot() && spec.with.is_empty() {
            return Err(RgError::InvalidSpecification("slot must not be empty".into()));
        }
        let exclusive = exclusive_above || spec.is_slot() || spec.exclusive == Exclusivity::Exclusive;
        validate_level(&spec.with, exclusive)?;
    }
    Ok(())
}

/// A request: top-level resource specifications and how long they are needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub resources: Vec<ResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

impl JobSpec {
    pub fn new(resources: Vec<ResourceSpec>) -> Self {
        JobSpec {
            resources,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Checks the resource tree and returns the duration the request asks for.
    pub fn validate(&self, default_duration: Duration, max_duration: Duration) -> crate::Result<Duration> {
        if self.resources.is_empty() {
            return Err(RgError::InvalidSpecification(
                "no resources requested".into(),
            ));
        }
        validate_level(&self.resources, false)?;
        let duration = self.duration.unwrap_or(default_duration);
        if duration == 0 || duration > max_duration {
            return Err(RgError::InvalidSpecification(format!(
                "duration {duration} is outside of (0, {max_duration}]"
            )));
        }
        Ok(duration)
    }

    pub fn validate_with_system_defaults(&self) -> crate::Result<Duration> {
        self.validate(SYSTEM_DEFAULT_DURATION, SYSTEM_MAX_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::jobspec::count::CountOperator;

    fn node_with_cores(cores: u32) -> ResourceSpec {
        ResourceSpec::new("node", 1).child(ResourceSpec::new("core", cores))
    }

    #[test]
    fn valid_spec_uses_default_duration() {
        let spec = JobSpec::new(vec![node_with_cores(2)]);
        assert_eq!(spec.validate_with_system_defaults().unwrap(), 43200);
        let spec = spec.with_duration(10);
        assert_eq!(spec.validate_with_system_defaults().unwrap(), 10);
    }

    #[test]
    fn duration_limits() {
        let spec = JobSpec::new(vec![node_with_cores(2)]).with_duration(0);
        assert!(matches!(
            spec.validate_with_system_defaults(),
            Err(RgError::InvalidSpecification(_))
        ));
        let spec = JobSpec::new(vec![node_with_cores(2)]).with_duration(SYSTEM_MAX_DURATION + 1);
        assert!(spec.validate_with_system_defaults().is_err());
    }

    #[test]
    fn rejects_bad_trees() {
        assert!(JobSpec::new(vec![]).validate_with_system_defaults().is_err());
        assert!(node_with_cores(0).validate().is_err());
        assert!(ResourceSpec::slot(1, vec![]).validate().is_err());
        assert!(ResourceSpec::new("", 1).validate().is_err());
        let twice = ResourceSpec::new("node", 1)
            .child(ResourceSpec::new("core", 1))
            .child(ResourceSpec::new("core", 2));
        assert!(twice.validate().is_err());
        let bad_operand = ResourceSpec::new(
            "core",
            Count::range(1, 4).with_operator(CountOperator::Mul, 1),
        );
        assert!(bad_operand.validate().is_err());
    }

    #[test]
    fn shared_inside_exclusive_is_rejected() {
        let spec = ResourceSpec::new("node", 1)
            .exclusive()
            .child(ResourceSpec::new("core", 1).shared());
        assert!(spec.validate().is_err());
        let spec = ResourceSpec::slot(1, vec![ResourceSpec::new("core", 1).shared()]);
        assert!(spec.validate().is_err());
        let spec = ResourceSpec::new("node", 1)
            .shared()
            .child(ResourceSpec::new("core", 1).exclusive());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn deserialize_from_json() {
        let spec: JobSpec = serde_json::from_str(
            r#"{
                "resources": [{
                    "type": "node",
                    "count": {"min": 1},
                    "exclusive": true,
                    "with": [{
                        "type": "slot",
                        "count": {"min": 2, "max": 4},
                        "label": "task",
                        "with": [{"type": "core", "count": 2}]
                    }]
                }],
                "duration": 3600
            }"#,
        )
        .unwrap();
        let node = &spec.resources[0];
        assert_eq!(node.exclusive, Exclusivity::Exclusive);
        assert_eq!(node.count, Count::range(1, u32::MAX));
        let slot = &node.with[0];
        assert!(slot.is_slot());
        assert_eq!(slot.label.as_deref(), Some("task"));
        assert_eq!(slot.count, Count::range(2, 4));
        assert_eq!(slot.with[0].exclusive, Exclusivity::Unspecified);
        assert_eq!(slot.with[0].count, Count::exact(2));
        assert_eq!(spec.validate_with_system_defaults().unwrap(), 3600);
    }
}
