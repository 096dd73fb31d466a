use std::sync::Arc;

use crate::internal::common::error::RgError;
use crate::internal::policy::{
    FirstMatch, HighIdFirst, LocalityAware, LowIdFirst, MatchPolicy, VariationAware,
};

pub const POLICY_NAMES: [&str; 5] = ["first", "low", "high", "locality", "variation"];

pub fn create_policy(name: &str) -> crate::Result<Arc<dyn MatchPolicy>> {
    let policy: Arc<dyn MatchPolicy> = match name {
        "first" => Arc::new(FirstMatch),
        "low" => Arc::new(LowIdFirst),
        "high" => Arc::new(HighIdFirst),
        "locality" => Arc::new(LocalityAware),
        "variation" => Arc::new(VariationAware),
        _ => {
            return Err(RgError::ConfigError(format!(
                "unknown match policy '{name}', expected one of: {}",
                POLICY_NAMES.join(", ")
            )));
        }
    };
    log::debug!("Match policy '{}' created", policy.name());
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_creates_its_policy() {
        for name in POLICY_NAMES {
            assert_eq!(create_policy(name).unwrap().name(), name);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(
            create_policy("fastest"),
            Err(RgError::ConfigError(_))
        ));
    }
}
