use indexmap::IndexMap;
use pacing_core::{DebounceOptions, ThrottleOptions};

use crate::backoff::BackoffOptions;
use crate::types::{PacingError, PolicyConfig, PolicyKind, PolicyRef};

/// Name to [`PolicyRef`] lookup, in configuration order.
#[derive(Clone, Debug)]
pub struct PolicyMap {
    policies: IndexMap<String, PolicyRef>,
}

impl PolicyMap {
    /// Build a [`PolicyMap`], rejecting duplicate names and incomplete policies.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, PacingError> {
        let mut policies = IndexMap::with_capacity(config.policies.len());
        for policy in &config.policies {
            if policies.contains_key(&policy.name) {
                return Err(PacingError::invalid_policy(
                    &policy.name,
                    "duplicate policy name",
                ));
            }
            validate(policy)?;
            policies.insert(policy.name.clone(), policy.clone());
        }

        Ok(PolicyMap { policies })
    }

    /// Retrieve a policy by name.
    pub fn get(&self, name: &str) -> Result<&PolicyRef, PacingError> {
        self.policies
            .get(name)
            .ok_or_else(|| PacingError::policy_not_found(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PolicyRef)> {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn debounce_options(&self, name: &str) -> Result<DebounceOptions, PacingError> {
        let policy = self.get_kind(name, PolicyKind::Debounce)?;
        let mut options = DebounceOptions::new(policy.wait().unwrap_or_default())
            .leading(policy.leading())
            .trailing(policy.trailing());
        options.max_wait = policy.max_wait();
        Ok(options)
    }

    pub fn throttle_options(&self, name: &str) -> Result<ThrottleOptions, PacingError> {
        let policy = self.get_kind(name, PolicyKind::Throttle)?;
        Ok(ThrottleOptions::new(policy.wait().unwrap_or_default())
            .leading(policy.leading())
            .trailing(policy.trailing()))
    }

    /// Backoff options without a retry predicate; attach one with
    /// [`BackoffOptions::retry_if`].
    pub fn backoff_options<E>(&self, name: &str) -> Result<BackoffOptions<E>, PacingError> {
        let policy = self.get_kind(name, PolicyKind::Backoff)?;
        Ok(BackoffOptions {
            delay_factor: policy.delay_factor(),
            randomization_factor: policy.randomization_factor(),
            max_delay: policy.max_delay(),
            max_attempts: policy.max_attempts(),
            retry_if: None,
        })
    }

    fn get_kind(&self, name: &str, expected: PolicyKind) -> Result<&PolicyRef, PacingError> {
        let policy = self.get(name)?;
        if policy.kind != expected {
            return Err(PacingError::PolicyKindMismatch {
                name: name.to_string(),
                expected,
                actual: policy.kind,
            });
        }
        Ok(policy)
    }
}

fn validate(policy: &PolicyRef) -> Result<(), PacingError> {
    match policy.kind {
        PolicyKind::Debounce | PolicyKind::Throttle => {
            if policy.wait_ms.is_none() {
                return Err(PacingError::invalid_policy(
                    &policy.name,
                    format!("{} policy requires `wait_ms`", policy.kind),
                ));
            }
            Ok(())
        }
        PolicyKind::Backoff => {
            let options = BackoffOptions::<()> {
                delay_factor: policy.delay_factor(),
                randomization_factor: policy.randomization_factor(),
                max_delay: policy.max_delay(),
                max_attempts: policy.max_attempts(),
                retry_if: None,
            };
            options
                .policy()
                .validate()
                .map_err(|err| PacingError::invalid_policy(&policy.name, err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(name: &str, kind: PolicyKind) -> PolicyRef {
        PolicyRef {
            name: name.into(),
            kind,
            wait_ms: None,
            leading: None,
            trailing: None,
            max_wait_ms: None,
            delay_factor_ms: None,
            randomization_factor: None,
            max_delay_ms: None,
            max_attempts: None,
        }
    }

    fn map(policies: Vec<PolicyRef>) -> Result<PolicyMap, PacingError> {
        PolicyMap::from_config(&PolicyConfig { policies })
    }

    #[test]
    fn keeps_configuration_order() {
        let map = map(vec![
            PolicyRef {
                wait_ms: Some(10),
                ..policy("b", PolicyKind::Throttle)
            },
            policy("a", PolicyKind::Backoff),
        ])
        .unwrap();

        let names: Vec<&str> = map.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = map(vec![
            policy("fetch", PolicyKind::Backoff),
            policy("fetch", PolicyKind::Backoff),
        ])
        .unwrap_err();
        assert!(matches!(err, PacingError::InvalidPolicy { name, .. } if name == "fetch"));
    }

    #[test]
    fn debounce_requires_wait() {
        let err = map(vec![policy("autosave", PolicyKind::Debounce)]).unwrap_err();
        assert!(err.to_string().contains("wait_ms"), "{err}");
    }

    #[test]
    fn backoff_policy_is_validated() {
        let err = map(vec![PolicyRef {
            max_attempts: Some(0),
            ..policy("fetch", PolicyKind::Backoff)
        }])
        .unwrap_err();
        assert!(err.to_string().contains("max_attempts"), "{err}");
    }

    #[test]
    fn options_apply_kind_defaults() {
        let map = map(vec![
            PolicyRef {
                wait_ms: Some(50),
                ..policy("debounce", PolicyKind::Debounce)
            },
            PolicyRef {
                wait_ms: Some(50),
                ..policy("throttle", PolicyKind::Throttle)
            },
        ])
        .unwrap();

        let debounce = map.debounce_options("debounce").unwrap();
        assert_eq!(debounce, DebounceOptions::new(Duration::from_millis(50)));

        let throttle = map.throttle_options("throttle").unwrap();
        assert_eq!(throttle, ThrottleOptions::new(Duration::from_millis(50)));
        assert!(throttle.leading);
    }

    #[test]
    fn lookups_check_name_and_kind() {
        let map = map(vec![policy("fetch", PolicyKind::Backoff)]).unwrap();

        assert!(matches!(
            map.get("missing"),
            Err(PacingError::PolicyNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            map.debounce_options("fetch"),
            Err(PacingError::PolicyKindMismatch {
                expected: PolicyKind::Debounce,
                actual: PolicyKind::Backoff,
                ..
            })
        ));

        let options = map.backoff_options::<std::io::Error>("fetch").unwrap();
        assert_eq!(options.max_attempts, 8);
        assert_eq!(options.delay_factor, Duration::from_millis(200));
    }
}
