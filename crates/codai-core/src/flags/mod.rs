//! # Feature Flags
//!
//! Flag definitions, a registry holding them, and the rollout evaluator.
//!
//! Evaluation never consults per-user state. A user's bucket is a pure
//! function of `(user_id, flag_name)`, so the same user gets the same answer
//! for as long as the flag definition is unchanged:
//!
//! 1. unknown flag → inactive
//! 2. `enabled = false` → inactive
//! 3. caller's service outside the flag's scope → inactive
//! 4. no rollout percentage, or ≥ 100 → active
//! 5. anonymous caller → inactive
//! 6. `bucket(user_id + name) < rollout_percentage` → active
//!
//! ```rust
//! use codai_core::flags::{FeatureFlag, FlagContext, FlagRegistry, RolloutHash};
//!
//! let registry = FlagRegistry::new("dashboard", RolloutHash::Fnv1a);
//! registry.register(FeatureFlag::new("ai_chat")).unwrap();
//! registry
//!     .register(FeatureFlag::new("beta_features").with_rollout(5))
//!     .unwrap();
//!
//! assert!(registry.is_enabled("ai_chat", &FlagContext::anonymous()));
//! assert!(!registry.is_enabled("beta_features", &FlagContext::anonymous()));
//! assert!(!registry.is_enabled("missing", &FlagContext::for_user("u1")));
//! ```

pub mod rollout;

pub use rollout::{RolloutHash, BUCKET_COUNT};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::config::CodaiConfig;
use crate::error::{CodaiError, Result, ValidationError};

/// A feature flag definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    /// Unique key
    pub name: String,

    pub enabled: bool,

    /// Share of users (0-100) that see the feature; absent means everyone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_percentage: Option<u8>,

    /// Services allowed to see the feature; absent means all of them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FeatureFlag {
    /// An enabled flag with full rollout and no scope
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            rollout_percentage: None,
            services: None,
            description: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_rollout(mut self, percentage: u8) -> Self {
        self.rollout_percentage = Some(percentage);
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.services
            .get_or_insert_with(Vec::new)
            .push(service.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        ValidationError::require_text("name", &self.name)?;
        if let Some(pct) = self.rollout_percentage {
            ValidationError::require_range("rolloutPercentage", f64::from(pct), 0.0, 100.0)?;
        }
        if let Some(services) = &self.services {
            if services.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "services",
                    reason: "scope must name at least one service".to_string(),
                });
            }
            for service in services {
                ValidationError::require_text("services", service)?;
            }
        }
        Ok(())
    }

    /// Whether `service` falls inside this flag's scope
    pub fn in_scope(&self, service: Option<&str>) -> bool {
        match &self.services {
            None => true,
            Some(scope) => service.is_some_and(|s| scope.iter().any(|allowed| allowed == s)),
        }
    }
}

/// Caller context of a flag check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagContext {
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub service: Option<String>,
}

impl FlagContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            service: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// User id, with blank ids treated as anonymous
    fn user(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Caller service, with blank names treated as absent
    fn service(&self) -> Option<&str> {
        self.service.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Why a flag evaluated the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    UnknownFlag,
    Disabled,
    OutOfScope,
    FullRollout,
    Anonymous,
    InBucket,
    OutOfBucket,
}

/// Outcome of one flag check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEvaluation {
    pub flag: String,
    pub active: bool,
    pub reason: EvaluationReason,

    /// The user's bucket, when bucketing happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<u8>,
}

impl FlagEvaluation {
    fn decided(flag: &str, active: bool, reason: EvaluationReason) -> Self {
        Self {
            flag: flag.to_string(),
            active,
            reason,
            bucket: None,
        }
    }
}

/// Evaluate a single flag definition. Pure: no state, no randomness.
///
/// `default_service` stands in for the caller's service when the context
/// names none.
pub fn evaluate_flag(
    name: &str,
    flag: Option<&FeatureFlag>,
    context: &FlagContext,
    default_service: Option<&str>,
    hash: RolloutHash,
) -> FlagEvaluation {
    let Some(flag) = flag else {
        return FlagEvaluation::decided(name, false, EvaluationReason::UnknownFlag);
    };

    if !flag.enabled {
        return FlagEvaluation::decided(name, false, EvaluationReason::Disabled);
    }

    let service = context.service().or(default_service);
    if !flag.in_scope(service) {
        return FlagEvaluation::decided(name, false, EvaluationReason::OutOfScope);
    }

    let percentage = match flag.rollout_percentage {
        Some(pct) if u32::from(pct) < BUCKET_COUNT => pct,
        _ => return FlagEvaluation::decided(name, true, EvaluationReason::FullRollout),
    };

    let Some(user_id) = context.user() else {
        return FlagEvaluation::decided(name, false, EvaluationReason::Anonymous);
    };

    let bucket = hash.bucket(user_id, &flag.name);
    let active = bucket < percentage;
    FlagEvaluation {
        flag: name.to_string(),
        active,
        reason: if active {
            EvaluationReason::InBucket
        } else {
            EvaluationReason::OutOfBucket
        },
        bucket: Some(bucket),
    }
}

#[derive(Deserialize)]
struct FlagFile {
    flags: Vec<FeatureFlag>,
}

/// Registry of flag definitions, evaluated against one service name
#[derive(Debug)]
pub struct FlagRegistry {
    flags: RwLock<HashMap<String, FeatureFlag>>,
    service_name: String,
    hash: RolloutHash,
}

impl FlagRegistry {
    pub fn new(service_name: impl Into<String>, hash: RolloutHash) -> Self {
        Self {
            flags: RwLock::new(HashMap::new()),
            service_name: service_name.into(),
            hash,
        }
    }

    /// Build a registry from configuration: defaults, definitions file, inline definitions
    pub fn from_config(config: &CodaiConfig) -> Result<Self> {
        let registry = Self::new(config.service_name.clone(), config.flags.hash);

        if config.flags.include_defaults {
            for flag in default_flags() {
                registry.register(flag)?;
            }
        }
        if let Some(path) = &config.flags.definitions_path {
            registry.load_from_file(path)?;
        }
        for flag in &config.flags.definitions {
            registry.register(flag.clone())?;
        }

        Ok(registry)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn hash(&self) -> RolloutHash {
        self.hash
    }

    /// Insert or replace a flag, returning the previous definition
    pub fn register(
        &self,
        flag: FeatureFlag,
    ) -> std::result::Result<Option<FeatureFlag>, ValidationError> {
        flag.validate()?;
        let name = flag.name.clone();
        let previous = self.flags.write().insert(name.clone(), flag);
        tracing::info!("Feature flag registered: {}", name);
        Ok(previous)
    }

    pub fn remove(&self, name: &str) -> Option<FeatureFlag> {
        let removed = self.flags.write().remove(name);
        if removed.is_some() {
            tracing::info!("Feature flag removed: {}", name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<FeatureFlag> {
        self.flags.read().get(name).cloned()
    }

    /// All flags sorted by name
    pub fn list(&self) -> Vec<FeatureFlag> {
        let mut flags: Vec<FeatureFlag> = self.flags.read().values().cloned().collect();
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        flags
    }

    pub fn len(&self) -> usize {
        self.flags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Toggle a flag; `false` when the flag is unknown
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.flags.write().get_mut(name) {
            Some(flag) => {
                flag.enabled = enabled;
                tracing::info!("Feature flag {} set enabled={}", name, enabled);
                true
            }
            None => false,
        }
    }

    /// Change a flag's rollout; `Ok(false)` when the flag is unknown
    pub fn set_rollout(
        &self,
        name: &str,
        percentage: Option<u8>,
    ) -> std::result::Result<bool, ValidationError> {
        if let Some(pct) = percentage {
            ValidationError::require_range("rolloutPercentage", f64::from(pct), 0.0, 100.0)?;
        }
        match self.flags.write().get_mut(name) {
            Some(flag) => {
                flag.rollout_percentage = percentage;
                tracing::info!("Feature flag {} rollout set to {:?}", name, percentage);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn evaluate(&self, name: &str, context: &FlagContext) -> FlagEvaluation {
        let flags = self.flags.read();
        let evaluation = evaluate_flag(
            name,
            flags.get(name),
            context,
            Some(&self.service_name),
            self.hash,
        );
        tracing::debug!(
            flag = name,
            active = evaluation.active,
            reason = ?evaluation.reason,
            "flag evaluated"
        );
        evaluation
    }

    pub fn is_enabled(&self, name: &str, context: &FlagContext) -> bool {
        self.evaluate(name, context).active
    }

    /// Names of every flag active for this context, sorted
    pub fn enabled_flags(&self, context: &FlagContext) -> Vec<String> {
        let flags = self.flags.read();
        let mut names: Vec<String> = flags
            .values()
            .filter(|flag| {
                evaluate_flag(
                    &flag.name,
                    Some(flag),
                    context,
                    Some(&self.service_name),
                    self.hash,
                )
                .active
            })
            .map(|flag| flag.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Load definitions from a JSON array or a TOML file with `[[flags]]` tables
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let flags: Vec<FeatureFlag> = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str::<FlagFile>(&content)?.flags,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(CodaiError::Config(format!(
                    "unsupported flag file extension: {}",
                    other.unwrap_or("<none>")
                )))
            }
        };

        for flag in &flags {
            flag.validate()?;
        }

        let count = flags.len();
        let mut registered = self.flags.write();
        for flag in flags {
            registered.insert(flag.name.clone(), flag);
        }
        drop(registered);

        tracing::info!("Loaded {} feature flags from {}", count, path.display());
        Ok(count)
    }

    /// Save definitions as a JSON array
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.list())?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Built-in flag set shipped with every Codai service
pub fn default_flags() -> Vec<FeatureFlag> {
    vec![
        FeatureFlag::new("ai_chat").with_description("AI chat demo pages"),
        FeatureFlag::new("beta_features")
            .with_rollout(5)
            .with_description("Early access to beta dashboard features"),
        FeatureFlag::new("new_dashboard")
            .with_rollout(50)
            .with_service("dashboard")
            .with_service("codai")
            .with_description("Redesigned analytics dashboard"),
        FeatureFlag::new("defi_positions")
            .with_service("wallet")
            .with_description("DeFi position tracking in the wallet app"),
        FeatureFlag::new("mcp_integration")
            .disabled()
            .with_description("Model Context Protocol server connections"),
        FeatureFlag::new("realtime_analytics")
            .with_rollout(25)
            .with_description("Live analytics stream"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FlagRegistry {
        let registry = FlagRegistry::new("codai", RolloutHash::Fnv1a);
        for flag in default_flags() {
            registry.register(flag).unwrap();
        }
        registry
    }

    #[test]
    fn test_unknown_flag_is_inactive() {
        let eval = registry().evaluate("nope", &FlagContext::for_user("u1"));
        assert!(!eval.active);
        assert_eq!(eval.reason, EvaluationReason::UnknownFlag);
    }

    #[test]
    fn test_disabled_wins_over_full_rollout() {
        let flag = FeatureFlag::new("f").with_rollout(100).disabled();
        for user in ["a", "b", "c"] {
            let eval = evaluate_flag(
                "f",
                Some(&flag),
                &FlagContext::for_user(user),
                None,
                RolloutHash::Fnv1a,
            );
            assert!(!eval.active);
            assert_eq!(eval.reason, EvaluationReason::Disabled);
        }
    }

    #[test]
    fn test_full_rollout_includes_anonymous() {
        let flag = FeatureFlag::new("f").with_rollout(100);
        let anonymous = FlagContext::anonymous();
        let eval = evaluate_flag("f", Some(&flag), &anonymous, None, RolloutHash::Fnv1a);
        assert!(eval.active);
        assert_eq!(eval.reason, EvaluationReason::FullRollout);

        let flag = FeatureFlag::new("g");
        let eval = evaluate_flag("g", Some(&flag), &anonymous, None, RolloutHash::Fnv1a);
        assert!(eval.active);
    }

    #[test]
    fn test_partial_rollout_rejects_anonymous() {
        let registry = registry();
        let eval = registry.evaluate("beta_features", &FlagContext::anonymous());
        assert!(!eval.active);
        assert_eq!(eval.reason, EvaluationReason::Anonymous);

        let blank = FlagContext::for_user("   ");
        assert_eq!(
            registry.evaluate("beta_features", &blank).reason,
            EvaluationReason::Anonymous
        );
    }

    #[test]
    fn test_zero_rollout_is_nobody() {
        let flag = FeatureFlag::new("f").with_rollout(0);
        for i in 0..200 {
            let ctx = FlagContext::for_user(format!("user-{i}"));
            assert!(!evaluate_flag("f", Some(&flag), &ctx, None, RolloutHash::Fnv1a).active);
        }
    }

    #[test]
    fn test_service_scope() {
        let registry = registry();
        let user = FlagContext::for_user("user-1");

        // registry's own service is "codai", defi_positions is wallet-only
        assert_eq!(
            registry.evaluate("defi_positions", &user).reason,
            EvaluationReason::OutOfScope
        );
        assert!(registry.is_enabled("defi_positions", &user.clone().with_service("wallet")));

        // no caller service and no fallback cannot satisfy a scope
        let scoped = FeatureFlag::new("x").with_service("wallet");
        let ctx = FlagContext::for_user("u");
        let eval = evaluate_flag("x", Some(&scoped), &ctx, None, RolloutHash::Fnv1a);
        assert_eq!(eval.reason, EvaluationReason::OutOfScope);
    }

    #[test]
    fn test_blank_service_falls_back_to_registry() {
        let registry = FlagRegistry::new("wallet", RolloutHash::Fnv1a);
        for flag in default_flags() {
            registry.register(flag).unwrap();
        }

        let blank = FlagContext::for_user("u1").with_service("");
        let eval = registry.evaluate("defi_positions", &blank);
        assert!(eval.active);
        assert_eq!(eval.reason, EvaluationReason::FullRollout);

        let spaces = FlagContext::for_user("u1").with_service("   ");
        assert!(registry.is_enabled("defi_positions", &spaces));
    }

    #[test]
    fn test_bucket_reported() {
        let registry = registry();
        let eval = registry.evaluate("realtime_analytics", &FlagContext::for_user("user-1"));
        let bucket = eval.bucket.unwrap();
        assert_eq!(bucket, RolloutHash::Fnv1a.bucket("user-1", "realtime_analytics"));
        assert_eq!(eval.active, bucket < 25);
    }

    #[test]
    fn test_beta_features_distribution() {
        let registry = registry();
        let active = (0..1000)
            .map(|i| FlagContext::for_user(format!("user-{i}")))
            .filter(|ctx| registry.is_enabled("beta_features", ctx))
            .count();
        assert!((20..=90).contains(&active), "activated {active} of 1000");
    }

    #[test]
    fn test_register_validates() {
        let registry = FlagRegistry::new("codai", RolloutHash::Fnv1a);
        assert!(registry.register(FeatureFlag::new("")).is_err());
        assert!(registry.register(FeatureFlag::new("f").with_rollout(101)).is_err());

        let mut scoped = FeatureFlag::new("f");
        scoped.services = Some(Vec::new());
        assert!(registry.register(scoped).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let registry = FlagRegistry::new("codai", RolloutHash::Fnv1a);
        assert!(registry.register(FeatureFlag::new("f")).unwrap().is_none());
        let previous = registry.register(FeatureFlag::new("f").disabled()).unwrap();
        assert!(previous.unwrap().enabled);
        assert!(!registry.get("f").unwrap().enabled);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_toggle_and_rollout_changes() {
        let registry = registry();
        assert!(!registry.is_enabled("mcp_integration", &FlagContext::anonymous()));
        assert!(registry.set_enabled("mcp_integration", true));
        assert!(registry.is_enabled("mcp_integration", &FlagContext::anonymous()));
        assert!(!registry.set_enabled("missing", true));

        assert!(registry.set_rollout("beta_features", Some(100)).unwrap());
        assert!(registry.is_enabled("beta_features", &FlagContext::anonymous()));
        assert!(registry.set_rollout("beta_features", Some(120)).is_err());
        assert!(!registry.set_rollout("missing", None).unwrap());
    }

    #[test]
    fn test_enabled_flags_sorted() {
        let registry = registry();
        let names = registry.enabled_flags(&FlagContext::anonymous());
        assert_eq!(names, vec!["ai_chat".to_string()]);
    }

    #[test]
    fn test_list_sorted() {
        let names: Vec<String> = registry().list().into_iter().map(|f| f.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_flag_wire_shape() {
        let flag: FeatureFlag = serde_json::from_str(
            r#"{"name":"beta_features","enabled":true,"rolloutPercentage":5}"#,
        )
        .unwrap();
        assert_eq!(flag.rollout_percentage, Some(5));
        assert!(flag.services.is_none());

        let json = serde_json::to_value(&FeatureFlag::new("x")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "x", "enabled": true}));
    }

    #[test]
    fn test_load_and_save_files() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("flags.toml");
        std::fs::write(
            &toml_path,
            r#"
[[flags]]
name = "wallet_v2"
enabled = true
rolloutPercentage = 10
services = ["wallet"]
"#,
        )
        .unwrap();

        let registry = FlagRegistry::new("wallet", RolloutHash::Polynomial);
        assert_eq!(registry.load_from_file(&toml_path).unwrap(), 1);
        assert_eq!(registry.get("wallet_v2").unwrap().rollout_percentage, Some(10));

        let json_path = dir.path().join("flags.json");
        registry.save_to_file(&json_path).unwrap();

        let reloaded = FlagRegistry::new("wallet", RolloutHash::Polynomial);
        assert_eq!(reloaded.load_from_file(&json_path).unwrap(), 1);
        assert_eq!(reloaded.list(), registry.list());
    }

    #[test]
    fn test_load_rejects_whole_file_on_bad_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "good", "enabled": true},
                {"name": "bad", "enabled": true, "rolloutPercentage": 150}
            ]"#,
        )
        .unwrap();

        let registry = FlagRegistry::new("codai", RolloutHash::Fnv1a);
        let err = registry.load_from_file(&path).unwrap_err();
        assert!(err.as_validation().is_some());
        assert!(registry.is_empty());
        assert!(registry.get("good").is_none());
    }
}
