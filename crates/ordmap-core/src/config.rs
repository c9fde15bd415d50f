//! Optional config from ~/.ordmaprc and ./.ordmaprc (JSON). Overridden by env and CLI.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::workload::DelayRange;

pub const CONFIG_FILE: &str = ".ordmaprc";
pub const ENV_MAX_WORKERS: &str = "ORDMAP_MAX_WORKERS";
pub const ENV_FAILURE_POLICY: &str = "ORDMAP_FAILURE_POLICY";
pub const ENV_DELAY_MS: &str = "ORDMAP_DELAY_MS";

/// Ceiling on per-call pool threads when `max_workers` is unset.
///
/// Tasks are still one per element; beyond this many, tasks queue on the
/// pool. Sized for blocking transforms, not for CPU count.
pub const DEFAULT_MAX_WORKERS: usize = 64;

/// What a run does when a transform fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Return the lowest-index failure once every task has finished.
    #[default]
    FailFast,
    /// Keep successes in place and list every failure.
    CollectAll,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(FailurePolicy::FailFast),
            "collect-all" | "collectall" | "collect_all" => Ok(FailurePolicy::CollectAll),
            other => Err(format!(
                "unknown failure policy '{}' (expected fail-fast or collect-all)",
                other
            )),
        }
    }
}

/// Settings that shape a single mapper.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperConfig {
    /// Upper bound on worker threads for per-call pools. `None` means [`DEFAULT_MAX_WORKERS`].
    pub max_workers: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl MapperConfig {
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), MapError> {
        if self.max_workers == Some(0) {
            return Err(MapError::precondition("max_workers", "must be at least 1"));
        }
        Ok(())
    }

    /// Threads a per-call pool gets for `n` elements.
    pub fn workers_for(&self, n: usize) -> usize {
        self.max_workers
            .unwrap_or(DEFAULT_MAX_WORKERS)
            .min(n)
            .max(1)
    }
}

/// Layered configuration as read from files and environment. Unset fields fall through.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<DelayRange>,
}

impl Config {
    /// Overlay `other` on top of `self`; set fields in `other` win.
    pub fn merge(&mut self, other: Config) {
        if other.max_workers.is_some() {
            self.max_workers = other.max_workers;
        }
        if other.failure_policy.is_some() {
            self.failure_policy = other.failure_policy;
        }
        if other.delay_ms.is_some() {
            self.delay_ms = other.delay_ms;
        }
    }

    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            max_workers: self.max_workers,
            failure_policy: self.failure_policy.unwrap_or_default(),
        }
    }

    pub fn delay(&self) -> DelayRange {
        self.delay_ms.unwrap_or_default()
    }
}

/// Read one config file. Missing file = `None`; unreadable or invalid = error.
pub fn read_config_file(path: &Path) -> Result<Option<Config>, MapError> {
    if !path.is_file() {
        return Ok(None);
    }
    let config_error = |reason: String| -> MapError {
        MapError::Config {
            path: path.display().to_string(),
            reason,
        }
    };
    let s = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    let cfg: Config = serde_json::from_str(&s).map_err(|e| config_error(e.to_string()))?;
    if let Some(delay) = cfg.delay_ms {
        delay.validate().map_err(|e| config_error(e.to_string()))?;
    }
    Ok(Some(cfg))
}

/// Apply `ORDMAP_*` overrides using `lookup` to read variables.
pub fn apply_env_with<F>(cfg: &mut Config, lookup: F) -> Result<(), MapError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_error = |key: &str, reason: String| -> MapError {
        MapError::Config {
            path: format!("env:{}", key),
            reason,
        }
    };
    if let Some(v) = lookup(ENV_MAX_WORKERS) {
        let workers = v
            .trim()
            .parse::<usize>()
            .map_err(|e| env_error(ENV_MAX_WORKERS, format!("'{}': {}", v, e)))?;
        cfg.max_workers = Some(workers);
    }
    if let Some(v) = lookup(ENV_FAILURE_POLICY) {
        let policy = v
            .parse::<FailurePolicy>()
            .map_err(|e| env_error(ENV_FAILURE_POLICY, e))?;
        cfg.failure_policy = Some(policy);
    }
    if let Some(v) = lookup(ENV_DELAY_MS) {
        let delay = v
            .parse::<DelayRange>()
            .map_err(|e| env_error(ENV_DELAY_MS, e.to_string()))?;
        cfg.delay_ms = Some(delay);
    }
    Ok(())
}

/// Load ~/.ordmaprc, then `dir`/.ordmaprc, then environment. Later layers win.
pub fn load_config(dir: &Path) -> Result<Config, MapError> {
    let mut cfg = Config::default();
    for path in config_candidates(dir) {
        if let Some(layer) = read_config_file(&path)? {
            tracing::debug!(path = %path.display(), "loaded config layer");
            cfg.merge(layer);
        }
    }
    apply_env_with(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

fn config_candidates(dir: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(2);
    let local = dir.join(CONFIG_FILE);
    if let Some(home) = dirs::home_dir() {
        let global = home.join(CONFIG_FILE);
        if global != local {
            candidates.push(global);
        }
    }
    candidates.push(local);
    candidates
}

/// Default worker count shown to users when nothing is configured.
pub fn default_worker_hint() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_read_config_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{ "maxWorkers": 4, "failurePolicy": "collect-all", "delayMs": { "min": 5, "max": 10 } }"#,
        )
        .unwrap();

        let cfg = read_config_file(&path).unwrap().unwrap();
        assert_eq!(cfg.max_workers, Some(4));
        assert_eq!(cfg.failure_policy, Some(FailurePolicy::CollectAll));
        assert_eq!(cfg.delay_ms, Some(DelayRange::new(5, 10)));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let td = tempfile::tempdir().unwrap();
        assert!(read_config_file(&td.path().join(CONFIG_FILE)).unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_config_file(&path).unwrap_err();
        assert!(matches!(err, MapError::Config { .. }));
    }

    #[test]
    fn test_inverted_delay_in_file_rejected() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "delayMs": { "min": 20, "max": 10 } }"#).unwrap();
        assert!(read_config_file(&path).is_err());
    }

    #[test]
    fn test_merge_later_wins() {
        let mut base = Config {
            max_workers: Some(2),
            failure_policy: Some(FailurePolicy::CollectAll),
            delay_ms: None,
        };
        base.merge(Config {
            max_workers: Some(8),
            ..Default::default()
        });
        assert_eq!(base.max_workers, Some(8));
        assert_eq!(base.failure_policy, Some(FailurePolicy::CollectAll));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        let env = env_of(&[
            (ENV_MAX_WORKERS, "3"),
            (ENV_FAILURE_POLICY, "collect_all"),
            (ENV_DELAY_MS, "10..20"),
        ]);
        apply_env_with(&mut cfg, env).unwrap();
        assert_eq!(cfg.max_workers, Some(3));
        assert_eq!(cfg.failure_policy, Some(FailurePolicy::CollectAll));
        assert_eq!(cfg.delay(), DelayRange::new(10, 20));
    }

    #[test]
    fn test_bad_env_value() {
        let mut cfg = Config::default();
        let err = apply_env_with(&mut cfg, env_of(&[(ENV_MAX_WORKERS, "many")])).unwrap_err();
        match err {
            MapError::Config { path, .. } => assert_eq!(path, "env:ORDMAP_MAX_WORKERS"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_mapper_config_validation() {
        assert!(MapperConfig::default().validate().is_ok());
        let collect = MapperConfig::default().with_failure_policy(FailurePolicy::CollectAll);
        assert!(collect.validate().is_ok());
        let zero = MapperConfig::default().with_max_workers(0);
        assert!(matches!(
            zero.validate(),
            Err(MapError::Precondition { field: "max_workers", .. })
        ));
    }

    #[test]
    fn test_workers_for() {
        let unset = MapperConfig::default();
        assert_eq!(unset.workers_for(10), 10);
        assert_eq!(unset.workers_for(0), 1);
        assert_eq!(unset.workers_for(DEFAULT_MAX_WORKERS), DEFAULT_MAX_WORKERS);
        assert_eq!(unset.workers_for(100_000), DEFAULT_MAX_WORKERS);

        let wide = MapperConfig::default().with_max_workers(DEFAULT_MAX_WORKERS * 2);
        assert_eq!(wide.workers_for(100_000), DEFAULT_MAX_WORKERS * 2);

        let bounded = MapperConfig::default().with_max_workers(4);
        assert_eq!(bounded.workers_for(10), 4);
        assert_eq!(bounded.workers_for(2), 2);
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("fail-fast".parse::<FailurePolicy>().unwrap(), FailurePolicy::FailFast);
        assert_eq!("Collect-All".parse::<FailurePolicy>().unwrap(), FailurePolicy::CollectAll);
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
