//! Engine settings read from the environment.

use std::str::FromStr;

use crate::embed::{Backend, EmbedParams, Partitioning, WorkerPool};
use crate::error::{Result, WatermarkError};

pub const ENV_BACKEND: &str = "REFMARK_BACKEND";
pub const ENV_PARTITIONING: &str = "REFMARK_PARTITIONING";
pub const ENV_WORKERS: &str = "REFMARK_WORKERS";

/// How embedding calls are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub backend: Backend,
    pub partitioning: Partitioning,
    /// Worker threads; 0 runs inline.
    pub workers: usize,
}

impl EngineConfig {
    /// Reads `REFMARK_BACKEND`, `REFMARK_PARTITIONING` and `REFMARK_WORKERS`,
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            backend: parse_or(&lookup, ENV_BACKEND, defaults.backend)?,
            partitioning: parse_or(&lookup, ENV_PARTITIONING, defaults.partitioning)?,
            workers: parse_or(&lookup, ENV_WORKERS, defaults.workers)?,
        })
    }

    pub fn worker_pool(&self) -> Result<WorkerPool> {
        WorkerPool::new(self.workers)
    }

    pub fn embed_params(&self, alpha: f64, key: bool) -> EmbedParams {
        EmbedParams::new(alpha, key)
            .with_backend(self.backend)
            .with_partitioning(self.partitioning)
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            WatermarkError::InvalidArgument(format!("{key}={raw}: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.backend, Backend::Auto);
        assert_eq!(config.partitioning, Partitioning::Rows);
        assert_eq!(config.workers, 0);
    }

    #[test]
    fn test_values_are_parsed() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_BACKEND, "avx2"),
            (ENV_PARTITIONING, "columns"),
            (ENV_WORKERS, " 4 "),
        ]))
        .unwrap();
        assert_eq!(config.backend, Backend::Vector256);
        assert_eq!(config.partitioning, Partitioning::Columns);
        assert_eq!(config.workers, 4);

        let params = config.embed_params(0.5, false);
        assert_eq!(params.backend, Backend::Vector256);
        assert_eq!(params.partitioning, Partitioning::Columns);
        assert!(!params.key);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let result = EngineConfig::from_lookup(lookup(&[(ENV_WORKERS, "many")]));
        assert!(matches!(result, Err(WatermarkError::InvalidArgument(_))));

        let result = EngineConfig::from_lookup(lookup(&[(ENV_BACKEND, "gpu")]));
        assert!(matches!(result, Err(WatermarkError::InvalidArgument(_))));
    }

    #[test]
    fn test_worker_pool_size_follows_config() {
        let config = EngineConfig {
            workers: 2,
            ..EngineConfig::default()
        };
        assert_eq!(config.worker_pool().unwrap().size(), 2);
    }
}
