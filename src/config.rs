use std::time::Duration;

use crate::error::ConfigError;

/// Schemas whose statements are never explained.
pub const EXCLUDED_SCHEMAS: [&str; 4] = ["mysql", "performance_schema", "sys", "information_schema"];

#[derive(Debug, Clone, PartialEq)]
pub struct ExplainPlansConfig {
    pub collect_interval: Duration,
    /// Fraction of the cached candidates processed per poll, in `(0, 1]`.
    pub per_collect_ratio: f64,
    /// How far back the first digest scan looks.
    pub initial_lookback: Duration,
    /// Added to [`EXCLUDED_SCHEMAS`].
    pub exclude_schemas: Vec<String>,
}

impl Default for ExplainPlansConfig {
    fn default() -> Self {
        Self {
            collect_interval: Duration::from_secs(60),
            per_collect_ratio: 1.0,
            initial_lookback: Duration::from_secs(24 * 60 * 60),
            exclude_schemas: Vec::new(),
        }
    }
}

impl ExplainPlansConfig {
    pub fn with_collect_interval(mut self, collect_interval: Duration) -> Self {
        self.collect_interval = collect_interval;
        self
    }

    pub fn with_per_collect_ratio(mut self, per_collect_ratio: f64) -> Self {
        self.per_collect_ratio = per_collect_ratio;
        self
    }

    pub fn with_initial_lookback(mut self, initial_lookback: Duration) -> Self {
        self.initial_lookback = initial_lookback;
        self
    }

    pub fn with_exclude_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_schemas = schemas.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.per_collect_ratio > 0.0 && self.per_collect_ratio <= 1.0) {
            return Err(ConfigError::InvalidRatio(self.per_collect_ratio));
        }
        if self.collect_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(self.collect_interval));
        }
        if self.exclude_schemas.iter().any(|schema| schema.trim().is_empty()) {
            return Err(ConfigError::EmptySchemaName);
        }
        Ok(())
    }

    /// Built-in exclusions followed by the configured ones, without duplicates.
    pub fn excluded_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = EXCLUDED_SCHEMAS.iter().map(|s| s.to_string()).collect();
        for schema in &self.exclude_schemas {
            if !schemas.iter().any(|known| known == schema) {
                schemas.push(schema.clone());
            }
        }
        schemas
    }

    /// The `('a', 'b')` list used in the digest query's `NOT IN` clause.
    pub fn exclusion_clause(&self) -> String {
        let quoted = self.excluded_schemas()
            .iter()
            .map(|schema| format!("'{}'", schema.replace('\'', "''")))
            .collect::<Vec<_>>();
        format!("({})", quoted.join(", "))
    }
}
