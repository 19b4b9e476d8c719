//! Loader for run configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are attached, with `HIRELOOP__`-prefixed
//! environment variables layered underneath (for example
//! `HIRELOOP__SEARCH__SWITCH_THRESHOLD=10`). String values may reference
//! `${VAR}` placeholders, which are expanded before the typed [`RunConfig`] is
//! materialised and validated.
use config::{Config, ConfigError, Environment, File};
use serde_json::Value;
use std::path::Path;

mod model;

pub use model::{
    AnswerOverride, AnswersConfig, ApplicantProfile, ApplicationConfig, BrowserConfig, FilterConfig,
    LimitsConfig, LlmConfig, LoggingConfig, RetryConfig, RunConfig, SearchConfig, StealthLevel,
    StorageConfig,
};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct HireloopConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for HireloopConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HireloopConfigLoader {
    /// Start with `HIRELOOP__` env overrides; attach files or snippets next.
    ///
    /// ```
    /// use hireloop_config::HireloopConfigLoader;
    ///
    /// let config = HireloopConfigLoader::new()
    ///     .with_yaml_str("search:\n  terms: [\"Rust Engineer\"]")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.search.terms, vec!["Rust Engineer".to_string()]);
    /// assert_eq!(config.search.switch_threshold, 25);
    /// assert_eq!(config.retry.attempts, 3);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("HIRELOOP")
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, e.g. a per-user override.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use hireloop_common::{DatePosted, ExperienceLevel};
    /// use hireloop_config::HireloopConfigLoader;
    ///
    /// let cfg = HireloopConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// search:
    ///   terms: ["Backend Developer"]
    ///   date_posted: "Past week"
    ///   cycle_date_posted: true
    /// filters:
    ///   experience_level: ["Entry level"]
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.search.date_posted, DatePosted::PastWeek);
    /// assert_eq!(cfg.filters.experience_level, vec![ExperienceLevel::EntryLevel]);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder, deserialize the merged sources and validate them.
    ///
    /// `${VAR}` placeholders are expanded before typed deserialization, so
    /// secrets can stay out of the YAML file.
    ///
    /// ```
    /// use hireloop_config::{HireloopConfigLoader, LlmConfig};
    ///
    /// unsafe { std::env::set_var("HIRELOOP_DOC_KEY", "injected-from-env"); }
    ///
    /// let config = HireloopConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// search:
    ///   terms: ["Data Engineer"]
    /// llm:
    ///   provider: "openai"
    ///   model: "gpt-4o-mini"
    ///   api_key: "${HIRELOOP_DOC_KEY}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match config.llm {
    ///     Some(LlmConfig::Openai { api_key, endpoint, .. }) => {
    ///         assert_eq!(api_key, "injected-from-env");
    ///         assert_eq!(endpoint, "https://api.openai.com/v1");
    ///     }
    ///     other => panic!("expected OpenAI configuration, got {other:?}"),
    /// }
    ///
    /// unsafe { std::env::remove_var("HIRELOOP_DOC_KEY"); }
    /// ```
    pub fn load(self) -> Result<RunConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: RunConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        typed
            .validate()
            .map_err(|problems| ConfigError::Message(problems.join("; ")))?;

        Ok(typed)
    }
}
