//! TOML configuration for one docledger deployment.
//!
//! ```toml
//! [record]
//! preset = "marble"
//!
//! [ledger]
//! rich_queries = true
//!
//! [dispatch]
//! legacy_aliases = true
//! aliases = { byOwner = { op = "query-by-field", bind = ["owner"] } }
//!
//! [logging]
//! filter = "docledger=debug"
//! ```

use crate::{
    dispatch::Alias,
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{ModelError, Preset, RecordModel},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// Config
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub record: RecordSource,
    #[serde(default)]
    pub ledger: LedgerOptions,
    #[serde(default)]
    pub dispatch: DispatchOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Configuration for a built-in preset with every option at its default.
    #[must_use]
    pub fn for_preset(preset: Preset) -> Self {
        Self {
            record: RecordSource::Preset { preset },
            ledger: LedgerOptions::default(),
            dispatch: DispatchOptions::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[must_use]
    pub fn record_model(&self) -> RecordModel {
        self.record.model()
    }

    /// Aliases in effect: preset legacy names first, explicit entries override.
    #[must_use]
    pub fn aliases(&self) -> BTreeMap<String, Alias> {
        let mut aliases = BTreeMap::new();

        if self.dispatch.legacy_aliases
            && let RecordSource::Preset { preset } = &self.record
        {
            for (name, alias) in preset.legacy_aliases() {
                aliases.insert(name.to_string(), alias);
            }
        }
        for (name, alias) in &self.dispatch.aliases {
            aliases.insert(name.clone(), alias.clone());
        }

        aliases
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.record_model().validate()?;

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must be non-empty".into()));
        }
        for (name, alias) in &self.dispatch.aliases {
            if name.is_empty() || alias.op.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "alias '{name}' must name a non-empty operation"
                )));
            }
        }

        Ok(())
    }
}

///
/// RecordSource
/// Either a built-in preset or a full inline model.
///

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RecordSource {
    Preset { preset: Preset },
    Inline(RecordModel),
}

impl RecordSource {
    #[must_use]
    pub fn model(&self) -> RecordModel {
        match self {
            Self::Preset { preset } => preset.model(),
            Self::Inline(model) => model.clone(),
        }
    }
}

///
/// LedgerOptions
///

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerOptions {
    /// Whether the reference ledger answers predicate queries.
    #[serde(default)]
    pub rich_queries: bool,
}

///
/// DispatchOptions
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchOptions {
    #[serde(default = "default_true")]
    pub legacy_aliases: bool,
    #[serde(default)]
    pub aliases: BTreeMap<String, Alias>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            legacy_aliases: true,
            aliases: BTreeMap::new(),
        }
    }
}

const fn default_true() -> bool {
    true
}

///
/// LoggingConfig
///

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid record model: {0}")]
    Model(#[from] ModelError),
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::InvalidArgument, ErrorOrigin::Config, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldKind;

    #[test]
    fn preset_config_uses_defaults() {
        let config = Config::from_toml_str("[record]\npreset = \"student\"\n").unwrap();

        assert!(!config.ledger.rich_queries);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.record_model().kind, "student");
        assert_eq!(config.aliases()["initStudent"], Alias::op("create"));
    }

    #[test]
    fn inline_model_parses() {
        let config = Config::from_toml_str(
            r#"
            [record]
            kind = "asset"
            primary_key = "id"
            fields = [
                { name = "id", type = "text" },
                { name = "owner", type = "text" },
                { name = "value", type = "int", required = false },
            ]
            index = { name = "owner~id", fields = ["owner"] }

            [ledger]
            rich_queries = true
            "#,
        )
        .unwrap();

        let model = config.record_model();
        assert_eq!(model.kind, "asset");
        assert_eq!(model.field("value").map(|f| f.kind), Some(FieldKind::Int));
        assert!(config.ledger.rich_queries);
        assert!(config.aliases().is_empty());
    }

    #[test]
    fn explicit_aliases_override_legacy_names() {
        let config = Config::from_toml_str(
            r#"
            [record]
            preset = "student"

            [dispatch.aliases]
            initStudent = "update"
            "#,
        )
        .unwrap();

        assert_eq!(config.aliases()["initStudent"], Alias::op("update"));
    }

    #[test]
    fn legacy_aliases_can_be_disabled() {
        let config = Config::from_toml_str(
            "[record]\npreset = \"marble\"\n[dispatch]\nlegacy_aliases = false\n",
        )
        .unwrap();

        assert!(config.aliases().is_empty());
    }

    #[test]
    fn invalid_model_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [record]
            kind = "asset"
            primary_key = "missing"
            fields = [{ name = "id", type = "text" }]
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Model(ModelError::MissingPrimaryKey(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml_str("[record\n").unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        assert_eq!(InternalError::from(err).origin, ErrorOrigin::Config);
    }
}
