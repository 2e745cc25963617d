//! Provider configuration: the `provider "fluence"` block layered over
//! environment variables loaded via `ortho-config`.

use std::ffi::OsString;
use std::fmt;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::client::DEFAULT_HOST;
use crate::framework::{AttrValue, Attribute, AttributeKind, Diagnostics, Schema};

/// Environment fallbacks for the provider block (`FLUENCE_HOST`,
/// `FLUENCE_API_KEY`).
#[derive(Clone, Debug, Default, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "FLUENCE")]
pub struct FluenceEnv {
    /// API host used when the provider block leaves `host` unset.
    pub host: Option<String>,
    /// API key used when the provider block leaves `api_key` unset.
    pub api_key: Option<String>,
}

impl FluenceEnv {
    /// Loads environment settings without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("terraform-provider-fluence")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

/// Values of the `provider "fluence"` block as sent by the host.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderModel {
    /// Configured API host.
    pub host: AttrValue<String>,
    /// Configured API key.
    pub api_key: AttrValue<String>,
}

/// Connection settings after precedence has been applied.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// API host.
    pub host: String,
    /// API key.
    pub api_key: String,
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Errors raised while loading configuration sources.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Schema of the provider block.
#[must_use]
pub fn provider_schema() -> Schema {
    Schema::new(
        "Interact with the Fluence VM marketplace.",
        vec![
            Attribute::optional("host", AttributeKind::String).describe(
                "The Fluence API host URL. Can also be set via the FLUENCE_HOST environment variable.",
            ),
            Attribute::optional("api_key", AttributeKind::String)
                .sensitive()
                .describe(
                    "The Fluence API key. Can also be set via the FLUENCE_API_KEY environment variable.",
                ),
        ],
    )
}

/// Applies configuration precedence: provider block, then environment, then
/// the default host.
///
/// Unknown values are rejected before any fallback is consulted, and empty
/// results are reported per attribute.
///
/// # Errors
///
/// Returns attribute diagnostics for unknown or missing values.
pub fn resolve(model: &ProviderModel, env: &FluenceEnv) -> Result<ResolvedConfig, Diagnostics> {
    let mut diagnostics = Diagnostics::new();

    if model.host.is_unknown() {
        diagnostics.add_attribute_error(
            "host",
            "Unknown Fluence API Host",
            "The provider cannot create the Fluence API client as there is an unknown \
             configuration value for the Fluence API host. Either target apply the source of \
             the value first, set the value statically in the configuration, or use the \
             FLUENCE_HOST environment variable.",
        );
    }
    if model.api_key.is_unknown() {
        diagnostics.add_attribute_error(
            "api_key",
            "Unknown Fluence API Key",
            "The provider cannot create the Fluence API client as there is an unknown \
             configuration value for the Fluence API key. Either target apply the source of \
             the value first, set the value statically in the configuration, or use the \
             FLUENCE_API_KEY environment variable.",
        );
    }
    if diagnostics.has_error() {
        return Err(diagnostics);
    }

    let host = model.host.known().cloned().unwrap_or_else(|| {
        env.host
            .clone()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned())
    });
    let api_key = model
        .api_key
        .known()
        .or(env.api_key.as_ref())
        .cloned()
        .unwrap_or_default();

    if host.is_empty() {
        diagnostics.add_attribute_error(
            "host",
            "Missing Fluence API Host",
            "The provider cannot create the Fluence API client as there is a missing or empty \
             value for the Fluence API host. Set the host value in the configuration or use the \
             FLUENCE_HOST environment variable. If either is already set, ensure the value is \
             not empty.",
        );
    }
    if api_key.is_empty() {
        diagnostics.add_attribute_error(
            "api_key",
            "Missing Fluence API ApiKey",
            "The provider cannot create the Fluence API client as there is a missing or empty \
             value for the Fluence API key. Set the API key value in the configuration or use \
             the FLUENCE_API_KEY environment variable. If either is already set, ensure the \
             value is not empty.",
        );
    }
    if diagnostics.has_error() {
        return Err(diagnostics);
    }

    Ok(ResolvedConfig { host, api_key })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn env(host: Option<&str>, api_key: Option<&str>) -> FluenceEnv {
        FluenceEnv {
            host: host.map(str::to_owned),
            api_key: api_key.map(str::to_owned),
        }
    }

    fn model(host: AttrValue<String>) -> ProviderModel {
        ProviderModel {
            host,
            api_key: AttrValue::Known(String::from("key")),
        }
    }

    #[rstest]
    #[case(AttrValue::Known(String::from("https://config")), Some("https://env"), "https://config")]
    #[case(AttrValue::Null, Some("https://env"), "https://env")]
    #[case(AttrValue::Null, None, DEFAULT_HOST)]
    #[case(AttrValue::Null, Some(""), DEFAULT_HOST)]
    fn host_precedence(
        #[case] configured: AttrValue<String>,
        #[case] env_host: Option<&str>,
        #[case] expected: &str,
    ) {
        let resolved = resolve(&model(configured), &env(env_host, None))
            .unwrap_or_else(|diags| panic!("resolve: {diags}"));
        assert_eq!(resolved.host, expected);
    }

    #[test]
    fn unknown_host_short_circuits_before_fallbacks() {
        let diags = resolve(&model(AttrValue::Unknown), &env(Some("https://env"), None))
            .expect_err("unknown host must fail");

        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Unknown Fluence API Host"]);
        assert!(diags.iter().all(|d| d.attribute.as_deref() == Some("host")));
    }

    #[test]
    fn api_key_falls_back_to_environment() {
        let resolved = resolve(&ProviderModel::default(), &env(None, Some("env-key")))
            .unwrap_or_else(|diags| panic!("resolve: {diags}"));
        assert_eq!(resolved.api_key, "env-key");
    }

    #[test]
    fn missing_api_key_and_empty_host_are_both_reported() {
        let configured = ProviderModel {
            host: AttrValue::Known(String::new()),
            api_key: AttrValue::Null,
        };

        let diags = resolve(&configured, &FluenceEnv::default()).expect_err("must fail");

        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec!["Missing Fluence API Host", "Missing Fluence API ApiKey"]
        );
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let resolved = ResolvedConfig {
            host: String::from("https://api.fluence.dev"),
            api_key: String::from("super-secret"),
        };
        let rendered = format!("{resolved:?}");
        assert!(!rendered.contains("super-secret"), "leaked key: {rendered}");
    }
}
