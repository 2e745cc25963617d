//! Provider root: configuration, the shared API handle, and the registry of
//! resources and data sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::FluenceApi;
use crate::client::FluenceClient;
use crate::config::{self, FluenceEnv, ProviderModel};
use crate::data_sources::{
    self, AvailableCountriesDataSource, AvailableHardwareDataSource,
    BasicConfigurationsDataSource, DatacentersDataSource, DefaultImagesDataSource,
    EstimateDepositDataSource, SshKeysDataSource, VmsDataSource,
};
use crate::framework::{DataSource, Diagnostic, Diagnostics, Resource, Schema, decode_model};
use crate::resources::{self, SshKeyResource, VmResource};

/// Type name prefix of every resource and data source.
pub const PROVIDER_TYPE_NAME: &str = "fluence";

/// Registry entry for a managed resource.
#[derive(Clone, Copy, Debug)]
pub struct ResourceFactory {
    /// Resource type name.
    pub type_name: &'static str,
    /// Schema constructor.
    pub schema: fn() -> Schema,
    /// Adapter constructor.
    pub build: fn(Arc<dyn FluenceApi>) -> Box<dyn Resource>,
}

/// Registry entry for a data source.
#[derive(Clone, Copy, Debug)]
pub struct DataSourceFactory {
    /// Data source type name.
    pub type_name: &'static str,
    /// Schema constructor.
    pub schema: fn() -> Schema,
    /// Adapter constructor.
    pub build: fn(Arc<dyn FluenceApi>) -> Box<dyn DataSource>,
}

fn build_vm(api: Arc<dyn FluenceApi>) -> Box<dyn Resource> {
    Box::new(VmResource::new(api))
}

fn build_ssh_key(api: Arc<dyn FluenceApi>) -> Box<dyn Resource> {
    Box::new(SshKeyResource::new(api))
}

fn build_vms(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(VmsDataSource::new(api))
}

fn build_ssh_keys(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(SshKeysDataSource::new(api))
}

fn build_datacenters(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(DatacentersDataSource::new(api))
}

fn build_available_hardware(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(AvailableHardwareDataSource::new(api))
}

fn build_default_images(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(DefaultImagesDataSource::new(api))
}

fn build_available_countries(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(AvailableCountriesDataSource::new(api))
}

fn build_basic_configurations(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(BasicConfigurationsDataSource::new(api))
}

fn build_estimate_deposit(api: Arc<dyn FluenceApi>) -> Box<dyn DataSource> {
    Box::new(EstimateDepositDataSource::new(api))
}

/// Every managed resource the provider serves.
pub static RESOURCES: [ResourceFactory; 2] = [
    ResourceFactory {
        type_name: resources::vm::TYPE_NAME,
        schema: resources::vm::schema,
        build: build_vm,
    },
    ResourceFactory {
        type_name: resources::ssh_key::TYPE_NAME,
        schema: resources::ssh_key::schema,
        build: build_ssh_key,
    },
];

/// Every data source the provider serves.
pub static DATA_SOURCES: [DataSourceFactory; 8] = [
    DataSourceFactory {
        type_name: data_sources::vms::TYPE_NAME,
        schema: data_sources::vms::schema,
        build: build_vms,
    },
    DataSourceFactory {
        type_name: data_sources::ssh_keys::TYPE_NAME,
        schema: data_sources::ssh_keys::schema,
        build: build_ssh_keys,
    },
    DataSourceFactory {
        type_name: data_sources::datacenters::TYPE_NAME,
        schema: data_sources::datacenters::schema,
        build: build_datacenters,
    },
    DataSourceFactory {
        type_name: data_sources::available_hardware::TYPE_NAME,
        schema: data_sources::available_hardware::schema,
        build: build_available_hardware,
    },
    DataSourceFactory {
        type_name: data_sources::default_images::TYPE_NAME,
        schema: data_sources::default_images::schema,
        build: build_default_images,
    },
    DataSourceFactory {
        type_name: data_sources::available_countries::TYPE_NAME,
        schema: data_sources::available_countries::schema,
        build: build_available_countries,
    },
    DataSourceFactory {
        type_name: data_sources::basic_configurations::TYPE_NAME,
        schema: data_sources::basic_configurations::schema,
        build: build_basic_configurations,
    },
    DataSourceFactory {
        type_name: data_sources::estimate_deposit::TYPE_NAME,
        schema: data_sources::estimate_deposit::schema,
        build: build_estimate_deposit,
    },
];

/// Provider identity reported to the host.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Metadata {
    /// Provider type name.
    pub type_name: &'static str,
    /// Provider version.
    pub version: String,
}

/// Full schema surface of the provider.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProviderSchema {
    /// Schema of the provider block.
    pub provider: Schema,
    /// Resource schemas keyed by type name.
    pub resources: BTreeMap<&'static str, Schema>,
    /// Data source schemas keyed by type name.
    pub data_sources: BTreeMap<&'static str, Schema>,
}

fn lookup<'a, T>(
    entries: &'a [T],
    type_name: &str,
    name_of: impl Fn(&T) -> &'static str,
    kind: &str,
) -> Result<&'a T, Diagnostics> {
    entries
        .iter()
        .find(|entry| name_of(entry) == type_name)
        .ok_or_else(|| {
            Diagnostics::from(Diagnostic::error(
                format!("Unknown {kind} Type"),
                format!("The provider does not implement the {kind} type \"{type_name}\"."),
            ))
        })
}

/// The Fluence provider.
///
/// Adapters are built on demand around the API handle created by
/// [`FluenceProvider::configure`].
pub struct FluenceProvider {
    version: String,
    env: FluenceEnv,
    api: Option<Arc<dyn FluenceApi>>,
}

impl FluenceProvider {
    /// Creates an unconfigured provider that falls back to `env` for unset
    /// provider block values.
    #[must_use]
    pub fn new(version: impl Into<String>, env: FluenceEnv) -> Self {
        Self {
            version: version.into(),
            env,
            api: None,
        }
    }

    /// Creates a provider that is already configured with `api`.
    #[must_use]
    pub fn with_api(version: impl Into<String>, api: Arc<dyn FluenceApi>) -> Self {
        Self {
            version: version.into(),
            env: FluenceEnv::default(),
            api: Some(api),
        }
    }

    /// Returns the provider identity.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata {
            type_name: PROVIDER_TYPE_NAME,
            version: self.version.clone(),
        }
    }

    /// Returns the schemas of the provider block, resources and data sources.
    #[must_use]
    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: config::provider_schema(),
            resources: RESOURCES
                .iter()
                .map(|factory| (factory.type_name, (factory.schema)()))
                .collect(),
            data_sources: DATA_SOURCES
                .iter()
                .map(|factory| (factory.type_name, (factory.schema)()))
                .collect(),
        }
    }

    /// Returns `true` once an API handle is available.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api.is_some()
    }

    /// Resolves the provider block and builds the API client.
    ///
    /// # Errors
    ///
    /// Returns attribute diagnostics for unknown or missing settings, and an
    /// error diagnostic when the client cannot be constructed.
    pub fn configure(&mut self, config: Value) -> Result<(), Diagnostics> {
        let model: ProviderModel = decode_model("provider configuration", config)?;
        let resolved = config::resolve(&model, &self.env)?;
        debug!(host = %resolved.host, "configuring Fluence API client");

        let client = FluenceClient::new(&resolved.host, &resolved.api_key).map_err(|err| {
            Diagnostics::from(Diagnostic::error(
                "Unable to Create Fluence API Client",
                format!(
                    "An unexpected error occurred when creating the Fluence API client. \
                     If the error is not clear, please contact the provider developers.\n\n\
                     Fluence Client Error: {err}"
                ),
            ))
        })?;

        info!(host = %client.host(), "configured Fluence API client");
        self.api = Some(Arc::new(client));
        Ok(())
    }

    fn api(&self) -> Result<Arc<dyn FluenceApi>, Diagnostics> {
        self.api.clone().ok_or_else(|| {
            Diagnostics::from(Diagnostic::error(
                "Provider Not Configured",
                "The provider must be configured before resources or data sources are used.",
            ))
        })
    }

    /// Looks up the schema of a resource type.
    ///
    /// # Errors
    ///
    /// Returns an error diagnostic for unknown type names.
    pub fn resource_schema(&self, type_name: &str) -> Result<Schema, Diagnostics> {
        lookup(&RESOURCES, type_name, |f| f.type_name, "Resource").map(|f| (f.schema)())
    }

    /// Builds the adapter for a resource type.
    ///
    /// # Errors
    ///
    /// Returns an error diagnostic for unknown type names or when the
    /// provider is not configured.
    pub fn resource(&self, type_name: &str) -> Result<Box<dyn Resource>, Diagnostics> {
        let factory = lookup(&RESOURCES, type_name, |f| f.type_name, "Resource")?;
        Ok((factory.build)(self.api()?))
    }

    /// Looks up the schema of a data source type.
    ///
    /// # Errors
    ///
    /// Returns an error diagnostic for unknown type names.
    pub fn data_source_schema(&self, type_name: &str) -> Result<Schema, Diagnostics> {
        lookup(&DATA_SOURCES, type_name, |f| f.type_name, "Data Source").map(|f| (f.schema)())
    }

    /// Builds the adapter for a data source type.
    ///
    /// # Errors
    ///
    /// Returns an error diagnostic for unknown type names or when the
    /// provider is not configured.
    pub fn data_source(&self, type_name: &str) -> Result<Box<dyn DataSource>, Diagnostics> {
        let factory = lookup(&DATA_SOURCES, type_name, |f| f.type_name, "Data Source")?;
        Ok((factory.build)(self.api()?))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::ScriptedApi;

    #[test]
    fn schema_lists_every_type() {
        let provider = FluenceProvider::new("test", FluenceEnv::default());
        let schema = provider.schema();

        assert_eq!(
            schema.resources.keys().copied().collect::<Vec<_>>(),
            vec!["fluence_ssh_key", "fluence_vm"]
        );
        assert_eq!(schema.data_sources.len(), 8);
        assert!(schema.data_sources.contains_key("fluence_vm_estimate_deposit"));
        assert!(
            schema
                .provider
                .attribute("api_key")
                .is_some_and(|attribute| attribute.sensitive)
        );
    }

    #[test]
    fn adapters_require_configuration() {
        let provider = FluenceProvider::new("test", FluenceEnv::default());

        let Err(diags) = provider.resource("fluence_vm") else {
            panic!("unconfigured provider must refuse");
        };
        assert!(diags.iter().any(|d| d.summary == "Provider Not Configured"));
    }

    #[test]
    fn unknown_types_are_reported() {
        let provider = FluenceProvider::with_api("test", Arc::new(ScriptedApi::new()));

        let Err(diags) = provider.data_source("fluence_nope") else {
            panic!("unknown type must be rejected");
        };
        assert!(diags.iter().any(|d| d.summary == "Unknown Data Source Type"));
    }

    #[test]
    fn configure_uses_environment_fallbacks() {
        let env = FluenceEnv {
            host: Some(String::from("https://api.example.test")),
            api_key: Some(String::from("env-key")),
        };
        let mut provider = FluenceProvider::new("test", env);

        provider
            .configure(json!({ "host": null, "api_key": null }))
            .unwrap_or_else(|diags| panic!("configure: {diags}"));

        assert!(provider.is_configured());
    }

    #[test]
    fn configure_reports_client_construction_failure() {
        let mut provider = FluenceProvider::new("test", FluenceEnv::default());

        let diags = provider
            .configure(json!({ "host": "not a url", "api_key": "key" }))
            .expect_err("invalid host");

        assert!(
            diags
                .iter()
                .any(|d| d.summary == "Unable to Create Fluence API Client"),
            "{diags}"
        );
        assert!(!provider.is_configured());
    }
}
