//! The `tfplugin6.Provider` gRPC service and the plugin controller.
//!
//! Every RPC reports failures as diagnostics, never as a gRPC error status.
//! The provider sits behind a read-write lock. Only `ConfigureProvider` takes
//! the write side, and the read side is released before any API call.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Notify, RwLock};
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use super::convert::{attribute_path, diagnostic_messages, schema_message};
use super::dynamic::{DynamicValueError, decode, encode};
use super::proto::controller::{self, grpc_controller_server::GrpcController};
use super::proto::tfplugin6::{self, DynamicValue, ServerCapabilities, provider_server::Provider};
use crate::config::ProviderModel;
use crate::framework::{
    self, DataSource, Diagnostic, Diagnostics, ReadOutcome, Resource, Schema, decode_model,
};
use crate::provider::FluenceProvider;

const CAPABILITIES: ServerCapabilities = ServerCapabilities {
    plan_destroy: false,
    get_provider_schema_optional: false,
    move_resource_state: false,
};

/// Serves the Fluence provider over the Terraform plugin protocol.
pub struct ProviderService {
    provider: Arc<RwLock<FluenceProvider>>,
}

impl ProviderService {
    /// Wraps a provider for serving.
    #[must_use]
    pub fn new(provider: FluenceProvider) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
        }
    }

    async fn resource(&self, type_name: &str) -> Result<(Schema, Box<dyn Resource>), Diagnostics> {
        let provider = self.provider.read().await;
        Ok((
            provider.resource_schema(type_name)?,
            provider.resource(type_name)?,
        ))
    }

    async fn data_source(
        &self,
        type_name: &str,
    ) -> Result<(Schema, Box<dyn DataSource>), Diagnostics> {
        let provider = self.provider.read().await;
        Ok((
            provider.data_source_schema(type_name)?,
            provider.data_source(type_name)?,
        ))
    }

    async fn metadata(&self) -> tfplugin6::get_metadata::Response {
        let schema = self.provider.read().await.schema();
        tfplugin6::get_metadata::Response {
            server_capabilities: Some(CAPABILITIES),
            diagnostics: Vec::new(),
            data_sources: schema
                .data_sources
                .keys()
                .map(|type_name| tfplugin6::get_metadata::DataSourceMetadata {
                    type_name: (*type_name).to_owned(),
                })
                .collect(),
            resources: schema
                .resources
                .keys()
                .map(|type_name| tfplugin6::get_metadata::ResourceMetadata {
                    type_name: (*type_name).to_owned(),
                })
                .collect(),
        }
    }

    async fn provider_schema(&self) -> tfplugin6::get_provider_schema::Response {
        let schema = self.provider.read().await.schema();
        tfplugin6::get_provider_schema::Response {
            provider: Some(schema_message(&schema.provider)),
            resource_schemas: schema
                .resources
                .iter()
                .map(|(type_name, schema)| ((*type_name).to_owned(), schema_message(schema)))
                .collect(),
            data_source_schemas: schema
                .data_sources
                .iter()
                .map(|(type_name, schema)| ((*type_name).to_owned(), schema_message(schema)))
                .collect(),
            diagnostics: Vec::new(),
            provider_meta: None,
            server_capabilities: Some(CAPABILITIES),
        }
    }

    async fn configure(&self, request: tfplugin6::configure_provider::Request) -> Diagnostics {
        let config = match decode(request.config.as_ref()) {
            Ok(config) => config,
            Err(err) => return err.into(),
        };
        match self.provider.write().await.configure(config) {
            Ok(()) => {
                info!(terraform_version = %request.terraform_version, "provider configured");
                Diagnostics::new()
            }
            Err(diagnostics) => diagnostics,
        }
    }

    async fn upgrade(
        &self,
        request: tfplugin6::upgrade_resource_state::Request,
    ) -> Result<tfplugin6::upgrade_resource_state::Response, Diagnostics> {
        let schema = self
            .provider
            .read()
            .await
            .resource_schema(&request.type_name)?;
        let raw = request.raw_state.unwrap_or_default();
        if raw.json.is_empty() && !raw.flatmap.is_empty() {
            return Err(Diagnostic::error(
                "Unsupported State Format",
                "Stored state uses the legacy flatmap format, which this provider cannot read.",
            )
            .into());
        }
        let state = if raw.json.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw.json)
                .map_err(|err| DynamicValueError::Json(err.to_string()))?
        };
        Ok(tfplugin6::upgrade_resource_state::Response {
            upgraded_state: Some(encode(&schema, &state)?),
            diagnostics: Vec::new(),
        })
    }

    async fn read(
        &self,
        request: tfplugin6::read_resource::Request,
    ) -> Result<tfplugin6::read_resource::Response, Diagnostics> {
        let (schema, resource) = self.resource(&request.type_name).await?;
        let state = decode(request.current_state.as_ref())?;
        let new_state = match resource.read(state).await? {
            ReadOutcome::Present(state) => state,
            ReadOutcome::Removed => {
                debug!(type_name = %request.type_name, "resource is gone; dropping it from state");
                Value::Null
            }
        };
        Ok(tfplugin6::read_resource::Response {
            new_state: Some(encode(&schema, &new_state)?),
            diagnostics: Vec::new(),
            private: request.private,
        })
    }

    async fn plan(
        &self,
        request: tfplugin6::plan_resource_change::Request,
    ) -> Result<tfplugin6::plan_resource_change::Response, Diagnostics> {
        let schema = self
            .provider
            .read()
            .await
            .resource_schema(&request.type_name)?;
        let prior = decode(request.prior_state.as_ref())?;
        let proposed = decode(request.proposed_new_state.as_ref())?;
        let config = decode(request.config.as_ref())?;

        let change = framework::plan_resource_change(&schema, &prior, &proposed, &config);
        Ok(tfplugin6::plan_resource_change::Response {
            planned_state: Some(encode(&schema, &change.planned_state)?),
            requires_replace: change
                .requires_replace
                .iter()
                .map(|name| attribute_path(name))
                .collect(),
            planned_private: request.prior_private,
            diagnostics: Vec::new(),
            legacy_type_system: false,
        })
    }

    async fn apply(
        &self,
        request: tfplugin6::apply_resource_change::Request,
    ) -> Result<tfplugin6::apply_resource_change::Response, Diagnostics> {
        let (schema, resource) = self.resource(&request.type_name).await?;
        let prior = decode(request.prior_state.as_ref())?;
        let planned = decode(request.planned_state.as_ref())?;

        let new_state = match (prior.is_null(), planned.is_null()) {
            (true, true) => Value::Null,
            (true, false) => resource.create(planned).await?,
            (false, true) => {
                resource.delete(prior).await?;
                Value::Null
            }
            (false, false) => resource.update(prior, planned).await?,
        };
        Ok(tfplugin6::apply_resource_change::Response {
            new_state: Some(encode(&schema, &new_state)?),
            private: request.planned_private,
            diagnostics: Vec::new(),
            legacy_type_system: false,
        })
    }

    async fn import(
        &self,
        request: tfplugin6::import_resource_state::Request,
    ) -> Result<tfplugin6::import_resource_state::Response, Diagnostics> {
        let (schema, resource) = self.resource(&request.type_name).await?;
        let state = resource.import_state(&request.id)?;
        Ok(tfplugin6::import_resource_state::Response {
            imported_resources: vec![tfplugin6::import_resource_state::ImportedResource {
                type_name: request.type_name,
                state: Some(encode(&schema, &state)?),
                private: Vec::new(),
            }],
            diagnostics: Vec::new(),
        })
    }

    async fn read_data(
        &self,
        request: tfplugin6::read_data_source::Request,
    ) -> Result<tfplugin6::read_data_source::Response, Diagnostics> {
        let (schema, source) = self.data_source(&request.type_name).await?;
        let config = decode(request.config.as_ref())?;
        let state = source.read(config).await?;
        Ok(tfplugin6::read_data_source::Response {
            state: Some(encode(&schema, &state)?),
            diagnostics: Vec::new(),
        })
    }
}

fn validate(schema: Result<Schema, Diagnostics>, config: Option<&DynamicValue>) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    if let Err(lookup) = schema {
        diagnostics.extend(lookup);
    }
    if let Err(err) = decode(config) {
        diagnostics.extend(err.into());
    }
    diagnostics
}

fn check_provider_config(config: Option<&DynamicValue>) -> Diagnostics {
    match decode(config) {
        Ok(config) => decode_model::<ProviderModel>("provider configuration", config)
            .err()
            .unwrap_or_default(),
        Err(err) => err.into(),
    }
}

#[tonic::async_trait]
impl Provider for ProviderService {
    async fn get_metadata(
        &self,
        _request: Request<tfplugin6::get_metadata::Request>,
    ) -> Result<Response<tfplugin6::get_metadata::Response>, Status> {
        Ok(Response::new(self.metadata().await))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<tfplugin6::get_provider_schema::Request>,
    ) -> Result<Response<tfplugin6::get_provider_schema::Response>, Status> {
        Ok(Response::new(self.provider_schema().await))
    }

    async fn validate_provider_config(
        &self,
        request: Request<tfplugin6::validate_provider_config::Request>,
    ) -> Result<Response<tfplugin6::validate_provider_config::Response>, Status> {
        let diagnostics = check_provider_config(request.get_ref().config.as_ref());
        Ok(Response::new(tfplugin6::validate_provider_config::Response {
            diagnostics: diagnostic_messages(&diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<tfplugin6::validate_resource_config::Request>,
    ) -> Result<Response<tfplugin6::validate_resource_config::Response>, Status> {
        let request = request.into_inner();
        let schema = self
            .provider
            .read()
            .await
            .resource_schema(&request.type_name);
        let diagnostics = validate(schema, request.config.as_ref());
        Ok(Response::new(tfplugin6::validate_resource_config::Response {
            diagnostics: diagnostic_messages(&diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<tfplugin6::validate_data_resource_config::Request>,
    ) -> Result<Response<tfplugin6::validate_data_resource_config::Response>, Status> {
        let request = request.into_inner();
        let schema = self
            .provider
            .read()
            .await
            .data_source_schema(&request.type_name);
        let diagnostics = validate(schema, request.config.as_ref());
        Ok(Response::new(
            tfplugin6::validate_data_resource_config::Response {
                diagnostics: diagnostic_messages(&diagnostics),
            },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<tfplugin6::upgrade_resource_state::Request>,
    ) -> Result<Response<tfplugin6::upgrade_resource_state::Response>, Status> {
        let response = self
            .upgrade(request.into_inner())
            .await
            .unwrap_or_else(|diagnostics| tfplugin6::upgrade_resource_state::Response {
                diagnostics: diagnostic_messages(&diagnostics),
                ..Default::default()
            });
        Ok(Response::new(response))
    }

    async fn configure_provider(
        &self,
        request: Request<tfplugin6::configure_provider::Request>,
    ) -> Result<Response<tfplugin6::configure_provider::Response>, Status> {
        let diagnostics = self.configure(request.into_inner()).await;
        Ok(Response::new(tfplugin6::configure_provider::Response {
            diagnostics: diagnostic_messages(&diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<tfplugin6::read_resource::Request>,
    ) -> Result<Response<tfplugin6::read_resource::Response>, Status> {
        let response = self
            .read(request.into_inner())
            .await
            .unwrap_or_else(|diagnostics| tfplugin6::read_resource::Response {
                diagnostics: diagnostic_messages(&diagnostics),
                ..Default::default()
            });
        Ok(Response::new(response))
    }

    async fn plan_resource_change(
        &self,
        request: Request<tfplugin6::plan_resource_change::Request>,
    ) -> Result<Response<tfplugin6::plan_resource_change::Response>, Status> {
        let response = self
            .plan(request.into_inner())
            .await
            .unwrap_or_else(|diagnostics| tfplugin6::plan_resource_change::Response {
                diagnostics: diagnostic_messages(&diagnostics),
                ..Default::default()
            });
        Ok(Response::new(response))
    }

    async fn apply_resource_change(
        &self,
        request: Request<tfplugin6::apply_resource_change::Request>,
    ) -> Result<Response<tfplugin6::apply_resource_change::Response>, Status> {
        let response = self
            .apply(request.into_inner())
            .await
            .unwrap_or_else(|diagnostics| tfplugin6::apply_resource_change::Response {
                diagnostics: diagnostic_messages(&diagnostics),
                ..Default::default()
            });
        Ok(Response::new(response))
    }

    async fn import_resource_state(
        &self,
        request: Request<tfplugin6::import_resource_state::Request>,
    ) -> Result<Response<tfplugin6::import_resource_state::Response>, Status> {
        let response = self
            .import(request.into_inner())
            .await
            .unwrap_or_else(|diagnostics| tfplugin6::import_resource_state::Response {
                diagnostics: diagnostic_messages(&diagnostics),
                ..Default::default()
            });
        Ok(Response::new(response))
    }

    async fn read_data_source(
        &self,
        request: Request<tfplugin6::read_data_source::Request>,
    ) -> Result<Response<tfplugin6::read_data_source::Response>, Status> {
        let response = self
            .read_data(request.into_inner())
            .await
            .unwrap_or_else(|diagnostics| tfplugin6::read_data_source::Response {
                diagnostics: diagnostic_messages(&diagnostics),
                ..Default::default()
            });
        Ok(Response::new(response))
    }

    async fn stop_provider(
        &self,
        _request: Request<tfplugin6::stop_provider::Request>,
    ) -> Result<Response<tfplugin6::stop_provider::Response>, Status> {
        info!("provider stop requested");
        Ok(Response::new(tfplugin6::stop_provider::Response {
            error: String::new(),
        }))
    }
}

/// Answers the plugin client's `Shutdown` call by waking the server's
/// shutdown signal.
pub struct PluginController {
    shutdown: Arc<Notify>,
}

impl PluginController {
    /// Creates a controller that notifies `shutdown`.
    #[must_use]
    pub const fn new(shutdown: Arc<Notify>) -> Self {
        Self { shutdown }
    }
}

#[tonic::async_trait]
impl GrpcController for PluginController {
    async fn shutdown(
        &self,
        _request: Request<controller::Empty>,
    ) -> Result<Response<controller::Empty>, Status> {
        info!("plugin shutdown requested");
        self.shutdown.notify_one();
        Ok(Response::new(controller::Empty {}))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::FluenceEnv;
    use crate::framework::UNKNOWN_VALUE;
    use crate::test_support::{ApiCall, ScriptedApi, ssh_key};

    fn unconfigured() -> ProviderService {
        ProviderService::new(FluenceProvider::new("1.2.3", FluenceEnv::default()))
    }

    fn scripted(api: &ScriptedApi) -> ProviderService {
        ProviderService::new(FluenceProvider::with_api("0.0.0-test", Arc::new(api.clone())))
    }

    fn ssh_key_schema() -> Schema {
        crate::resources::ssh_key::schema()
    }

    fn dynamic(schema: &Schema, value: &Value) -> Option<DynamicValue> {
        Some(encode(schema, value).unwrap_or_else(|err| panic!("encode: {err}")))
    }

    fn value(dynamic: Option<&DynamicValue>) -> Value {
        decode(dynamic).unwrap_or_else(|err| panic!("decode: {err}"))
    }

    fn summaries(diagnostics: &[tfplugin6::Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.summary.as_str()).collect()
    }

    #[tokio::test]
    async fn metadata_lists_every_type_before_configuration() {
        let service = unconfigured();

        let response = service
            .get_metadata(Request::new(tfplugin6::get_metadata::Request {}))
            .await
            .unwrap_or_else(|status| panic!("metadata: {status}"))
            .into_inner();

        let resources: Vec<_> = response.resources.iter().map(|r| r.type_name.as_str()).collect();
        assert_eq!(resources, vec!["fluence_ssh_key", "fluence_vm"]);
        assert_eq!(response.data_sources.len(), 8);
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn provider_schema_marks_api_key_sensitive() {
        let service = unconfigured();

        let response = service
            .get_provider_schema(Request::new(tfplugin6::get_provider_schema::Request {}))
            .await
            .unwrap_or_else(|status| panic!("schema: {status}"))
            .into_inner();

        let block = response
            .provider
            .and_then(|schema| schema.block)
            .unwrap_or_default();
        let api_key = block
            .attributes
            .iter()
            .find(|attribute| attribute.name == "api_key");
        assert!(api_key.is_some_and(|attribute| attribute.sensitive));
        assert!(response.resource_schemas.contains_key("fluence_vm"));
        assert!(
            response
                .data_source_schemas
                .contains_key("fluence_vm_estimate_deposit")
        );
    }

    #[tokio::test]
    async fn configure_reports_missing_api_key() {
        let service = unconfigured();
        let config = dynamic(
            &crate::config::provider_schema(),
            &json!({"host": null, "api_key": null}),
        );

        let response = service
            .configure_provider(Request::new(tfplugin6::configure_provider::Request {
                terraform_version: String::from("1.9.0"),
                config,
            }))
            .await
            .unwrap_or_else(|status| panic!("configure: {status}"))
            .into_inner();

        assert_eq!(
            summaries(&response.diagnostics),
            vec!["Missing Fluence API ApiKey"]
        );
        assert_eq!(
            response.diagnostics.first().and_then(|d| d.attribute.clone()),
            Some(attribute_path("api_key"))
        );
    }

    #[tokio::test]
    async fn reads_before_configure_are_refused() {
        let service = unconfigured();

        let response = service
            .read_data_source(Request::new(tfplugin6::read_data_source::Request {
                type_name: String::from("fluence_vms"),
                config: None,
                provider_meta: None,
            }))
            .await
            .unwrap_or_else(|status| panic!("read: {status}"))
            .into_inner();

        assert_eq!(
            summaries(&response.diagnostics),
            vec!["Provider Not Configured"]
        );
        assert!(response.state.is_none());
    }

    #[tokio::test]
    async fn plan_marks_computed_attributes_unknown_on_create() {
        let api = ScriptedApi::new();
        let service = scripted(&api);
        let config = json!({"name": "laptop", "public_key": "ssh-ed25519 AAAA"});

        let response = service
            .plan_resource_change(Request::new(tfplugin6::plan_resource_change::Request {
                type_name: String::from("fluence_ssh_key"),
                prior_state: dynamic(&ssh_key_schema(), &Value::Null),
                proposed_new_state: dynamic(&ssh_key_schema(), &config),
                config: dynamic(&ssh_key_schema(), &config),
                ..Default::default()
            }))
            .await
            .unwrap_or_else(|status| panic!("plan: {status}"))
            .into_inner();

        let planned = value(response.planned_state.as_ref());
        assert_eq!(planned.get("fingerprint"), Some(&json!(UNKNOWN_VALUE)));
        assert_eq!(planned.get("name"), Some(&json!("laptop")));
        assert!(response.diagnostics.is_empty());
        assert!(api.invocations().is_empty());
    }

    #[tokio::test]
    async fn apply_dispatches_create_and_delete() {
        let api = ScriptedApi::new();
        api.push_create_ssh_key(Ok(ssh_key("SHA256:abc", "ssh-ed25519 AAAA")));
        let service = scripted(&api);
        let schema = ssh_key_schema();

        let created = service
            .apply_resource_change(Request::new(tfplugin6::apply_resource_change::Request {
                type_name: String::from("fluence_ssh_key"),
                prior_state: dynamic(&schema, &Value::Null),
                planned_state: dynamic(&schema, &json!({"public_key": "ssh-ed25519 AAAA"})),
                ..Default::default()
            }))
            .await
            .unwrap_or_else(|status| panic!("create: {status}"))
            .into_inner();
        let state = value(created.new_state.as_ref());
        assert_eq!(state.get("id"), Some(&json!("SHA256:abc")));

        let deleted = service
            .apply_resource_change(Request::new(tfplugin6::apply_resource_change::Request {
                type_name: String::from("fluence_ssh_key"),
                prior_state: dynamic(&schema, &state),
                planned_state: dynamic(&schema, &Value::Null),
                ..Default::default()
            }))
            .await
            .unwrap_or_else(|status| panic!("delete: {status}"))
            .into_inner();

        assert_eq!(value(deleted.new_state.as_ref()), Value::Null);
        assert!(deleted.diagnostics.is_empty());
        assert_eq!(
            api.invocations().last(),
            Some(&ApiCall::RemoveSshKey(String::from("SHA256:abc")))
        );
    }

    #[tokio::test]
    async fn read_of_missing_key_clears_state() {
        let api = ScriptedApi::new();
        api.push_list_ssh_keys(Ok(vec![ssh_key("SHA256:other", "ssh-rsa AAAA")]));
        let service = scripted(&api);

        let response = service
            .read_resource(Request::new(tfplugin6::read_resource::Request {
                type_name: String::from("fluence_ssh_key"),
                current_state: dynamic(&ssh_key_schema(), &json!({"id": "SHA256:gone"})),
                private: b"opaque".to_vec(),
                provider_meta: None,
            }))
            .await
            .unwrap_or_else(|status| panic!("read: {status}"))
            .into_inner();

        assert_eq!(value(response.new_state.as_ref()), Value::Null);
        assert_eq!(response.private, b"opaque".to_vec());
    }

    #[tokio::test]
    async fn import_seeds_identifier_with_null_attributes() {
        let api = ScriptedApi::new();
        let service = scripted(&api);

        let response = service
            .import_resource_state(Request::new(tfplugin6::import_resource_state::Request {
                type_name: String::from("fluence_vm"),
                id: String::from("vm-42"),
            }))
            .await
            .unwrap_or_else(|status| panic!("import: {status}"))
            .into_inner();

        let [imported] = response.imported_resources.as_slice() else {
            panic!("expected one imported resource");
        };
        let state = value(imported.state.as_ref());
        assert_eq!(state.get("id"), Some(&json!("vm-42")));
        assert_eq!(state.get("status"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn upgrade_reencodes_stored_json_state() {
        let service = unconfigured();

        let response = service
            .upgrade_resource_state(Request::new(tfplugin6::upgrade_resource_state::Request {
                type_name: String::from("fluence_ssh_key"),
                version: 0,
                raw_state: Some(tfplugin6::RawState {
                    json: br#"{"id":"SHA256:abc","public_key":"ssh-ed25519 AAAA","retired":1}"#
                        .to_vec(),
                    flatmap: std::collections::HashMap::new(),
                }),
            }))
            .await
            .unwrap_or_else(|status| panic!("upgrade: {status}"))
            .into_inner();

        let state = value(response.upgraded_state.as_ref());
        assert_eq!(state.get("id"), Some(&json!("SHA256:abc")));
        assert_eq!(state.get("fingerprint"), Some(&Value::Null));
        assert!(state.get("retired").is_none());
    }

    #[tokio::test]
    async fn validation_reports_unknown_types_and_bad_payloads() {
        let service = unconfigured();

        let response = service
            .validate_resource_config(Request::new(tfplugin6::validate_resource_config::Request {
                type_name: String::from("fluence_nothing"),
                config: Some(DynamicValue {
                    msgpack: vec![0x81],
                    json: Vec::new(),
                }),
            }))
            .await
            .unwrap_or_else(|status| panic!("validate: {status}"))
            .into_inner();

        assert_eq!(
            summaries(&response.diagnostics),
            vec!["Unknown Resource Type", "Invalid Dynamic Value"]
        );
    }

    #[tokio::test]
    async fn controller_shutdown_wakes_the_server() {
        let shutdown = Arc::new(Notify::new());
        let controller = PluginController::new(Arc::clone(&shutdown));

        controller
            .shutdown(Request::new(controller::Empty {}))
            .await
            .unwrap_or_else(|status| panic!("shutdown: {status}"));

        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown.notified())
            .await
            .unwrap_or_else(|_| panic!("shutdown was not signalled"));
    }
}
