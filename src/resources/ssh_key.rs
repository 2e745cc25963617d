//! The `fluence_ssh_key` resource. The server-assigned fingerprint doubles as
//! the resource identifier.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::api::FluenceApi;
use crate::framework::{
    AttrValue, Attribute, AttributeKind, Diagnostic, Diagnostics, FrameworkFuture, ReadOutcome,
    Resource, Schema, decode_model, encode_model,
};
use crate::models::{AddSshKey, SshKey};

/// Resource type name.
pub const TYPE_NAME: &str = "fluence_ssh_key";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
struct SshKeyModel {
    id: AttrValue<String>,
    name: AttrValue<String>,
    public_key: AttrValue<String>,
    fingerprint: AttrValue<String>,
    algorithm: AttrValue<String>,
    comment: AttrValue<String>,
    active: AttrValue<bool>,
    created_at: AttrValue<String>,
}

impl SshKeyModel {
    fn apply(&mut self, key: SshKey) {
        self.id = AttrValue::Known(key.fingerprint.clone());
        self.name = key.name.into();
        self.public_key = AttrValue::Known(key.public_key);
        self.fingerprint = AttrValue::Known(key.fingerprint);
        self.algorithm = AttrValue::Known(key.algorithm);
        self.comment = AttrValue::Known(key.comment);
        self.active = AttrValue::Known(key.active);
        self.created_at = AttrValue::Known(key.created_at);
    }
}

/// Schema of the `fluence_ssh_key` resource.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "SSH Key resource",
        vec![
            Attribute::computed("id", AttributeKind::String)
                .describe("SSH Key identifier")
                .use_state_for_unknown(),
            Attribute::optional("name", AttributeKind::String)
                .describe("SSH Key name (optional)"),
            Attribute::computed("fingerprint", AttributeKind::String)
                .describe("SSH Key fingerprint"),
            Attribute::computed("algorithm", AttributeKind::String).describe("SSH Key algorithm"),
            Attribute::computed("comment", AttributeKind::String).describe("SSH Key comment"),
            Attribute::computed("active", AttributeKind::Bool)
                .describe("Whether the SSH Key is active"),
            Attribute::computed("created_at", AttributeKind::String)
                .describe("SSH Key creation time"),
            Attribute::required("public_key", AttributeKind::String)
                .sensitive()
                .describe("SSH public key content"),
        ],
    )
}

/// Registers and removes account SSH keys.
pub struct SshKeyResource {
    api: Arc<dyn FluenceApi>,
}

impl SshKeyResource {
    /// Creates the resource around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn create_key(&self, planned: Value) -> Result<Value, Diagnostics> {
        let mut model: SshKeyModel = decode_model("SSH key plan", planned)?;
        let request = AddSshKey {
            name: model.name.known().cloned(),
            public_key: model.public_key.value_str().to_owned(),
        };

        let key = self
            .api
            .create_ssh_key(&request)
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("create SSH key", &err)))?;
        trace!(fingerprint = %key.fingerprint, "created SSH key resource");

        model.apply(key);
        encode_model(&model)
    }

    async fn read_key(&self, state: Value) -> Result<ReadOutcome, Diagnostics> {
        let mut model: SshKeyModel = decode_model("SSH key state", state)?;
        let keys = self
            .api
            .list_ssh_keys()
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("read SSH keys", &err)))?;

        let id = model.id.value_str();
        let Some(key) = keys.into_iter().find(|key| key.fingerprint == id) else {
            return Ok(ReadOutcome::Removed);
        };

        model.apply(key);
        encode_model(&model).map(ReadOutcome::Present)
    }

    async fn delete_key(&self, state: Value) -> Result<(), Diagnostics> {
        let model: SshKeyModel = decode_model("SSH key state", state)?;
        let fingerprint = model
            .fingerprint
            .known()
            .or_else(|| model.id.known())
            .map(String::as_str)
            .unwrap_or_default();

        self.api
            .remove_ssh_key(fingerprint)
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("delete SSH key", &err)))
    }
}

impl Resource for SshKeyResource {
    fn create(&self, planned: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.create_key(planned))
    }

    fn read(&self, state: Value) -> FrameworkFuture<'_, ReadOutcome> {
        Box::pin(self.read_key(state))
    }

    fn update(&self, _prior: Value, _planned: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(async {
            Err::<Value, _>(Diagnostics::from(Diagnostic::error(
                "Update Not Supported",
                "SSH key updates are not currently supported. Please recreate the resource.",
            )))
        })
    }

    fn delete(&self, state: Value) -> FrameworkFuture<'_, ()> {
        Box::pin(self.delete_key(state))
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::test_support::{ApiCall, ScriptedApi, ssh_key};

    const KEY: &str = "ssh-ed25519 AAAAC3Nza me@laptop";

    #[fixture]
    fn api() -> ScriptedApi {
        ScriptedApi::new()
    }

    #[rstest]
    #[tokio::test]
    async fn fingerprint_from_create_drives_read_and_delete(api: ScriptedApi) {
        api.push_create_ssh_key(Ok(ssh_key("SHA256:abc", KEY)));
        api.push_list_ssh_keys(Ok(vec![
            ssh_key("SHA256:other", "ssh-rsa AAAA other"),
            ssh_key("SHA256:abc", KEY),
        ]));
        let resource = SshKeyResource::new(Arc::new(api.clone()));

        let created = resource
            .create(json!({"name": "laptop", "public_key": KEY, "id": null}))
            .await
            .unwrap_or_else(|diags| panic!("create: {diags}"));
        assert_eq!(created.get("id"), Some(&json!("SHA256:abc")));
        assert_eq!(created.get("fingerprint"), Some(&json!("SHA256:abc")));

        let ReadOutcome::Present(refreshed) = resource
            .read(created)
            .await
            .unwrap_or_else(|diags| panic!("read: {diags}"))
        else {
            panic!("key should still exist");
        };
        assert_eq!(refreshed.get("active"), Some(&json!(true)));

        resource
            .delete(refreshed)
            .await
            .unwrap_or_else(|diags| panic!("delete: {diags}"));

        assert_eq!(
            api.invocations().last(),
            Some(&ApiCall::RemoveSshKey(String::from("SHA256:abc")))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn read_removes_missing_key(api: ScriptedApi) {
        api.push_list_ssh_keys(Ok(vec![ssh_key("SHA256:other", KEY)]));
        let resource = SshKeyResource::new(Arc::new(api));

        let outcome = resource
            .read(json!({"id": "SHA256:abc"}))
            .await
            .unwrap_or_else(|diags| panic!("read: {diags}"));

        assert_eq!(outcome, ReadOutcome::Removed);
    }

    #[rstest]
    #[tokio::test]
    async fn update_is_rejected(api: ScriptedApi) {
        let resource = SshKeyResource::new(Arc::new(api.clone()));

        let diags = resource
            .update(json!({"id": "SHA256:abc"}), json!({"id": "SHA256:abc"}))
            .await
            .expect_err("updates are unsupported");

        assert!(
            diags.iter().any(|d| d.summary == "Update Not Supported"),
            "{diags}"
        );
        assert!(api.invocations().is_empty());
    }
}
