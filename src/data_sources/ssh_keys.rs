//! The `fluence_ssh_keys` data source.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::FluenceApi;
use crate::framework::{
    Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture, Schema,
    encode_model,
};
use crate::models::SshKey;

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_ssh_keys";

#[derive(Debug, Serialize)]
struct SshKeyEntry {
    name: Option<String>,
    fingerprint: String,
    algorithm: String,
    comment: String,
    public_key: String,
    active: bool,
    created_at: String,
}

impl From<SshKey> for SshKeyEntry {
    fn from(key: SshKey) -> Self {
        Self {
            name: key.name,
            fingerprint: key.fingerprint,
            algorithm: key.algorithm,
            comment: key.comment,
            public_key: key.public_key,
            active: key.active,
            created_at: key.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct SshKeysState {
    ssh_keys: Vec<SshKeyEntry>,
}

/// Schema of the `fluence_ssh_keys` data source.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "Fetches the list of SSH keys.",
        vec![Attribute::computed(
            "ssh_keys",
            AttributeKind::ListNested(vec![
                Attribute::computed("name", AttributeKind::String),
                Attribute::computed("fingerprint", AttributeKind::String),
                Attribute::computed("algorithm", AttributeKind::String),
                Attribute::computed("comment", AttributeKind::String),
                Attribute::computed("public_key", AttributeKind::String),
                Attribute::computed("active", AttributeKind::Bool),
                Attribute::computed("created_at", AttributeKind::String),
            ]),
        )],
    )
}

/// Lists the account's SSH keys.
pub struct SshKeysDataSource {
    api: Arc<dyn FluenceApi>,
}

impl SshKeysDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn read_keys(&self) -> Result<Value, Diagnostics> {
        let keys = self.api.list_ssh_keys().await.map_err(|err| {
            Diagnostics::from(Diagnostic::error(
                "Unable to Read Fluence SSH Keys",
                err.to_string(),
            ))
        })?;
        encode_model(&SshKeysState {
            ssh_keys: keys.into_iter().map(SshKeyEntry::from).collect(),
        })
    }
}

impl DataSource for SshKeysDataSource {
    fn read(&self, _config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.read_keys())
    }
}
