//! The `fluence_basic_configurations` data source.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::api::FluenceApi;
use crate::framework::{
    Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture, Schema,
};

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_basic_configurations";

/// Schema of the `fluence_basic_configurations` data source.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "Fetch available basic VM configurations from the marketplace",
        vec![
            Attribute::computed("configurations", AttributeKind::StringList)
                .describe("List of available basic VM configurations"),
        ],
    )
}

/// Lists named basic configurations.
pub struct BasicConfigurationsDataSource {
    api: Arc<dyn FluenceApi>,
}

impl BasicConfigurationsDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn read_configurations(&self) -> Result<Value, Diagnostics> {
        let configurations = self.api.basic_configurations().await.map_err(|err| {
            Diagnostics::from(Diagnostic::client_error("read basic configurations", &err))
        })?;
        debug!(count = configurations.len(), "retrieved basic configurations");
        Ok(json!({ "configurations": configurations }))
    }
}

impl DataSource for BasicConfigurationsDataSource {
    fn read(&self, _config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.read_configurations())
    }
}
