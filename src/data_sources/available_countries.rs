//! The `fluence_available_countries` data source.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::api::FluenceApi;
use crate::framework::{
    Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture, Schema,
};

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_available_countries";

/// Schema of the `fluence_available_countries` data source.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "Fetch available datacenter countries from the marketplace",
        vec![
            Attribute::computed("countries", AttributeKind::StringList)
                .describe("List of available datacenter countries (country codes)"),
        ],
    )
}

/// Lists country codes with available capacity.
pub struct AvailableCountriesDataSource {
    api: Arc<dyn FluenceApi>,
}

impl AvailableCountriesDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn read_countries(&self) -> Result<Value, Diagnostics> {
        let countries = self.api.available_countries().await.map_err(|err| {
            Diagnostics::from(Diagnostic::client_error("read available countries", &err))
        })?;
        debug!(count = countries.len(), ?countries, "retrieved available countries");
        Ok(json!({ "countries": countries }))
    }
}

impl DataSource for AvailableCountriesDataSource {
    fn read(&self, _config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.read_countries())
    }
}
