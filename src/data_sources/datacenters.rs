//! The `fluence_datacenters` data source.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::FluenceApi;
use crate::framework::{
    Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture, Schema,
    encode_model,
};
use crate::models::Datacenter;

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_datacenters";

#[derive(Debug, Serialize)]
struct DatacenterEntry {
    id: String,
    country_code: String,
    city_code: String,
    index: i64,
    tier: i64,
    certifications: Vec<String>,
    slug: String,
}

impl From<Datacenter> for DatacenterEntry {
    fn from(dc: Datacenter) -> Self {
        Self {
            id: dc.id,
            country_code: dc.country_code,
            city_code: dc.city_code,
            index: dc.index,
            tier: dc.tier,
            certifications: dc.certifications,
            slug: dc.slug,
        }
    }
}

#[derive(Debug, Serialize)]
struct DatacentersState {
    datacenters: Vec<DatacenterEntry>,
}

/// Schema of the `fluence_datacenters` data source.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "Fetch list of registered datacenters",
        vec![
            Attribute::computed(
                "datacenters",
                AttributeKind::ListNested(vec![
                    Attribute::computed("id", AttributeKind::String).describe("Datacenter ID"),
                    Attribute::computed("country_code", AttributeKind::String)
                        .describe("Country code"),
                    Attribute::computed("city_code", AttributeKind::String).describe("City code"),
                    Attribute::computed("index", AttributeKind::Int64)
                        .describe("Datacenter index"),
                    Attribute::computed("tier", AttributeKind::Int64).describe("Datacenter tier"),
                    Attribute::computed("certifications", AttributeKind::StringList)
                        .describe("List of datacenter certifications"),
                    Attribute::computed("slug", AttributeKind::String)
                        .describe("Datacenter slug identifier"),
                ]),
            )
            .describe("List of available datacenters"),
        ],
    )
}

/// Lists registered datacenters.
pub struct DatacentersDataSource {
    api: Arc<dyn FluenceApi>,
}

impl DatacentersDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn read_datacenters(&self) -> Result<Value, Diagnostics> {
        let datacenters = self
            .api
            .datacenters()
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("read datacenters", &err)))?;
        encode_model(&DatacentersState {
            datacenters: datacenters.into_iter().map(DatacenterEntry::from).collect(),
        })
    }
}

impl DataSource for DatacentersDataSource {
    fn read(&self, _config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.read_datacenters())
    }
}
