//! The `fluence_available_hardware` data source.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::api::FluenceApi;
use crate::framework::{
    Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture, Schema,
};

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_available_hardware";

/// Schema of the `fluence_available_hardware` data source.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "Fetch available hardware options from the marketplace",
        vec![
            Attribute::computed(
                "cpu",
                AttributeKind::ListNested(vec![
                    Attribute::computed("architecture", AttributeKind::String)
                        .describe("CPU architecture"),
                    Attribute::computed("manufacturer", AttributeKind::String)
                        .describe("CPU manufacturer"),
                ]),
            )
            .describe("Available CPU hardware options"),
            Attribute::computed(
                "memory",
                AttributeKind::ListNested(vec![
                    Attribute::computed("type", AttributeKind::String).describe("Memory type"),
                    Attribute::computed("generation", AttributeKind::String)
                        .describe("Memory generation"),
                ]),
            )
            .describe("Available memory hardware options"),
            Attribute::computed(
                "storage",
                AttributeKind::ListNested(vec![
                    Attribute::computed("type", AttributeKind::String).describe("Storage type"),
                ]),
            )
            .describe("Available storage hardware options"),
        ],
    )
}

/// Reports the hardware currently offered.
pub struct AvailableHardwareDataSource {
    api: Arc<dyn FluenceApi>,
}

impl AvailableHardwareDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn read_hardware(&self) -> Result<Value, Diagnostics> {
        let hardware = self.api.available_hardware().await.map_err(|err| {
            Diagnostics::from(Diagnostic::client_error("read available hardware", &err))
        })?;
        debug!(
            cpu_count = hardware.cpu.len(),
            memory_count = hardware.memory.len(),
            storage_count = hardware.storage.len(),
            "retrieved available hardware"
        );

        let cpu: Vec<Value> = hardware
            .cpu
            .into_iter()
            .map(|cpu| json!({ "architecture": cpu.architecture, "manufacturer": cpu.manufacturer }))
            .collect();
        let memory: Vec<Value> = hardware
            .memory
            .into_iter()
            .map(|mem| json!({ "type": mem.memory_type, "generation": mem.generation }))
            .collect();
        let storage: Vec<Value> = hardware
            .storage
            .into_iter()
            .map(|storage| json!({ "type": storage.storage_type }))
            .collect();

        Ok(json!({ "cpu": cpu, "memory": memory, "storage": storage }))
    }
}

impl DataSource for AvailableHardwareDataSource {
    fn read(&self, _config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.read_hardware())
    }
}
