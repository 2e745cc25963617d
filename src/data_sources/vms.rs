//! The `fluence_vms` data source.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::FluenceApi;
use crate::framework::{
    Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture, Schema,
    encode_model,
};
use crate::models::RunningInstance;

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_vms";

#[derive(Debug, Serialize)]
struct VmEntry {
    id: String,
    status: String,
    price_per_epoch: String,
    created_at: String,
    next_billing_at: String,
    reserved_balance: String,
    total_spent: String,
    os_image: Option<String>,
    public_ip: Option<String>,
    vm_name: Option<String>,
}

impl From<RunningInstance> for VmEntry {
    fn from(vm: RunningInstance) -> Self {
        Self {
            id: vm.id,
            status: vm.status,
            price_per_epoch: vm.price_per_epoch,
            created_at: vm.created_at,
            next_billing_at: vm.next_billing_at,
            reserved_balance: vm.reserved_balance,
            total_spent: vm.total_spent,
            os_image: vm.os_image,
            public_ip: vm.public_ip,
            vm_name: vm.vm_name,
        }
    }
}

#[derive(Debug, Serialize)]
struct VmsState {
    vms: Vec<VmEntry>,
}

/// Schema of the `fluence_vms` data source.
#[must_use]
pub fn schema() -> Schema {
    let computed = |name| Attribute::computed(name, AttributeKind::String);
    Schema::new(
        "Fetches the list of VMs.",
        vec![
            Attribute::computed(
                "vms",
                AttributeKind::ListNested(vec![
                    computed("id"),
                    computed("status"),
                    computed("price_per_epoch"),
                    computed("created_at"),
                    computed("next_billing_at"),
                    computed("reserved_balance"),
                    computed("total_spent"),
                    computed("os_image"),
                    computed("public_ip"),
                    computed("vm_name"),
                ]),
            )
            .describe("VMs owned by the account"),
        ],
    )
}

/// Lists every VM on the account.
pub struct VmsDataSource {
    api: Arc<dyn FluenceApi>,
}

impl VmsDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn read_vms(&self) -> Result<Value, Diagnostics> {
        let vms = self.api.list_vms().await.map_err(|err| {
            Diagnostics::from(Diagnostic::error("Unable to Read Fluence VMs", err.to_string()))
        })?;
        encode_model(&VmsState {
            vms: vms.into_iter().map(VmEntry::from).collect(),
        })
    }
}

impl DataSource for VmsDataSource {
    fn read(&self, _config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.read_vms())
    }
}
