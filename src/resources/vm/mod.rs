//! The `fluence_vm` resource.

mod wait;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::api::FluenceApi;
use crate::framework::{
    AttrValue, Attribute, AttributeKind, Diagnostic, Diagnostics, FrameworkFuture, ReadOutcome,
    Resource, Schema, decode_model, encode_model,
};
use crate::models::{
    CreateVmRequest, DatacenterConstraint, OfferConstraints, OpenPort, RunningInstance, UpdateVm,
    VmConfiguration,
};

pub use wait::{
    ACTIVE_STATUS, FAILURE_STATUSES, PollPolicy, RefreshError, RetryPolicy, VmWaitError,
};

/// Resource type name.
pub const TYPE_NAME: &str = "fluence_vm";

/// One entry of `open_ports`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct OpenPortModel {
    pub(crate) port: AttrValue<i64>,
    pub(crate) protocol: AttrValue<String>,
}

/// State of a `fluence_vm` resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct VmModel {
    pub(crate) id: AttrValue<String>,
    pub(crate) name: AttrValue<String>,
    pub(crate) hostname: AttrValue<String>,
    pub(crate) os_image: AttrValue<String>,
    pub(crate) ssh_keys: AttrValue<Vec<String>>,
    pub(crate) open_ports: AttrValue<Vec<OpenPortModel>>,
    pub(crate) instances: AttrValue<i64>,
    pub(crate) basic_configuration: AttrValue<String>,
    pub(crate) max_total_price_per_epoch_usd: AttrValue<String>,
    pub(crate) datacenter_countries: AttrValue<Vec<String>>,
    pub(crate) status: AttrValue<String>,
    pub(crate) status_changed_at: AttrValue<String>,
    pub(crate) price_per_epoch: AttrValue<String>,
    pub(crate) created_at: AttrValue<String>,
    pub(crate) next_billing_at: AttrValue<String>,
    pub(crate) reserved_balance: AttrValue<String>,
    pub(crate) total_spent: AttrValue<String>,
    pub(crate) public_ip: AttrValue<String>,
}

impl VmModel {
    /// Copies the fields the marketplace reports into the model.
    pub(crate) fn apply_snapshot(&mut self, vm: &RunningInstance) {
        self.status = AttrValue::Known(vm.status.clone());
        self.status_changed_at = AttrValue::Known(vm.status_changed_at.clone());
        self.price_per_epoch = AttrValue::Known(vm.price_per_epoch.clone());
        self.created_at = AttrValue::Known(vm.created_at.clone());
        self.next_billing_at = AttrValue::Known(vm.next_billing_at.clone());
        self.reserved_balance = AttrValue::Known(vm.reserved_balance.clone());
        self.total_spent = AttrValue::Known(vm.total_spent.clone());
        if let Some(os_image) = &vm.os_image {
            self.os_image = AttrValue::Known(os_image.clone());
        }
        self.public_ip = vm.public_ip.clone().into();
        if let Some(vm_name) = &vm.vm_name {
            self.name = AttrValue::Known(vm_name.clone());
        }
    }

    fn vm_id(&self) -> Result<String, Diagnostics> {
        self.id.known().cloned().ok_or_else(|| {
            Diagnostics::from(Diagnostic::attribute_error(
                "id",
                "Missing VM Identifier",
                "The VM state does not carry an identifier.",
            ))
        })
    }

    fn open_ports(&self) -> Result<Vec<OpenPort>, Diagnostics> {
        self.open_ports
            .known()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|entry| {
                let raw = entry.port.known().copied().unwrap_or_default();
                let port = u16::try_from(raw).map_err(|_| {
                    Diagnostics::from(Diagnostic::attribute_error(
                        "open_ports",
                        "Invalid Attribute Value",
                        format!("Port {raw} is outside the range 0-65535."),
                    ))
                })?;
                Ok(OpenPort {
                    port,
                    protocol: entry.protocol.value_str().to_owned(),
                })
            })
            .collect()
    }

    fn constraints(&self) -> Option<OfferConstraints> {
        let countries = self.datacenter_countries.known().cloned().unwrap_or_default();
        if self.basic_configuration.is_null()
            && self.max_total_price_per_epoch_usd.is_null()
            && countries.is_empty()
        {
            return None;
        }

        Some(OfferConstraints {
            basic_configuration: self.basic_configuration.known().cloned(),
            max_total_price_per_epoch_usd: self.max_total_price_per_epoch_usd.known().cloned(),
            datacenter: (!countries.is_empty()).then_some(DatacenterConstraint { countries }),
            hardware: None,
        })
    }

    fn instances(&self) -> Result<u32, Diagnostics> {
        let Some(&count) = self.instances.known() else {
            return Ok(1);
        };
        u32::try_from(count).map_err(|_| {
            Diagnostics::from(Diagnostic::attribute_error(
                "instances",
                "Invalid Attribute Value",
                format!("Instance count {count} must not be negative."),
            ))
        })
    }

    fn create_request(&self) -> Result<CreateVmRequest, Diagnostics> {
        Ok(CreateVmRequest {
            constraints: self.constraints(),
            instances: self.instances()?,
            vm_configuration: VmConfiguration {
                name: self.name.value_str().to_owned(),
                hostname: self.hostname.known().cloned(),
                os_image: self.os_image.value_str().to_owned(),
                open_ports: self.open_ports()?,
                ssh_keys: self.ssh_keys.known().cloned().unwrap_or_default(),
            },
        })
    }
}

/// Schema of the `fluence_vm` resource.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "Virtual Machine resource",
        vec![
            Attribute::computed("id", AttributeKind::String)
                .describe("VM identifier")
                .use_state_for_unknown(),
            Attribute::required("name", AttributeKind::String).describe("VM name"),
            Attribute::optional("hostname", AttributeKind::String)
                .describe("VM hostname (optional)"),
            Attribute::required("os_image", AttributeKind::String)
                .describe("Operating system image to use")
                .requires_replace(),
            Attribute::required("ssh_keys", AttributeKind::StringList)
                .describe("List of SSH key fingerprints to authorize"),
            Attribute::optional(
                "open_ports",
                AttributeKind::ListNested(vec![
                    Attribute::required("port", AttributeKind::Int64).describe("Port number"),
                    Attribute::required("protocol", AttributeKind::String)
                        .describe("Protocol (tcp/udp)"),
                ]),
            )
            .describe("List of ports to open on the VM"),
            Attribute::optional_computed("instances", AttributeKind::Int64)
                .describe("Number of VM instances to create")
                .use_state_for_unknown(),
            Attribute::optional("basic_configuration", AttributeKind::String)
                .describe("Basic configuration constraint"),
            Attribute::optional("max_total_price_per_epoch_usd", AttributeKind::String)
                .describe("Maximum total price per epoch in USD"),
            Attribute::optional("datacenter_countries", AttributeKind::StringList)
                .describe("List of allowed datacenter countries"),
            Attribute::computed("status", AttributeKind::String).describe("VM status"),
            Attribute::computed("status_changed_at", AttributeKind::String)
                .describe("VM status change timestamp"),
            Attribute::computed("price_per_epoch", AttributeKind::String)
                .describe("Price per epoch"),
            Attribute::computed("created_at", AttributeKind::String).describe("VM creation time"),
            Attribute::computed("next_billing_at", AttributeKind::String)
                .describe("Next billing time"),
            Attribute::computed("reserved_balance", AttributeKind::String)
                .describe("Reserved balance"),
            Attribute::computed("total_spent", AttributeKind::String)
                .describe("Total amount spent"),
            Attribute::computed("public_ip", AttributeKind::String)
                .describe("Public IP address of the VM"),
        ],
    )
}

/// Creates, refreshes, updates and deletes marketplace VMs.
pub struct VmResource {
    api: Arc<dyn FluenceApi>,
    poll: PollPolicy,
    retry: RetryPolicy,
}

impl VmResource {
    /// Creates the resource with the default wait and refresh schedules.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self {
            api,
            poll: PollPolicy::DEFAULT,
            retry: RetryPolicy::DEFAULT,
        }
    }

    /// Overrides the activation wait schedule.
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Overrides the refresh retry schedule.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn create_vm(&self, planned: Value) -> Result<Value, Diagnostics> {
        let mut model: VmModel = decode_model("VM plan", planned)?;
        let request = model.create_request()?;

        let created = self
            .api
            .create_vms(&request)
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("create VM", &err)))?;
        let Some(first) = created.into_iter().next() else {
            return Err(Diagnostic::error("Client Error", "No VMs were created").into());
        };

        model.id = AttrValue::Known(first.vm_id.clone());
        model.instances = AttrValue::Known(i64::from(request.instances));
        if !first.vm_name.is_empty() {
            model.name = AttrValue::Known(first.vm_name);
        }

        wait::wait_for_active(self.api.as_ref(), &first.vm_id, self.poll, &mut model)
            .await
            .map_err(|err| {
                Diagnostics::from(Diagnostic::error(
                    "VM Creation Error",
                    format!("VM was created but failed to become active: {err}"),
                ))
            })?;

        trace!(vm_id = %first.vm_id, "created VM resource");
        encode_model(&model)
    }

    async fn read_vm(&self, state: Value) -> Result<ReadOutcome, Diagnostics> {
        let mut model: VmModel = decode_model("VM state", state)?;
        let vm_id = model.vm_id()?;

        match wait::refresh(self.api.as_ref(), &vm_id, self.retry).await {
            Ok(vm) => {
                model.apply_snapshot(&vm);
                encode_model(&model).map(ReadOutcome::Present)
            }
            Err(RefreshError::NotFound { .. }) => Ok(ReadOutcome::Removed),
            Err(err) => Err(Diagnostic::error(
                "Client Error",
                format!("Unable to refresh VM data: {err}"),
            )
            .into()),
        }
    }

    async fn update_vm(&self, prior: Value, planned: Value) -> Result<Value, Diagnostics> {
        let prior: VmModel = decode_model("VM state", prior)?;
        let mut model: VmModel = decode_model("VM plan", planned)?;
        if model.instances.is_unknown() {
            model.instances = prior.instances;
        }
        let vm_id = model.vm_id()?;
        let open_ports = model.open_ports()?;

        let updates = [UpdateVm {
            id: vm_id.clone(),
            vm_name: model.name.known().cloned(),
            open_ports: (!open_ports.is_empty()).then_some(open_ports),
        }];
        self.api
            .update_vms(&updates)
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("update VM", &err)))?;

        let vm = wait::refresh(self.api.as_ref(), &vm_id, self.retry)
            .await
            .map_err(|err| {
                Diagnostics::from(Diagnostic::error(
                    "Client Error",
                    format!("Unable to refresh VM data after update: {err}"),
                ))
            })?;
        model.apply_snapshot(&vm);
        encode_model(&model)
    }

    async fn delete_vm(&self, state: Value) -> Result<(), Diagnostics> {
        let model: VmModel = decode_model("VM state", state)?;
        let vm_ids = [model.vm_id()?];
        self.api
            .remove_vms(&vm_ids)
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("delete VM", &err)))
    }
}

impl Resource for VmResource {
    fn create(&self, planned: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.create_vm(planned))
    }

    fn read(&self, state: Value) -> FrameworkFuture<'_, ReadOutcome> {
        Box::pin(self.read_vm(state))
    }

    fn update(&self, prior: Value, planned: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.update_vm(prior, planned))
    }

    fn delete(&self, state: Value) -> FrameworkFuture<'_, ()> {
        Box::pin(self.delete_vm(state))
    }
}
