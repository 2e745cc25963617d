//! The `fluence_vm_estimate_deposit` data source.
//!
//! CPU and memory constraints are given as independent lists in
//! configuration. When both halves of a pair are set the request carries
//! every combination, architecture-major (or memory-type-major).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::FluenceApi;
use crate::framework::{
    AttrValue, Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture,
    Schema, decode_model, encode_model,
};
use crate::models::{
    CpuHardware, DatacenterConstraint, EstimateDepositRequest, HardwareConstraints,
    MemoryHardware, OfferConstraints, StorageHardware,
};

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_vm_estimate_deposit";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
struct ConstraintsModel {
    basic_configuration: AttrValue<String>,
    max_total_price_per_epoch_usd: AttrValue<String>,
    datacenter_countries: AttrValue<Vec<String>>,
    cpu_architecture: AttrValue<Vec<String>>,
    cpu_manufacturer: AttrValue<Vec<String>>,
    memory_type: AttrValue<Vec<String>>,
    memory_generation: AttrValue<Vec<String>>,
    storage_type: AttrValue<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
struct EstimateModel {
    instances: AttrValue<i64>,
    constraints: AttrValue<ConstraintsModel>,
    deposit_amount_usdc: AttrValue<String>,
    deposit_epochs: AttrValue<i64>,
    total_price_per_epoch: AttrValue<String>,
    max_price_per_epoch: AttrValue<String>,
}

fn list(value: &AttrValue<Vec<String>>) -> &[String] {
    value.known().map(Vec::as_slice).unwrap_or_default()
}

/// Pairs two optional lists into hardware entries.
///
/// Both non-empty yields the cartesian product, left-major. A single
/// non-empty list yields one entry per value with the other side left
/// empty.
fn combine<T>(left: &[String], right: &[String], build: impl Fn(&str, &str) -> T) -> Vec<T> {
    match (left.is_empty(), right.is_empty()) {
        (false, false) => left
            .iter()
            .flat_map(|l| right.iter().map(|r| build(l.as_str(), r.as_str())))
            .collect(),
        (false, true) => left.iter().map(|l| build(l.as_str(), "")).collect(),
        (true, false) => right.iter().map(|r| build("", r.as_str())).collect(),
        (true, true) => Vec::new(),
    }
}

impl ConstraintsModel {
    fn hardware(&self) -> Option<HardwareConstraints> {
        let cpu = combine(
            list(&self.cpu_architecture),
            list(&self.cpu_manufacturer),
            |architecture, manufacturer| CpuHardware {
                architecture: architecture.to_owned(),
                manufacturer: manufacturer.to_owned(),
            },
        );
        let memory = combine(
            list(&self.memory_type),
            list(&self.memory_generation),
            |memory_type, generation| MemoryHardware {
                memory_type: memory_type.to_owned(),
                generation: generation.to_owned(),
            },
        );
        let storage: Vec<StorageHardware> = list(&self.storage_type)
            .iter()
            .map(|storage_type| StorageHardware {
                storage_type: storage_type.clone(),
            })
            .collect();

        if cpu.is_empty() && memory.is_empty() && storage.is_empty() {
            return None;
        }
        Some(HardwareConstraints {
            cpu,
            memory,
            storage,
        })
    }

    fn to_offer_constraints(&self) -> OfferConstraints {
        let countries = list(&self.datacenter_countries);
        OfferConstraints {
            basic_configuration: self.basic_configuration.known().cloned(),
            max_total_price_per_epoch_usd: self.max_total_price_per_epoch_usd.known().cloned(),
            datacenter: (!countries.is_empty()).then(|| DatacenterConstraint {
                countries: countries.to_vec(),
            }),
            hardware: self.hardware(),
        }
    }
}

impl EstimateModel {
    fn request(&self) -> Result<EstimateDepositRequest, Diagnostics> {
        let raw = self.instances.known().copied().unwrap_or_default();
        let instances = u32::try_from(raw).map_err(|_| {
            Diagnostics::from(Diagnostic::attribute_error(
                "instances",
                "Invalid Attribute Value",
                format!("Instance count {raw} must not be negative."),
            ))
        })?;
        Ok(EstimateDepositRequest {
            constraints: self
                .constraints
                .known()
                .map(ConstraintsModel::to_offer_constraints),
            instances,
        })
    }
}

/// Schema of the `fluence_vm_estimate_deposit` data source.
#[must_use]
pub fn schema() -> Schema {
    let string_list = |name, description| {
        Attribute::optional(name, AttributeKind::StringList).describe(description)
    };
    Schema::new(
        "Estimate the deposit required for creating VMs with given configuration and constraints",
        vec![
            Attribute::required("instances", AttributeKind::Int64)
                .describe("Number of VM instances to estimate for"),
            Attribute::optional(
                "constraints",
                AttributeKind::SingleNested(vec![
                    Attribute::optional("basic_configuration", AttributeKind::String)
                        .describe("Basic configuration constraint"),
                    Attribute::optional("max_total_price_per_epoch_usd", AttributeKind::String)
                        .describe("Maximum total price per epoch in USD"),
                    string_list("datacenter_countries", "List of allowed datacenter countries"),
                    string_list("cpu_architecture", "List of allowed CPU architectures"),
                    string_list("cpu_manufacturer", "List of allowed CPU manufacturers"),
                    string_list("memory_type", "List of allowed memory types"),
                    string_list("memory_generation", "List of allowed memory generations"),
                    string_list("storage_type", "List of allowed storage types"),
                ]),
            )
            .describe("Constraints for the VM estimation"),
            Attribute::computed("deposit_amount_usdc", AttributeKind::String)
                .describe("Required deposit amount in USDC"),
            Attribute::computed("deposit_epochs", AttributeKind::Int64)
                .describe("Number of epochs the deposit covers"),
            Attribute::computed("total_price_per_epoch", AttributeKind::String)
                .describe("Total price per epoch for all instances"),
            Attribute::computed("max_price_per_epoch", AttributeKind::String)
                .describe("Maximum price per epoch for all instances"),
        ],
    )
}

/// Estimates the deposit for a prospective VM order. Nothing is cached;
/// every read asks the marketplace again.
pub struct EstimateDepositDataSource {
    api: Arc<dyn FluenceApi>,
}

impl EstimateDepositDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn estimate(&self, config: Value) -> Result<Value, Diagnostics> {
        let mut model: EstimateModel = decode_model("estimate configuration", config)?;
        let request = model.request()?;
        debug!(instances = request.instances, constraints = ?request.constraints, "estimating deposit");

        let estimate = self
            .api
            .estimate_deposit(&request)
            .await
            .map_err(|err| Diagnostics::from(Diagnostic::client_error("estimate deposit", &err)))?;
        debug!(
            deposit_amount_usdc = %estimate.deposit_amount_usdc,
            deposit_epochs = estimate.deposit_epochs,
            "received deposit estimate"
        );

        model.deposit_amount_usdc = AttrValue::Known(estimate.deposit_amount_usdc);
        model.deposit_epochs = AttrValue::Known(estimate.deposit_epochs);
        model.total_price_per_epoch = AttrValue::Known(estimate.total_price_per_epoch);
        model.max_price_per_epoch = AttrValue::Known(estimate.max_price_per_epoch);
        encode_model(&model)
    }
}

impl DataSource for EstimateDepositDataSource {
    fn read(&self, config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.estimate(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> AttrValue<Vec<String>> {
        AttrValue::Known(values.iter().map(|v| (*v).to_owned()).collect())
    }

    #[test]
    fn cpu_lists_expand_architecture_major() {
        let constraints = ConstraintsModel {
            cpu_architecture: strings(&["x86_64", "arm64"]),
            cpu_manufacturer: strings(&["AMD", "Intel"]),
            ..ConstraintsModel::default()
        };

        let hardware = constraints.hardware().unwrap_or_default();

        let pairs: Vec<_> = hardware
            .cpu
            .iter()
            .map(|cpu| (cpu.architecture.as_str(), cpu.manufacturer.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("x86_64", "AMD"),
                ("x86_64", "Intel"),
                ("arm64", "AMD"),
                ("arm64", "Intel"),
            ]
        );
        assert!(hardware.memory.is_empty());
    }

    #[test]
    fn single_memory_list_leaves_other_field_empty() {
        let constraints = ConstraintsModel {
            memory_generation: strings(&["4", "5"]),
            ..ConstraintsModel::default()
        };

        let hardware = constraints.hardware().unwrap_or_default();

        assert_eq!(
            hardware.memory,
            vec![
                MemoryHardware {
                    memory_type: String::new(),
                    generation: String::from("4"),
                },
                MemoryHardware {
                    memory_type: String::new(),
                    generation: String::from("5"),
                },
            ]
        );
    }

    #[test]
    fn hardware_is_omitted_without_hardware_lists() {
        let constraints = ConstraintsModel {
            datacenter_countries: strings(&["FR"]),
            ..ConstraintsModel::default()
        };

        let offer = constraints.to_offer_constraints();

        assert!(offer.hardware.is_none());
        assert_eq!(
            offer.datacenter.map(|dc| dc.countries),
            Some(vec![String::from("FR")])
        );
    }
}
