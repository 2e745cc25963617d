//! Wire models for the Fluence marketplace API.
//!
//! Field names follow the API's camelCase JSON; optional request fields are
//! omitted from payloads rather than sent as `null`.

use serde::{Deserialize, Serialize};

/// A running VM as reported by `GET /vms/v3`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunningInstance {
    /// Marketplace identifier of the VM.
    pub id: String,
    /// Display name, when one was assigned.
    #[serde(default)]
    pub vm_name: Option<String>,
    /// Lifecycle status, for example `Launching` or `Active`.
    pub status: String,
    /// Timestamp of the last status transition.
    #[serde(default)]
    pub status_changed_at: String,
    /// Price charged per billing epoch.
    #[serde(default)]
    pub price_per_epoch: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
    /// Timestamp of the next billing event.
    #[serde(default)]
    pub next_billing_at: String,
    /// Balance reserved for the VM.
    #[serde(default)]
    pub reserved_balance: String,
    /// Amount spent on the VM so far.
    #[serde(default)]
    pub total_spent: String,
    /// Image the VM was booted from.
    #[serde(default)]
    pub os_image: Option<String>,
    /// Public IPv4 address once networking is ready.
    #[serde(default)]
    pub public_ip: Option<String>,
}

/// A port to expose on a VM.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OpenPort {
    /// Port number.
    pub port: u16,
    /// Transport protocol (`tcp` or `udp`).
    pub protocol: String,
}

/// Guest configuration for new VMs.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VmConfiguration {
    /// VM name.
    pub name: String,
    /// Optional guest hostname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Image to boot.
    pub os_image: String,
    /// Ports to open.
    pub open_ports: Vec<OpenPort>,
    /// Fingerprints of SSH keys to authorise.
    pub ssh_keys: Vec<String>,
}

/// Datacenter placement constraint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DatacenterConstraint {
    /// Allowed country codes.
    pub countries: Vec<String>,
}

/// A CPU option, either advertised by the marketplace or requested.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CpuHardware {
    /// CPU architecture, for example `x86_64`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    /// CPU manufacturer, for example `AMD`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
}

/// A memory option.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MemoryHardware {
    /// Memory type, for example `DDR`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub memory_type: String,
    /// Memory generation, for example `5`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generation: String,
}

/// A storage option.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StorageHardware {
    /// Storage type, for example `NVMe`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub storage_type: String,
}

/// Hardware catalog and hardware constraints share one shape.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HardwareConstraints {
    /// CPU options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpu: Vec<CpuHardware>,
    /// Memory options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory: Vec<MemoryHardware>,
    /// Storage options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage: Vec<StorageHardware>,
}

/// Hardware currently offered by the marketplace.
pub type AvailableHardware = HardwareConstraints;

/// Offer selection constraints used by VM creation and deposit estimates.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OfferConstraints {
    /// Named preset such as `cpu-2-ram-4gb-storage-25gb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_configuration: Option<String>,
    /// Upper bound on the total price per epoch, in USD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_total_price_per_epoch_usd: Option<String>,
    /// Datacenter placement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<DatacenterConstraint>,
    /// Hardware requirements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HardwareConstraints>,
}

/// Body of `POST /vms/v3`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateVmRequest {
    /// Offer constraints; omitted when none were configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<OfferConstraints>,
    /// Number of VMs to create.
    pub instances: u32,
    /// Guest configuration applied to every instance.
    pub vm_configuration: VmConfiguration,
}

/// One entry of the `POST /vms/v3` response.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedVm {
    /// Identifier of the new VM.
    pub vm_id: String,
    /// Name assigned to the new VM.
    #[serde(default)]
    pub vm_name: String,
}

/// One entry of the `PATCH /vms/v3` body.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVm {
    /// Identifier of the VM to update.
    pub id: String,
    /// New name, when it should change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_name: Option<String>,
    /// Replacement port list, when it should change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_ports: Option<Vec<OpenPort>>,
}

/// An SSH key registered with the account.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SshKey {
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Server-assigned fingerprint; the key's durable identity.
    pub fingerprint: String,
    /// Key algorithm, for example `ssh-ed25519`.
    #[serde(default)]
    pub algorithm: String,
    /// Comment embedded in the public key.
    #[serde(default)]
    pub comment: String,
    /// Public key material.
    pub public_key: String,
    /// Whether the key is active.
    #[serde(default)]
    pub active: bool,
    /// Registration timestamp.
    #[serde(default)]
    pub created_at: String,
}

/// Body of `POST /ssh_keys`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddSshKey {
    /// Optional display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Public key material.
    pub public_key: String,
}

/// A registered datacenter.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Datacenter {
    /// Datacenter identifier.
    pub id: String,
    /// ISO country code.
    pub country_code: String,
    /// City code.
    pub city_code: String,
    /// Index within the city.
    pub index: i64,
    /// Tier rating.
    pub tier: i64,
    /// Certifications held by the datacenter.
    #[serde(default)]
    pub certifications: Vec<String>,
    /// Human-friendly slug.
    #[serde(default)]
    pub slug: String,
}

/// A default OS image offered for new VMs.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DefaultImage {
    /// Image identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Distribution, for example `Ubuntu`.
    pub distribution: String,
    /// Slug identifier.
    pub slug: String,
    /// Download URL usable as `os_image`.
    pub download_url: String,
    /// Default login user.
    pub username: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: String,
}

/// Body of `POST /vms/v3/estimate`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateDepositRequest {
    /// Offer constraints; omitted when none were configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<OfferConstraints>,
    /// Number of VMs to estimate for.
    pub instances: u32,
}

/// Response of `POST /vms/v3/estimate`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepositEstimate {
    /// Required deposit in USDC.
    pub deposit_amount_usdc: String,
    /// Number of epochs the deposit covers.
    pub deposit_epochs: i64,
    /// Total price per epoch for all instances.
    pub total_price_per_epoch: String,
    /// Maximum price per epoch for all instances.
    pub max_price_per_epoch: String,
}
