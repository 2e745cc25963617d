//! Client abstraction over the Fluence marketplace API.
//!
//! Adapters only ever talk to [`FluenceApi`]; the HTTP implementation lives in
//! [`crate::client`] and tests substitute
//! [`ScriptedApi`](crate::test_support::ScriptedApi).

use std::future::Future;
use std::pin::Pin;

use crate::client::ClientError;
use crate::models::{
    AddSshKey, AvailableHardware, CreateVmRequest, CreatedVm, Datacenter, DefaultImage,
    DepositEstimate, EstimateDepositRequest, RunningInstance, SshKey, UpdateVm,
};

/// Future returned by API operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Operations offered by the marketplace API.
///
/// Implementations must be safe to share between adapters; the provider hands
/// the same handle to every resource and data source.
pub trait FluenceApi: Send + Sync {
    /// Lists every VM owned by the account.
    fn list_vms(&self) -> ApiFuture<'_, Vec<RunningInstance>>;

    /// Creates one or more VMs and returns their identifiers.
    fn create_vms<'a>(&'a self, request: &'a CreateVmRequest) -> ApiFuture<'a, Vec<CreatedVm>>;

    /// Applies name and port updates to existing VMs.
    fn update_vms<'a>(&'a self, updates: &'a [UpdateVm]) -> ApiFuture<'a, ()>;

    /// Terminates the given VMs.
    fn remove_vms<'a>(&'a self, vm_ids: &'a [String]) -> ApiFuture<'a, ()>;

    /// Lists the account's SSH keys.
    fn list_ssh_keys(&self) -> ApiFuture<'_, Vec<SshKey>>;

    /// Registers a new SSH key.
    fn create_ssh_key<'a>(&'a self, request: &'a AddSshKey) -> ApiFuture<'a, SshKey>;

    /// Removes the SSH key with the given fingerprint.
    fn remove_ssh_key<'a>(&'a self, fingerprint: &'a str) -> ApiFuture<'a, ()>;

    /// Lists country codes with available capacity.
    fn available_countries(&self) -> ApiFuture<'_, Vec<String>>;

    /// Lists the hardware currently offered.
    fn available_hardware(&self) -> ApiFuture<'_, AvailableHardware>;

    /// Lists the named basic configurations.
    fn basic_configurations(&self) -> ApiFuture<'_, Vec<String>>;

    /// Lists registered datacenters.
    fn datacenters(&self) -> ApiFuture<'_, Vec<Datacenter>>;

    /// Lists default OS images.
    fn default_images(&self) -> ApiFuture<'_, Vec<DefaultImage>>;

    /// Estimates the deposit needed for the requested VMs.
    fn estimate_deposit<'a>(
        &'a self,
        request: &'a EstimateDepositRequest,
    ) -> ApiFuture<'a, DepositEstimate>;
}
