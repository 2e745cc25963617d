//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::{ApiFuture, FluenceApi};
use crate::client::ClientError;
use crate::models::{
    AddSshKey, AvailableHardware, CreateVmRequest, CreatedVm, Datacenter, DefaultImage,
    DepositEstimate, EstimateDepositRequest, RunningInstance, SshKey, UpdateVm,
};

/// Records a single call made through [`ScriptedApi`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    /// `list_vms`.
    ListVms,
    /// `create_vms` with its request.
    CreateVms(CreateVmRequest),
    /// `update_vms` with its updates.
    UpdateVms(Vec<UpdateVm>),
    /// `remove_vms` with the identifiers.
    RemoveVms(Vec<String>),
    /// `list_ssh_keys`.
    ListSshKeys,
    /// `create_ssh_key` with its request.
    CreateSshKey(AddSshKey),
    /// `remove_ssh_key` with the fingerprint.
    RemoveSshKey(String),
    /// `available_countries`.
    AvailableCountries,
    /// `available_hardware`.
    AvailableHardware,
    /// `basic_configurations`.
    BasicConfigurations,
    /// `datacenters`.
    Datacenters,
    /// `default_images`.
    DefaultImages,
    /// `estimate_deposit` with its request.
    EstimateDeposit(EstimateDepositRequest),
}

type Queue<T> = VecDeque<Result<T, ClientError>>;

#[derive(Debug, Default)]
struct Script {
    list_vms: Queue<Vec<RunningInstance>>,
    create_vms: Queue<Vec<CreatedVm>>,
    update_vms: Queue<()>,
    remove_vms: Queue<()>,
    list_ssh_keys: Queue<Vec<SshKey>>,
    create_ssh_key: Queue<SshKey>,
    remove_ssh_key: Queue<()>,
    available_countries: Queue<Vec<String>>,
    available_hardware: Queue<AvailableHardware>,
    basic_configurations: Queue<Vec<String>>,
    datacenters: Queue<Vec<Datacenter>>,
    default_images: Queue<Vec<DefaultImage>>,
    estimate_deposit: Queue<DepositEstimate>,
    invocations: Vec<ApiCall>,
}

/// Scripted API double that returns pre-seeded results in FIFO order.
///
/// Operations with nothing queued fail with a transport error, except the
/// unit-returning ones (`update_vms`, `remove_vms`, `remove_ssh_key`), which
/// succeed.
#[derive(Clone, Debug, Default)]
pub struct ScriptedApi {
    script: Arc<Mutex<Script>>,
}

fn next<T>(queue: &mut Queue<T>, path: &str) -> Result<T, ClientError> {
    queue.pop_front().unwrap_or_else(|| {
        Err(ClientError::Transport {
            path: path.to_owned(),
            message: String::from("no scripted response available"),
        })
    })
}

impl ScriptedApi {
    /// Creates a double with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<ApiCall> {
        self.lock().invocations.clone()
    }

    /// Counts recorded calls matching `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.lock()
            .invocations
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Queues a `list_vms` result.
    pub fn push_list_vms(&self, result: Result<Vec<RunningInstance>, ClientError>) {
        self.lock().list_vms.push_back(result);
    }

    /// Queues a `create_vms` result.
    pub fn push_create_vms(&self, result: Result<Vec<CreatedVm>, ClientError>) {
        self.lock().create_vms.push_back(result);
    }

    /// Queues an `update_vms` result.
    pub fn push_update_vms(&self, result: Result<(), ClientError>) {
        self.lock().update_vms.push_back(result);
    }

    /// Queues a `remove_vms` result.
    pub fn push_remove_vms(&self, result: Result<(), ClientError>) {
        self.lock().remove_vms.push_back(result);
    }

    /// Queues a `list_ssh_keys` result.
    pub fn push_list_ssh_keys(&self, result: Result<Vec<SshKey>, ClientError>) {
        self.lock().list_ssh_keys.push_back(result);
    }

    /// Queues a `create_ssh_key` result.
    pub fn push_create_ssh_key(&self, result: Result<SshKey, ClientError>) {
        self.lock().create_ssh_key.push_back(result);
    }

    /// Queues a `remove_ssh_key` result.
    pub fn push_remove_ssh_key(&self, result: Result<(), ClientError>) {
        self.lock().remove_ssh_key.push_back(result);
    }

    /// Queues an `available_countries` result.
    pub fn push_available_countries(&self, result: Result<Vec<String>, ClientError>) {
        self.lock().available_countries.push_back(result);
    }

    /// Queues an `available_hardware` result.
    pub fn push_available_hardware(&self, result: Result<AvailableHardware, ClientError>) {
        self.lock().available_hardware.push_back(result);
    }

    /// Queues a `basic_configurations` result.
    pub fn push_basic_configurations(&self, result: Result<Vec<String>, ClientError>) {
        self.lock().basic_configurations.push_back(result);
    }

    /// Queues a `datacenters` result.
    pub fn push_datacenters(&self, result: Result<Vec<Datacenter>, ClientError>) {
        self.lock().datacenters.push_back(result);
    }

    /// Queues a `default_images` result.
    pub fn push_default_images(&self, result: Result<Vec<DefaultImage>, ClientError>) {
        self.lock().default_images.push_back(result);
    }

    /// Queues an `estimate_deposit` result.
    pub fn push_estimate_deposit(&self, result: Result<DepositEstimate, ClientError>) {
        self.lock().estimate_deposit.push_back(result);
    }
}

impl FluenceApi for ScriptedApi {
    fn list_vms(&self) -> ApiFuture<'_, Vec<RunningInstance>> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::ListVms);
        let result = next(&mut script.list_vms, "/vms/v3");
        Box::pin(async move { result })
    }

    fn create_vms<'a>(&'a self, request: &'a CreateVmRequest) -> ApiFuture<'a, Vec<CreatedVm>> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::CreateVms(request.clone()));
        let result = next(&mut script.create_vms, "/vms/v3");
        Box::pin(async move { result })
    }

    fn update_vms<'a>(&'a self, updates: &'a [UpdateVm]) -> ApiFuture<'a, ()> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::UpdateVms(updates.to_vec()));
        let result = script.update_vms.pop_front().unwrap_or(Ok(()));
        Box::pin(async move { result })
    }

    fn remove_vms<'a>(&'a self, vm_ids: &'a [String]) -> ApiFuture<'a, ()> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::RemoveVms(vm_ids.to_vec()));
        let result = script.remove_vms.pop_front().unwrap_or(Ok(()));
        Box::pin(async move { result })
    }

    fn list_ssh_keys(&self) -> ApiFuture<'_, Vec<SshKey>> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::ListSshKeys);
        let result = next(&mut script.list_ssh_keys, "/ssh_keys");
        Box::pin(async move { result })
    }

    fn create_ssh_key<'a>(&'a self, request: &'a AddSshKey) -> ApiFuture<'a, SshKey> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::CreateSshKey(request.clone()));
        let result = next(&mut script.create_ssh_key, "/ssh_keys");
        Box::pin(async move { result })
    }

    fn remove_ssh_key<'a>(&'a self, fingerprint: &'a str) -> ApiFuture<'a, ()> {
        let mut script = self.lock();
        script
            .invocations
            .push(ApiCall::RemoveSshKey(fingerprint.to_owned()));
        let result = script.remove_ssh_key.pop_front().unwrap_or(Ok(()));
        Box::pin(async move { result })
    }

    fn available_countries(&self) -> ApiFuture<'_, Vec<String>> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::AvailableCountries);
        let result = next(&mut script.available_countries, "/marketplace/countries");
        Box::pin(async move { result })
    }

    fn available_hardware(&self) -> ApiFuture<'_, AvailableHardware> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::AvailableHardware);
        let result = next(&mut script.available_hardware, "/marketplace/hardware");
        Box::pin(async move { result })
    }

    fn basic_configurations(&self) -> ApiFuture<'_, Vec<String>> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::BasicConfigurations);
        let result = next(
            &mut script.basic_configurations,
            "/marketplace/basic_configurations",
        );
        Box::pin(async move { result })
    }

    fn datacenters(&self) -> ApiFuture<'_, Vec<Datacenter>> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::Datacenters);
        let result = next(&mut script.datacenters, "/datacenters");
        Box::pin(async move { result })
    }

    fn default_images(&self) -> ApiFuture<'_, Vec<DefaultImage>> {
        let mut script = self.lock();
        script.invocations.push(ApiCall::DefaultImages);
        let result = next(&mut script.default_images, "/vms/v3/default_images");
        Box::pin(async move { result })
    }

    fn estimate_deposit<'a>(
        &'a self,
        request: &'a EstimateDepositRequest,
    ) -> ApiFuture<'a, DepositEstimate> {
        let mut script = self.lock();
        script
            .invocations
            .push(ApiCall::EstimateDeposit(request.clone()));
        let result = next(&mut script.estimate_deposit, "/vms/v3/estimate");
        Box::pin(async move { result })
    }
}

/// Builds a running VM snapshot with the given status.
#[must_use]
pub fn running_vm(id: &str, status: &str) -> RunningInstance {
    RunningInstance {
        id: id.to_owned(),
        vm_name: Some(format!("{id}-name")),
        status: status.to_owned(),
        status_changed_at: String::from("2025-01-01T00:00:00Z"),
        price_per_epoch: String::from("1.25"),
        created_at: String::from("2025-01-01T00:00:00Z"),
        next_billing_at: String::from("2025-01-02T00:00:00Z"),
        reserved_balance: String::from("10"),
        total_spent: String::from("0"),
        os_image: Some(String::from("https://images.example/ubuntu.qcow2")),
        public_ip: Some(String::from("203.0.113.10")),
    }
}

/// Builds a registered SSH key with the given fingerprint.
#[must_use]
pub fn ssh_key(fingerprint: &str, public_key: &str) -> SshKey {
    SshKey {
        name: Some(String::from("laptop")),
        fingerprint: fingerprint.to_owned(),
        algorithm: String::from("ssh-ed25519"),
        comment: String::from("me@laptop"),
        public_key: public_key.to_owned(),
        active: true,
        created_at: String::from("2025-01-01T00:00:00Z"),
    }
}
