//! Activation and refresh polling for VMs.
//!
//! The marketplace offers no lookup by identifier, so both loops list every
//! VM on the account and scan for the one they track.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::api::FluenceApi;
use crate::client::ClientError;
use crate::framework::AttrValue;
use crate::models::RunningInstance;

use super::VmModel;

/// Status reported once a VM is ready.
pub const ACTIVE_STATUS: &str = "Active";

/// Statuses that end the activation wait immediately.
pub const FAILURE_STATUSES: [&str; 4] = ["failed", "error", "Failed", "Error"];

/// Fixed-interval schedule for the activation wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Delay between consecutive status checks.
    pub interval: Duration,
    /// Total time allowed for the VM to become active.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Checks every 10 seconds for up to 10 minutes.
    pub const DEFAULT: Self = Self {
        interval: Duration::from_secs(10),
        timeout: Duration::from_secs(600),
    };

    /// Number of status checks the timeout allows; at least one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        let attempts = self
            .timeout
            .as_millis()
            .checked_div(self.interval.as_millis())
            .unwrap_or(1)
            .max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Fixed-delay retry schedule for refreshing a VM.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Number of listings to try.
    pub attempts: u32,
    /// Delay before every attempt but the first.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Five attempts, two seconds apart.
    pub const DEFAULT: Self = Self {
        attempts: 5,
        delay: Duration::from_secs(2),
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Errors raised while waiting for a VM to become active.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VmWaitError {
    /// The VM reached a failure status.
    #[error("VM creation failed with status: {status}")]
    Failed {
        /// VM being waited on.
        vm_id: String,
        /// Failure status reported by the API.
        status: String,
    },
    /// The attempt budget ran out before the VM became active.
    #[error(
        "VM did not become active within {} (current status: {status})",
        format_duration(*.timeout)
    )]
    Timeout {
        /// VM being waited on.
        vm_id: String,
        /// Configured timeout.
        timeout: Duration,
        /// Last observed status, or `unknown`.
        status: String,
    },
}

/// Errors raised while refreshing a VM.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RefreshError {
    /// Listing VMs failed.
    #[error("unable to read VMs: {0}")]
    Api(#[from] ClientError),
    /// The VM never appeared in the listing.
    #[error("VM not found after {attempts} attempts")]
    NotFound {
        /// VM being refreshed.
        vm_id: String,
        /// Attempts made.
        attempts: u32,
    },
}

fn decimal(value: u128, scale: u128) -> String {
    let whole = value.div_euclid(scale);
    let rest = value.rem_euclid(scale);
    if rest == 0 {
        return whole.to_string();
    }
    let width = usize::try_from(scale.ilog10()).unwrap_or_default();
    let fraction = format!("{rest:0width$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Renders a duration the way Terraform users read them: `10m0s`, `1h0m0s`,
/// `1.5s`, `250ms`.
#[must_use]
pub(crate) fn format_duration(duration: Duration) -> String {
    const NANOS_PER_SECOND: u128 = 1_000_000_000;

    let nanos = duration.as_nanos();
    if nanos == 0 {
        return String::from("0s");
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}\u{b5}s", decimal(nanos, 1_000));
    }
    if nanos < NANOS_PER_SECOND {
        return format!("{}ms", decimal(nanos, 1_000_000));
    }

    let secs = duration.as_secs();
    let hours = secs.div_euclid(3600);
    let minutes = secs.rem_euclid(3600).div_euclid(60);
    let seconds = decimal(
        u128::from(secs.rem_euclid(60)) * NANOS_PER_SECOND + u128::from(duration.subsec_nanos()),
        NANOS_PER_SECOND,
    );
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m{seconds}s"),
        _ => format!("{hours}h{minutes}m{seconds}s"),
    }
}

fn find_vm(vms: Vec<RunningInstance>, vm_id: &str) -> Option<RunningInstance> {
    vms.into_iter().find(|vm| {
        trace!(api_vm_id = %vm.id, target_vm_id = vm_id, "checking VM");
        vm.id == vm_id
    })
}

/// Polls the VM listing until `vm_id` is active, has failed, or the attempt
/// budget runs out. Every sighting is copied into `model`.
pub(crate) async fn wait_for_active(
    api: &dyn FluenceApi,
    vm_id: &str,
    policy: PollPolicy,
    model: &mut VmModel,
) -> Result<(), VmWaitError> {
    let max_attempts = policy.max_attempts();
    debug!(vm_id, max_attempts, "waiting for VM to become active");

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            debug!(vm_id, attempt, max_attempts, "waiting for VM status check");
            sleep(policy.interval).await;
        }

        let vms = match api.list_vms().await {
            Ok(vms) => vms,
            Err(err) => {
                warn!(vm_id, attempt, error = %err, "error retrieving VMs while waiting for availability");
                continue;
            }
        };

        let Some(vm) = find_vm(vms, vm_id) else {
            warn!(vm_id, attempt, "VM not found while waiting for availability");
            continue;
        };

        debug!(vm_id, attempt, status = %vm.status, "checking VM status");
        model.apply_snapshot(&vm);

        if vm.status == ACTIVE_STATUS {
            info!(vm_id, attempt, "VM is now active");
            return Ok(());
        }

        if FAILURE_STATUSES.contains(&vm.status.as_str()) {
            return Err(VmWaitError::Failed {
                vm_id: vm_id.to_owned(),
                status: vm.status,
            });
        }

        debug!(vm_id, attempt, current_status = %vm.status, "VM not yet active, continuing to wait");
    }

    let status = match &model.status {
        AttrValue::Known(status) => status.clone(),
        AttrValue::Null | AttrValue::Unknown => String::from("unknown"),
    };
    Err(VmWaitError::Timeout {
        vm_id: vm_id.to_owned(),
        timeout: policy.timeout,
        status,
    })
}

/// Looks `vm_id` up in the VM listing, retrying while it is absent.
pub(crate) async fn refresh(
    api: &dyn FluenceApi,
    vm_id: &str,
    policy: RetryPolicy,
) -> Result<RunningInstance, RefreshError> {
    debug!(vm_id, "attempting to refresh VM data");

    for attempt in 1..=policy.attempts {
        if attempt > 1 {
            debug!(vm_id, attempt, "retrying VM data refresh");
            sleep(policy.delay).await;
        }

        let vms = api.list_vms().await?;
        debug!(vm_id, vm_count = vms.len(), "retrieved VMs from API");

        if let Some(vm) = find_vm(vms, vm_id) {
            debug!(vm_id, attempt, status = %vm.status, "found VM in API");
            return Ok(vm);
        }

        debug!(vm_id, attempt, "VM not found in API response");
    }

    Err(RefreshError::NotFound {
        vm_id: vm_id.to_owned(),
        attempts: policy.attempts,
    })
}
