//! Read-only data sources.
//!
//! Each data source wraps exactly one marketplace call and projects its
//! response into snake_case attributes.

pub mod available_countries;
pub mod available_hardware;
pub mod basic_configurations;
pub mod datacenters;
pub mod default_images;
pub mod estimate_deposit;
pub mod ssh_keys;
pub mod vms;

pub use available_countries::AvailableCountriesDataSource;
pub use available_hardware::AvailableHardwareDataSource;
pub use basic_configurations::BasicConfigurationsDataSource;
pub use datacenters::DatacentersDataSource;
pub use default_images::DefaultImagesDataSource;
pub use estimate_deposit::EstimateDepositDataSource;
pub use ssh_keys::SshKeysDataSource;
pub use vms::VmsDataSource;
