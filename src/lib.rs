//! Infrastructure-as-code provider for the Fluence VM marketplace.
//!
//! The crate wraps the Fluence REST API in a typed client, exposes VMs and
//! SSH keys as managed resources and the marketplace catalog as data
//! sources, and serves them to Terraform over the plugin protocol (go-plugin
//! handshake plus `tfplugin6` gRPC).

pub mod api;
pub mod client;
pub mod config;
pub mod data_sources;
pub mod framework;
pub mod logging;
pub mod models;
pub mod plugin;
pub mod provider;
pub mod resources;
pub mod test_support;

pub use api::{ApiFuture, FluenceApi};
pub use client::{ClientError, DEFAULT_HOST, FluenceClient};
pub use config::{ConfigError, FluenceEnv, ProviderModel, ResolvedConfig};
pub use framework::{DataSource, Diagnostic, Diagnostics, ReadOutcome, Resource, Schema};
pub use plugin::{PluginEnv, ServerError, serve};
pub use provider::{FluenceProvider, Metadata, ProviderSchema};
pub use resources::vm::{PollPolicy, RefreshError, RetryPolicy, VmWaitError};
pub use resources::{SshKeyResource, VmResource};
