//! Generated protobuf and gRPC bindings.
//!
//! `tfplugin6` is the Terraform plugin protocol, version 6. `controller` is
//! the plugin controller service the plugin client calls to stop a plugin.

#![allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::restriction,
    reason = "generated by tonic-build"
)]

/// Terraform plugin protocol, version 6.
pub mod tfplugin6 {
    tonic::include_proto!("tfplugin6");
}

/// Plugin controller service.
pub mod controller {
    tonic::include_proto!("plugin");
}
