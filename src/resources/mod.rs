//! Managed resources.

pub mod ssh_key;
pub mod vm;

pub use ssh_key::SshKeyResource;
pub use vm::VmResource;
