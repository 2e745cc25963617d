//! Command-line interface definitions for the `terraform-provider-fluence`
//! binary.
//!
//! The parser lives here so the build script can render the manual page from
//! the same structures.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `terraform-provider-fluence` binary.
#[derive(Debug, Parser)]
#[command(
    name = "terraform-provider-fluence",
    about = "Manage Fluence marketplace VMs and SSH keys from Terraform",
    version,
    args_conflicts_with_subcommands = true
)]
pub(crate) struct Cli {
    /// Subcommand to run; defaults to `serve`.
    #[command(subcommand)]
    pub(crate) command: Option<Command>,
    /// Plugin settings used when no subcommand is given.
    #[command(flatten)]
    pub(crate) serve: ServeCommand,
}

impl Cli {
    /// Resolves the subcommand, treating a bare invocation as `serve`.
    pub(crate) fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

/// Subcommands of the provider binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Serve the Terraform plugin protocol to the launching Terraform process.
    #[command(name = "serve", about = "Serve the Terraform plugin protocol")]
    Serve(ServeCommand),
    /// Print the provider, resource and data source schemas as JSON.
    #[command(name = "schema", about = "Print the provider schema as JSON")]
    Schema(SchemaCommand),
}

/// Handshake settings Terraform passes through the environment.
#[derive(Clone, Debug, Default, Args)]
pub(crate) struct ServeCommand {
    /// Magic cookie proving the binary was launched by Terraform.
    #[arg(long, env = "TF_PLUGIN_MAGIC_COOKIE", hide_env_values = true)]
    pub(crate) magic_cookie: Option<String>,
    /// Plugin protocol versions the client speaks.
    #[arg(long, env = "PLUGIN_PROTOCOL_VERSIONS", value_delimiter = ',')]
    pub(crate) protocol_versions: Vec<u32>,
    /// PEM certificate of the client; enables mutual TLS.
    #[arg(long, env = "PLUGIN_CLIENT_CERT", hide_env_values = true)]
    pub(crate) client_cert: Option<String>,
    /// Lowest port the plugin may listen on.
    #[arg(long, env = "PLUGIN_MIN_PORT")]
    pub(crate) min_port: Option<u16>,
    /// Highest port the plugin may listen on.
    #[arg(long, env = "PLUGIN_MAX_PORT")]
    pub(crate) max_port: Option<u16>,
}

/// Arguments for the `schema` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SchemaCommand {
    /// Pretty-print the JSON document.
    #[arg(long)]
    pub(crate) pretty: bool,
}
