//! Binary entry point for the Fluence provider.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing::error;

use terraform_provider_fluence::{
    ConfigError, FluenceEnv, FluenceProvider, PluginEnv, ServerError, logging, plugin,
};

mod cli;

use cli::{Cli, Command, SchemaCommand, ServeCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Server(#[from] ServerError),
    #[error("failed to write schema: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    if let Err(err) = logging::init_logging() {
        writeln!(io::stderr(), "{err}").ok();
    }

    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        error!(error = %err, "provider exited with an error");
        report_error(&err);
        process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.into_command() {
        Command::Serve(args) => serve_plugin(args).await,
        Command::Schema(args) => write_schema(io::stdout(), &args),
    }
}

fn plugin_env(args: ServeCommand) -> PluginEnv {
    PluginEnv {
        magic_cookie: args.magic_cookie,
        protocol_versions: args.protocol_versions,
        client_cert: args.client_cert,
        min_port: args.min_port,
        max_port: args.max_port,
    }
}

async fn serve_plugin(args: ServeCommand) -> Result<(), CliError> {
    let env = FluenceEnv::load_without_cli_args()?;
    let provider = FluenceProvider::new(env!("CARGO_PKG_VERSION"), env);
    plugin::serve(provider, &plugin_env(args), io::stdout()).await?;
    Ok(())
}

fn write_schema(mut target: impl Write, args: &SchemaCommand) -> Result<(), CliError> {
    let provider = FluenceProvider::new(env!("CARGO_PKG_VERSION"), FluenceEnv::default());
    let schema = provider.schema();
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn write_schema_emits_json(#[case] pretty: bool) {
        let mut buf = Vec::new();

        write_schema(&mut buf, &SchemaCommand { pretty })
            .unwrap_or_else(|err| panic!("schema: {err}"));

        let parsed: serde_json::Value = serde_json::from_slice(&buf)
            .unwrap_or_else(|err| panic!("schema output must be JSON: {err}"));
        assert!(parsed.pointer("/resources/fluence_vm").is_some());
        assert!(parsed.pointer("/data_sources/fluence_datacenters").is_some());
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::Server(ServerError::Io(String::from("broken pipe")));

        write_error(&mut buf, &err);

        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert_eq!(rendered, "plugin I/O failed: broken pipe\n");
    }

    #[test]
    fn missing_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["terraform-provider-fluence"])
            .unwrap_or_else(|err| panic!("parse: {err}"));

        assert!(matches!(cli.into_command(), Command::Serve(_)));
    }

    #[test]
    fn serve_flags_map_onto_plugin_env() {
        let cli = Cli::try_parse_from([
            "terraform-provider-fluence",
            "serve",
            "--magic-cookie",
            "cookie",
            "--protocol-versions",
            "5,6",
            "--min-port",
            "10000",
            "--max-port",
            "10010",
        ])
        .unwrap_or_else(|err| panic!("parse: {err}"));
        let Command::Serve(args) = cli.into_command() else {
            panic!("expected serve");
        };

        let env = plugin_env(args);

        assert_eq!(env.magic_cookie.as_deref(), Some("cookie"));
        assert_eq!(env.protocol_versions, vec![5, 6]);
        assert_eq!((env.min_port, env.max_port), (Some(10000), Some(10010)));
        assert!(env.client_cert.is_none());
    }
}
