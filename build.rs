//! Build script for the `terraform-provider-fluence` binary.
//!
//! Generates the plugin protocol bindings from `proto/` and renders the man
//! page into the build output directory, where the packaging pipeline expects
//! it.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

const PROTOS: [&str; 2] = ["proto/tfplugin6.proto", "proto/grpc_controller.proto"];

fn compile_protos() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = prost_build::Config::new();
    config.protoc_executable(protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos_with_config(config, &PROTOS, &["proto"])?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;
    for proto in PROTOS {
        writeln!(stdout, "cargo:rerun-if-changed={proto}")?;
    }

    compile_protos()?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let mut buffer = Vec::new();
    Man::new(Cli::command()).render(&mut buffer)?;

    let mut file = File::create(out_dir.join("terraform-provider-fluence.1"))?;
    file.write_all(&buffer)?;

    Ok(())
}
