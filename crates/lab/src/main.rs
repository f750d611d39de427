//! The `vlab` command line.

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::{Report, Result};

use vlab::config::{LabConfig, DEFAULT_CONFIG_PATH};
use vlab::lab::{Lab, LabCommands};

/// Build, run and tear down a load-balanced virtual network lab.
///
/// The lab is one load balancer (`lb`), one client (`c1`) and 2 to 5 web
/// servers (`s1`..`s5`) on the LAN1 and LAN2 Open vSwitch bridges.
#[derive(Debug, Parser)]
#[command(name = "vlab", version)]
struct Cli {
    /// Configuration file (JSON, or TOML with a .toml extension)
    #[clap(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: Utf8PathBuf,

    /// Hypervisor connection URI (e.g. qemu:///system); overrides the config file
    #[clap(long, global = true)]
    connect: Option<String>,

    /// Log at debug level
    #[clap(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: LabCommands,
}

/// Install the tracing subscriber.
///
/// RUST_LOG wins when set; otherwise `debug` if requested, else `info`.
fn install_tracing(debug: bool) {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "info" };
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

fn main() -> Result<(), Report> {
    let cli = Cli::parse();
    color_eyre::install()?;
    // The config decides the log level, so it is read before logging is up
    // and its error reported after.
    let config = LabConfig::load(&cli.config);
    let debug = cli.verbose || config.as_ref().is_ok_and(|c| c.debug);
    install_tracing(debug);

    let config = config?;
    tracing::debug!("Loaded configuration from {}", cli.config);
    let lab = Lab::new(config, cli.connect)?;
    cli.command.run(&lab)
}
