pub mod device;
pub mod files;
pub mod forward;
pub mod getprop;
pub mod server;
pub mod shell;

use adbhost::adb::{AdbClient, AdbDevice, DeviceIdentity};
use adbhost::config::{ClientConfig, Config};
use log::*;
use std::error::Error;
use std::time::Duration;

use crate::cli::{Cli, Commands, OutputType};
use crate::output::OutputFormatter;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Shared state for all commands
pub struct CommandContext {
    pub client: AdbClient,
    pub identity: DeviceIdentity,
    pub output_format: OutputType,
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Config file and environment first, command-line flags on top.
    pub fn from_cli(cli: &Cli) -> Self {
        let config = Config::load();
        let client_config = apply_flags(config.client_config(), cli);
        debug!("Client config: {:?}", client_config);

        let identity = DeviceIdentity {
            serial: cli.serial.as_deref().map(|s| config.resolve_serial(s)),
            transport_id: cli.transport_id,
        };

        Self {
            client: AdbClient::new(client_config),
            identity,
            output_format: cli.output,
            output: OutputFormatter::new(),
        }
    }

    /// Device for commands that require one
    pub fn device(&self) -> adbhost::Result<AdbDevice> {
        self.client.device(self.identity.clone())
    }
}

fn apply_flags(mut config: ClientConfig, cli: &Cli) -> ClientConfig {
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    config
}

pub async fn run(cli: &Cli) -> CommandResult {
    let ctx = CommandContext::from_cli(cli);

    match cli.command() {
        Commands::Devices => server::devices(&ctx),
        Commands::Version => server::version(&ctx),
        Commands::KillServer => server::kill(&ctx),
        Commands::Connect { address } => server::connect(&ctx, &address),
        Commands::Disconnect { address } => server::disconnect(&ctx, &address),
        Commands::Info => device::info(&ctx),
        Commands::Shell { stream, command } => shell::run(&ctx, &command.join(" "), stream),
        Commands::Getprop { propnames } => getprop::run(&ctx, &propnames).await,
        Commands::Forward {
            local,
            remote,
            no_rebind,
        } => forward::create(&ctx, &local, &remote, no_rebind),
        Commands::ForwardList => forward::list(&ctx),
        Commands::Stat { path } => files::stat(&ctx, &path),
        Commands::Ls { path } => files::ls(&ctx, &path),
        Commands::Push {
            src,
            dst,
            mode,
            no_verify,
        } => files::push(&ctx, &src, &dst, mode.as_deref(), !no_verify),
        Commands::Pull { src, dst } => files::pull(&ctx, &src, dst.as_deref()),
    }
}
