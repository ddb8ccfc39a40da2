use log::*;

use crate::cli::OutputType;
use crate::output::Property;
use crate::subcommands::{CommandContext, CommandResult};

pub fn devices(ctx: &CommandContext) -> CommandResult {
    let devices = ctx.client.list_device_info()?;
    if devices.is_empty() && ctx.output_format != OutputType::Json {
        ctx.output.warning("No devices attached");
        return Ok(());
    }
    ctx.output.list(&devices, ctx.output_format)?;
    Ok(())
}

pub fn version(ctx: &CommandContext) -> CommandResult {
    let version = ctx.client.server_version()?;
    match ctx.output_format {
        OutputType::Json => ctx.output.json(&Property::new("version", version.to_string()))?,
        _ => println!("{}", version),
    }
    Ok(())
}

pub fn kill(ctx: &CommandContext) -> CommandResult {
    debug!("Stopping ADB server...");
    ctx.client.kill_server()?;
    ctx.output.success("ADB server stopped");
    Ok(())
}

pub fn connect(ctx: &CommandContext, address: &str) -> CommandResult {
    let message = ctx.client.connect(address)?;
    ctx.output.success(&message);
    Ok(())
}

pub fn disconnect(ctx: &CommandContext, address: &str) -> CommandResult {
    let message = ctx.client.disconnect(address)?;
    ctx.output.info(&message);
    Ok(())
}
