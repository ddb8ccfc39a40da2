use crate::subcommands::{CommandContext, CommandResult};

pub fn create(ctx: &CommandContext, local: &str, remote: &str, no_rebind: bool) -> CommandResult {
    let device = ctx.device()?;
    device.forward(local, remote, no_rebind)?;
    ctx.output
        .success(&format!("{} -> {} ({})", local, remote, device.identity()));
    Ok(())
}

pub fn list(ctx: &CommandContext) -> CommandResult {
    let device = ctx.device()?;
    let rules = device.forward_list()?;
    ctx.output.list(&rules, ctx.output_format)?;
    Ok(())
}
