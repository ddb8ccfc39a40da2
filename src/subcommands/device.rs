use crate::output::Property;
use crate::subcommands::{CommandContext, CommandResult};

pub fn info(ctx: &CommandContext) -> CommandResult {
    let device = ctx.device()?;

    let mut rows: Vec<Property> = device
        .summary()?
        .into_iter()
        .map(|(name, value)| Property::new(name, value))
        .collect();
    rows.push(Property::new("features", device.get_features()?.join(",")));

    ctx.output.list(&rows, ctx.output_format)?;
    Ok(())
}
