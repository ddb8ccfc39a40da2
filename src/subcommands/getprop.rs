use log::*;

use crate::cli::OutputType;
use crate::output::Property;
use crate::subcommands::{CommandContext, CommandResult};

/// Queries each named property on its own blocking task; no names means a
/// single full `getprop` dump.
pub async fn run(ctx: &CommandContext, propnames: &[String]) -> CommandResult {
    let device = ctx.device()?;

    let props: Vec<Property> = if propnames.is_empty() {
        device
            .get_props()?
            .into_iter()
            .map(|(name, value)| Property::new(name, value))
            .collect()
    } else {
        let mut handles = Vec::with_capacity(propnames.len());
        for name in propnames {
            let device = device.clone();
            let name = name.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let value = device.get_prop(&name);
                (name, value)
            }));
        }

        let mut props = Vec::with_capacity(handles.len());
        for handle in handles {
            let (name, value) = handle.await?;
            match value {
                Ok(value) => props.push(Property::new(name, value)),
                Err(e) => {
                    warn!("getprop {} failed: {}", name, e);
                    ctx.output.warning(&format!("{}: {}", name, e));
                }
            }
        }
        props
    };

    match (ctx.output_format, propnames.len()) {
        (OutputType::Table, 1) | (OutputType::Plain, 1) => {
            if let Some(prop) = props.first() {
                println!("{}", prop.value);
            }
        }
        (format, _) => ctx.output.list(&props, format)?,
    }
    Ok(())
}
