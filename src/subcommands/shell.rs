use adbhost::adb::ShellResult;
use std::io::{self, Write};
use std::time::Duration;

use crate::subcommands::{CommandContext, CommandResult};

pub fn run(ctx: &CommandContext, command: &str, stream: bool) -> CommandResult {
    let device = ctx.device()?;

    if stream {
        // Long-running commands are bounded by the user, not by a deadline.
        match device.shell(command, true, Duration::ZERO)? {
            ShellResult::StreamHandle(mut conn) => {
                io::copy(&mut conn, &mut io::stdout().lock())?;
                conn.close();
            }
            ShellResult::CapturedOutput(output) => print!("{}", output),
        }
        return Ok(());
    }

    let output = device.shell_output(command)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
