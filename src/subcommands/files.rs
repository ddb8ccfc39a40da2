use adbhost::adb::file_transfer::local_file_mode;
use adbhost::progress::IndicatifProgress;
use adbhost::AdbError;
use log::*;
use std::path::{Path, PathBuf};

use crate::cli::OutputType;
use crate::subcommands::{CommandContext, CommandResult};

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

pub fn stat(ctx: &CommandContext, path: &str) -> CommandResult {
    let stat = ctx.device()?.sync().stat(path)?;
    if !stat.exists() {
        return Err(format!("{}: No such file or directory", path).into());
    }
    ctx.output.list(&[stat], ctx.output_format)?;
    Ok(())
}

pub fn ls(ctx: &CommandContext, path: &str) -> CommandResult {
    let mut entries = ctx.device()?.sync().list(path)?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    ctx.output.list(&entries, ctx.output_format)?;
    Ok(())
}

fn parse_mode(mode: &str) -> Result<u32, AdbError> {
    u32::from_str_radix(mode.trim_start_matches("0o"), 8)
        .map_err(|_| AdbError::Usage(format!("invalid octal mode: {}", mode)))
}

pub fn push(
    ctx: &CommandContext,
    src: &str,
    dst: &str,
    mode: Option<&str>,
    check: bool,
) -> CommandResult {
    let src = expand(src);
    let mode = match mode {
        Some(mode) => parse_mode(mode)?,
        None => local_file_mode(&src)?,
    };
    debug!("Pushing {} with mode {:o}", src.display(), mode);

    let mut sync = ctx.device()?.sync();
    if ctx.output_format != OutputType::Json {
        let name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        sync = sync.with_progress(Box::new(IndicatifProgress::transfer(&name)));
    }

    let bytes = sync.push(&src, dst, mode, check)?;
    ctx.output
        .success(&format!("{}: {} bytes pushed", dst, bytes));
    Ok(())
}

/// Local file name for a pull without an explicit destination.
fn default_destination(src: &str) -> PathBuf {
    let name = Path::new(src)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "pulled".into());
    PathBuf::from(name)
}

pub fn pull(ctx: &CommandContext, src: &str, dst: Option<&str>) -> CommandResult {
    let mut dst = dst.map(expand).unwrap_or_else(|| default_destination(src));
    if dst.is_dir() {
        dst = dst.join(default_destination(src));
    }

    let mut sync = ctx.device()?.sync();
    if ctx.output_format != OutputType::Json {
        sync = sync.with_progress(Box::new(IndicatifProgress::transfer(src)));
    }

    let bytes = sync.pull(src, &dst)?;
    ctx.output
        .success(&format!("{}: {} bytes pulled", dst.display(), bytes));
    Ok(())
}
