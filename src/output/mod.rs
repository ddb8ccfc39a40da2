use adbhost::Result;
use colored::*;
use comfy_table::Table;
use serde::Serialize;

use crate::cli::OutputType;

/// Unified output formatter for all commands
pub struct OutputFormatter {
    color_enabled: bool,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {
            color_enabled: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    /// Renders `items` in the requested format.
    pub fn list<T: TableFormat + Serialize>(&self, items: &[T], format: OutputType) -> Result<()> {
        match format {
            OutputType::Table => self.table(items),
            OutputType::Json => self.json(&items),
            OutputType::Plain => {
                for item in items {
                    println!("{}", item.row().join("\t"));
                }
                Ok(())
            }
        }
    }

    /// Format items as a table
    pub fn table<T: TableFormat>(&self, items: &[T]) -> Result<()> {
        let mut table = Table::new();
        table.set_header(T::headers());
        table.load_preset(comfy_table::presets::NOTHING);

        for item in items {
            table.add_row(item.row());
        }

        println!("{}", table);
        Ok(())
    }

    /// Format items as JSON
    pub fn json<T: Serialize + ?Sized>(&self, items: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(items)?);
        Ok(())
    }

    pub fn info(&self, msg: &str) {
        self.say(Tone::Info, msg);
    }

    pub fn success(&self, msg: &str) {
        self.say(Tone::Success, msg);
    }

    pub fn warning(&self, msg: &str) {
        self.say(Tone::Warning, msg);
    }

    pub fn error(&self, msg: &str) {
        self.say(Tone::Error, msg);
    }

    /// Status lines go to stdout, problems to stderr.
    fn say(&self, tone: Tone, msg: &str) {
        let line = match (self.color_enabled, tone) {
            (true, Tone::Info) => msg.bright_blue().to_string(),
            (true, Tone::Success) => msg.bright_green().to_string(),
            (true, Tone::Warning) => msg.bright_yellow().to_string(),
            (true, Tone::Error) => msg.bright_red().to_string(),
            (false, tone) => format!("{}: {}", tone.label(), msg),
        };
        match tone {
            Tone::Warning | Tone::Error => eprintln!("{}", line),
            Tone::Info | Tone::Success => println!("{}", line),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

impl Tone {
    fn label(self) -> &'static str {
        match self {
            Tone::Info => "INFO",
            Tone::Success => "OK",
            Tone::Warning => "WARNING",
            Tone::Error => "ERROR",
        }
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for types that can be formatted as a table
pub trait TableFormat {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

pub mod device;
pub mod file;
pub mod property;

pub use property::Property;
