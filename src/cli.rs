use clap::{Parser, Subcommand};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputType {
    Table,
    Json,
    Plain,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,

    /// ADB server hostname [default: config file, then localhost]
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// ADB server port [default: config file, then 5037]
    #[arg(long, short = 'P', global = true)]
    pub port: Option<u16>,

    /// Connection timeout in seconds, 0 to wait forever
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Device serial, or an alias from the config file
    #[arg(long, short = 's', global = true)]
    pub serial: Option<String>,

    /// Device transport id, wins over --serial
    #[arg(long, short = 't', global = true)]
    pub transport_id: Option<u32>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputType::Table)]
    pub output: OutputType,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Lists connected devices
    Devices,

    /// Gets the server version
    Version,

    /// Stops the ADB server
    KillServer,

    /// Connects the server to a network device
    Connect {
        /// host[:port]
        address: String,
    },

    /// Disconnects a network device
    Disconnect {
        /// host[:port]
        address: String,
    },

    /// Shows state, serial number, devpath and features of a device
    Info,

    /// Runs a shell command on a device
    Shell {
        /// Copy output as it arrives instead of collecting it first
        #[arg(long)]
        stream: bool,

        /// The command to execute
        #[arg(required = true, allow_hyphen_values = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Get device properties; all of them when no name is given
    Getprop {
        propnames: Vec<String>,
    },

    /// Forwards a local socket to a device socket
    Forward {
        /// e.g. tcp:6100
        local: String,
        /// e.g. tcp:7100 or localabstract:chrome_devtools_remote
        remote: String,
        /// Fail if the local socket is already forwarded
        #[arg(long)]
        no_rebind: bool,
    },

    /// Lists forward rules
    ForwardList,

    /// Shows mode, size and mtime of a device path
    Stat {
        path: String,
    },

    /// Lists a device directory
    Ls {
        #[arg(default_value = "/sdcard")]
        path: String,
    },

    /// Copies a local file to the device
    Push {
        src: String,
        dst: String,
        /// Octal permission bits [default: those of the local file]
        #[arg(long)]
        mode: Option<String>,
        /// Skip checking the remote size after the transfer
        #[arg(long)]
        no_verify: bool,
    },

    /// Copies a device file to the local machine
    Pull {
        src: String,
        /// Local destination [default: file name in the current directory]
        dst: Option<String>,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Devices)
    }
}
