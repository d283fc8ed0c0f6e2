use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/bribebank.db)
  PORT        (default: 5150 or config.listen_port)
  RUST_LOG    (default: info)

The `install` command writes a systemd unit and a default config with a fresh
JWT secret. Run it as root (or with sudo) for a system-wide install.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "bribebank-server",
    version,
    about = "BribeBank household task and reward server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install systemd unit + default config (run as root for system-wide)
    Install {
        #[arg(long, default_value = "/etc/systemd/system/bribebank-server.service")]
        unit_path: PathBuf,
        #[arg(long, default_value = "/etc/bribebank/config.yaml")]
        config_path: PathBuf,
        /// Database path placed in the unit environment
        #[arg(long, default_value = "/var/lib/bribebank/bribebank.db")]
        db_path: PathBuf,
        /// Absolute path to the server binary used in ExecStart
        #[arg(long)]
        bin_path: Option<PathBuf>,
        #[arg(long, default_value = "bribebank")]
        user: String,
        #[arg(long, default_value = "bribebank")]
        group: String,
        #[arg(long, default_value = "/var/lib/bribebank")]
        working_dir: PathBuf,
        /// Overwrite files if they already exist
        #[arg(long)]
        force: bool,
    },
    /// Uninstall systemd unit; optionally remove config
    Uninstall {
        #[arg(long, default_value = "/etc/systemd/system/bribebank-server.service")]
        unit_path: PathBuf,
        /// Also remove config file
        #[arg(long)]
        remove_config: bool,
        #[arg(long, default_value = "/etc/bribebank/config.yaml")]
        config_path: PathBuf,
    },
}
