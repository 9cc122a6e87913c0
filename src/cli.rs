use clap::{Parser, Subcommand};
use std::path::PathBuf;

use volt_tui::utils::version;

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    /// Base URL of the Volt API, overrides the configuration file
    #[arg(long, global = true, env = "VOLT_TUI_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "VOLT_TUI_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "VOLT_TUI_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged in user
    Whoami,
    /// Print your files and storage usage
    List,
    /// Delete one of your files by its id
    Delete { id: u64 },
    /// Upload files without starting the dashboard
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Make the uploaded files public
        #[arg(long)]
        public: bool,
    },
    /// Interactive dashboard (default)
    Dashboard,
}
