use clap::{Parser, Subcommand};

/// Courier: approval and notification coordination service
#[derive(Parser)]
#[command(name = "courier", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides COURIER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load and validate configuration, then print it as YAML
    CheckConfig,
}
