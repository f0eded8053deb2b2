use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

/// Courier sync: shipment registration and tracking for the storefront
#[derive(Parser)]
#[command(name = "courier-sync", version, about)]
pub struct Cli {
    /// Use an in-process store instead of PostgreSQL (nothing is persisted)
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to COURIER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run database migrations and exit
    Migrate,

    /// Manage the stored courier credential set
    Credentials {
        #[command(subcommand)]
        command: CredentialCommands,
    },

    /// Issue a fresh token from the stored credentials
    Connect,

    /// Inspect the cached courier token
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Track a shipment and sync its status onto the order
    Track(TrackArgs),

    /// List the courier's cities
    Cities,

    /// List zones in a city
    Zones { city_id: i64 },

    /// List areas in a zone
    Areas { zone_id: i64 },
}

#[derive(Subcommand)]
pub enum CredentialCommands {
    /// Store the credential set (replaces any previous one)
    Set {
        #[arg(long, env = "PATHAO_CLIENT_ID")]
        client_id: String,
        #[arg(long, env = "PATHAO_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
        #[arg(long, env = "PATHAO_USERNAME")]
        username: String,
        #[arg(long, env = "PATHAO_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Show whether a usable token is cached and when it expires
    Status,
    /// Make sure a usable token exists, refreshing if needed
    Ensure,
}

#[derive(Args)]
#[group(required = true, multiple = true)]
pub struct TrackArgs {
    #[arg(long)]
    pub order_id: Option<Uuid>,
    #[arg(long)]
    pub consignment_id: Option<String>,
}
