use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courier_sync::api::{self, AppState};
use courier_sync::cli::{self, Commands, CredentialCommands, TokenCommands};
use courier_sync::config::{self, Config, LogFormat};
use courier_sync::courier::{CourierClient, CourierService, SystemClock, TokenManager};
use courier_sync::models::order::OrderRef;
use courier_sync::models::token::Credentials;
use courier_sync::store::memory::MemoryStore;
use courier_sync::store::postgres::PgStore;
use courier_sync::store::{OrderStore, SettingsStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(cfg.log_format);

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, args.in_memory, port).await
        }
        Some(Commands::Migrate) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await.context("migrations failed")?;
            println!("Migrations applied.");
            Ok(())
        }
        Some(command) => {
            let service = build_service(&cfg, args.in_memory).await?;
            handle_command(command, &service).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, args.in_memory, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "courier_sync=debug,tower_http=info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_service(cfg: &Config, in_memory: bool) -> anyhow::Result<CourierService> {
    let (settings, orders): (Arc<dyn SettingsStore>, Arc<dyn OrderStore>) = if in_memory {
        tracing::warn!("using in-memory store; nothing will be persisted");
        let store = MemoryStore::new();
        (Arc::new(store.clone()), Arc::new(store))
    } else {
        tracing::info!("Connecting to database...");
        let db = PgStore::connect(&cfg.database_url)
            .await
            .context("failed to connect to database")?;
        (Arc::new(db.clone()), Arc::new(db))
    };

    let client = Arc::new(CourierClient::new(&cfg.courier)?);
    let tokens = Arc::new(TokenManager::new(
        settings,
        client.clone(),
        Arc::new(SystemClock),
        cfg.courier.auto_reissue,
    ));
    Ok(CourierService::new(tokens, client, orders))
}

async fn run_server(cfg: Config, in_memory: bool, port: u16) -> anyhow::Result<()> {
    if !in_memory {
        tracing::info!("Running migrations...");
        let db = PgStore::connect(&cfg.database_url).await?;
        db.migrate().await?;
    }

    let service = build_service(&cfg, in_memory).await?;
    let state = Arc::new(AppState {
        courier: service,
        admin_key: cfg.admin_key.clone(),
    });

    let app = api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        provider = %cfg.courier.base_url,
        timeout_secs = cfg.courier.timeout.as_secs(),
        "courier sync listening on {}",
        addr
    );
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_command(command: Commands, service: &CourierService) -> anyhow::Result<()> {
    match command {
        Commands::Credentials { command } => match command {
            CredentialCommands::Set {
                client_id,
                client_secret,
                username,
                password,
            } => {
                let creds = Credentials {
                    client_id,
                    client_secret,
                    username,
                    password,
                };
                service.tokens().store_credentials(&creds).await?;
                println!("✅ Credentials stored for client '{}'.", creds.client_id);
            }
        },
        Commands::Connect => {
            let status = service.tokens().connect().await?;
            println!("✅ Connected to courier.");
            print_json(&status)?;
        }
        Commands::Token { command } => match command {
            TokenCommands::Status => print_json(&service.tokens().status().await?)?,
            TokenCommands::Ensure => {
                service.tokens().get_valid_token().await?;
                println!("✅ A usable courier token is cached.");
            }
        },
        Commands::Track(args) => {
            let outcome = service
                .track_and_sync(&OrderRef {
                    order_id: args.order_id,
                    consignment_id: args.consignment_id,
                })
                .await?;
            print_json(&outcome)?;
        }
        Commands::Cities => print_json(&service.cities().await?)?,
        Commands::Zones { city_id } => print_json(&service.zones(city_id).await?)?,
        Commands::Areas { zone_id } => print_json(&service.areas(zone_id).await?)?,
        Commands::Serve { .. } | Commands::Migrate => anyhow::bail!("command is handled before the service is built"),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
