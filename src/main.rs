use std::error::Error;
use std::process::exit;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campsync::db::Database;
use campsync::sync::{TokenManager, ZohoClient, ZohoSyncService};

#[derive(Parser)]
#[command(name = "campsync", about = "Sync Zoho Campaigns into a local records database")]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, global = true, default_value = "campsync.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the Zoho OAuth client credentials
    Configure {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
        #[arg(long)]
        redirect_uri: String,
    },
    /// Exchange an authorization code and activate the integration
    Connect {
        code: String,
    },
    /// List recent campaigns from Zoho
    Campaigns {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Fetch the report for one campaign
    Report {
        campaign_key: String,
    },
    /// Fetch recipient rows for one campaign and action category
    Recipients {
        campaign_key: String,
        #[arg(long, default_value = "openedcontacts")]
        action: String,
        #[arg(long, default_value_t = 1)]
        from_index: u32,
        #[arg(long, default_value_t = 20)]
        range: u32,
    },
    /// Run a full sync pass over recent campaigns
    Sync {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Re-sync analytics and recipients for one local campaign by name
    SyncCampaign {
        name: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("campsync=info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("{}", e);
        exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let db = Arc::new(Database::new(&cli.db).await?);
    let tokens = TokenManager::new(db.clone());

    match cli.command {
        Commands::Configure {
            client_id,
            client_secret,
            redirect_uri,
        } => {
            db.save_client_config(&client_id, &client_secret, &redirect_uri)
                .await?;
            println!("Client credentials saved");
        }
        Commands::Connect { code } => {
            tokens.exchange_code(&code).await?;
            println!("Zoho integration connected");
        }
        Commands::Campaigns { limit } => {
            let client = ZohoClient::new(tokens);
            let page = client.list_recent_campaigns(limit).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Report { campaign_key } => {
            let client = ZohoClient::new(tokens);
            let report = client.get_campaign_report(&campaign_key).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Recipients {
            campaign_key,
            action,
            from_index,
            range,
        } => {
            let client = ZohoClient::new(tokens);
            let page = client
                .get_campaign_recipients(&campaign_key, &action, from_index, range)
                .await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Sync { limit } => {
            let client = ZohoClient::new(tokens);
            let service = ZohoSyncService::new(client, db).with_campaign_limit(limit);
            let outcome = service.sync_all_campaigns().await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::SyncCampaign { name } => {
            let client = ZohoClient::new(tokens);
            let service = ZohoSyncService::new(client, db);
            let stats = service.sync_campaign_by_name(&name).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
