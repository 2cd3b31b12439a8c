use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "charitrace-cli")]
#[command(about = "Operator CLI for the Charitrace verification service", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CHARITRACE_URL", default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "CHARITRACE_ADMIN_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service, database and chain status
    Status,
    /// Aggregate verification coverage
    Stats,
    /// List successful donations without a verified record
    Unverified {
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
    /// Re-submit donations whose last chain submission failed
    Retry,
    /// Verify several donations in order
    Batch {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Verify one donation
    Verify { id: i64 },
    /// Show the verification status of one donation
    Verification { id: i64 },
    /// Read a donation back from the ledger contract by its on-chain id
    ChainDonation { id: u64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))?,
        );
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Stats => client.get(format!("{}/api/verification/stats", base)),
        Commands::Unverified { limit } => client
            .get(format!("{}/admin/verification/unverified", base))
            .query(&[("limit", limit)]),
        Commands::Retry => client.post(format!("{}/admin/verification/retry", base)),
        Commands::Batch { ids } => client
            .post(format!("{}/admin/verification/batch", base))
            .json(&json!({ "donation_ids": ids })),
        Commands::Verify { id } => client.post(format!("{}/api/donations/{}/verify", base, id)),
        Commands::Verification { id } => {
            client.get(format!("{}/api/donations/{}/verification", base, id))
        }
        Commands::ChainDonation { id } => client.get(format!("{}/api/chain/donations/{}", base, id)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
