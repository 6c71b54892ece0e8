use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use finance_gateway::auth::{issue_token, Claims};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the Finance Gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Fetch the OpenAPI document (non-production only)
    Docs,
    /// Send an authenticated GET to an API path
    Get {
        /// Path such as /api/payments/123
        path: String,
        #[arg(long, env = "GATEWAY_API_KEY")]
        api_key: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Mint a development bearer token signed with JWT_SECRET
    IssueToken {
        subject: String,
        /// Capabilities, comma-separated
        #[arg(long, value_delimiter = ',')]
        scopes: Vec<String>,
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
        #[arg(long, env = "JWT_SECRET")]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{base}/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Docs => {
            let res = client.get(format!("{base}/api-docs")).send().await?;
            print_response(res).await?;
        }
        Commands::Get { path, api_key, token } => {
            let mut headers = HeaderMap::new();
            if let Some(token) = token {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
            }
            if let Some(key) = api_key {
                headers.insert("x-api-key", HeaderValue::from_str(&key)?);
            }
            let res = client
                .get(format!("{base}/{}", path.trim_start_matches('/')))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::IssueToken {
            subject,
            scopes,
            ttl_secs,
            secret,
        } => {
            let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
            let mut claims = Claims::new(subject, now + ttl_secs, scopes);
            claims.iat = Some(now);
            println!("{}", issue_token(&secret, &claims)?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(id) = res.headers().get("x-request-id").and_then(|v| v.to_str().ok()) {
        eprintln!("X-Request-Id: {id}");
    }

    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {status}");
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
