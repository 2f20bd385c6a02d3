use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Client for the edge gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Session token for protected routes
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange credentials for a session token
    Login {
        #[arg(short, long, default_value = "user1")]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Fetch the protected data endpoint
    Data,
    /// Send a GET through the gateway and show which upstream answered
    Get { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    match cli.command {
        Commands::Login { username, password } => {
            let res = client
                .post(format!("{}/login", base))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Data => {
            let res = client.get(format!("{}/data", base)).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Get { path } => {
            let path = path.trim_start_matches('/');
            let res = client.get(format!("{}/{}", base, path)).headers(headers).send().await?;
            if let Some(gateway) = res.headers().get("x-gateway-used") {
                eprintln!("Served by: {}", gateway.to_str().unwrap_or("<non-ascii>"));
            }
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
            }
            println!("{}", text);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
