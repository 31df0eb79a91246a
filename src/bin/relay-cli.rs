use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the JSON-RPC relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show relay status and session counts
    Status,
    /// Mint a fresh session key
    Key,
    /// Send one JSON-RPC body through the relay
    Call {
        /// Session key
        key: String,
        /// JSON-RPC request or batch
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/_relay/status", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Key => {
            let key = uuid::Uuid::new_v4();
            println!("{}", key);
            println!("rpc:    {}/rpc/{}", cli.url, key);
            println!("socket: {}/{}", cli.url.replacen("http", "ws", 1), key);
        }
        Commands::Call { key, body } => {
            let res = client
                .post(format!("{}/rpc/{}", cli.url, key))
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{} {}", status, serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{} {}", status, text),
    }
    Ok(())
}
