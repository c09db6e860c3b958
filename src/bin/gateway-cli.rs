use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored route definitions
    Routes,
    /// List compiled routes in evaluation order
    Compiled,
    /// Show one route definition
    Show { id: String },
    /// Save a route definition read from a JSON or TOML file
    Save { file: PathBuf },
    /// Delete a route definition
    Delete { id: String },
    /// Pull from the definition sources and recompile
    Refresh,
    /// List weight groups
    Weights,
    /// Set the weight of a route inside a group
    SetWeight { group: String, route_id: String, weight: u32 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Routes => client.get(format!("{}/admin/routes", base)),
        Commands::Compiled => client.get(format!("{}/admin/routes/compiled", base)),
        Commands::Show { id } => client.get(format!("{}/admin/routes/{}", base, id)),
        Commands::Save { file } => {
            let definition = read_definition(&file)?;
            client.post(format!("{}/admin/routes", base)).json(&definition)
        }
        Commands::Delete { id } => client.delete(format!("{}/admin/routes/{}", base, id)),
        Commands::Refresh => client.post(format!("{}/admin/refresh", base)),
        Commands::Weights => client.get(format!("{}/admin/weights", base)),
        Commands::SetWeight { group, route_id, weight } => client
            .post(format!("{}/admin/weights", base))
            .json(&json!({ "group": group, "route_id": route_id, "weight": weight })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await?;
    Ok(())
}

fn read_definition(file: &PathBuf) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    let is_toml = file.extension().is_some_and(|ext| ext == "toml");
    let value = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(value)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
