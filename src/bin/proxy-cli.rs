use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for a proxy coordinator node", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8090")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Action {
    Enable,
    Disable,
    Stop,
}

impl Action {
    fn as_path(self) -> &'static str {
        match self {
            Action::Enable => "enable",
            Action::Disable => "disable",
            Action::Stop => "stop",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show node status, mastership and reset state
    Status,
    /// List proxies known to this node
    Proxies,
    /// Register a proxy (host:port)
    Add { address: String },
    /// Unregister a proxy (host:port)
    Remove { address: String },
    /// Ask the master whether every proxy is healthy
    Health,
    /// Move proxies that are down back into error so they get resynced
    Reset,
    /// Force a full resync of every proxy
    Refresh,
    /// Enable, disable or stop contexts (all of them unless narrowed)
    Contexts {
        action: Action,
        #[arg(long)]
        route: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        path: Option<String>,
    },
    /// Switch this node's mastership
    Election {
        #[arg(long, action = clap::ArgAction::Set)]
        master: bool,
    },
    /// Show discovery events not yet acknowledged by a master
    Events,
    /// PING the proxies, or one route through them
    Ping {
        #[arg(long)]
        route: Option<String>,
    },
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

    let (method, path, body) = match cli.command {
        Commands::Status => (Method::GET, "status".to_string(), None),
        Commands::Proxies => (Method::GET, "proxies".to_string(), None),
        Commands::Add { address } => (Method::POST, "proxies".to_string(), Some(json!({ "address": address }))),
        Commands::Remove { address } => (Method::DELETE, format!("proxies/{}", address), None),
        Commands::Health => (Method::GET, "health".to_string(), None),
        Commands::Reset => (Method::POST, "reset".to_string(), None),
        Commands::Refresh => (Method::POST, "refresh".to_string(), None),
        Commands::Contexts { action, route, host, path } => (
            Method::POST,
            format!("contexts/{}", action.as_path()),
            Some(json!({ "route": route, "host": host, "path": path })),
        ),
        Commands::Election { master } => (Method::POST, "election".to_string(), Some(json!({ "master": master }))),
        Commands::Events => (Method::GET, "discovery-events".to_string(), None),
        Commands::Ping { route } => (Method::POST, "ping".to_string(), Some(json!({ "route": route }))),
    };

    let mut request = client
        .request(method, format!("{}/admin/{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    print_response(request.send().await?).await
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

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
