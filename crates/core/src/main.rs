use clap::Parser;

#[derive(Parser)]
#[command(
    name = "busbar_server",
    version,
    about = "Backend for the Busbar visual MCP server editor"
)]
struct Cli {
    /// Override the listen port (PORT)
    #[arg(long)]
    port: Option<u16>,
    /// Override the bind address (BIND_ADDRESS)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env from CWD, falling back to the executable's directory
    // (deployed layout).
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
    tracing_subscriber::fmt::init();

    let mut config = busbar_core::config::AppConfig::load()?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    busbar_core::run_server(config).await
}
