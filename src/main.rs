// ABOUTME: Entry point for atelier — a terminal chat client for a local Ollama server.
// ABOUTME: Parses CLI args, loads settings and sessions, and runs the app loop.

use clap::Parser;

use atelier::app::App;
use atelier::config::{sessions_path, Settings};
use atelier::session::persistence;

/// Chat with a local Ollama server and collect generated files into a
/// project workspace.
#[derive(Parser)]
#[command(name = "atelier", version)]
struct Args {
    /// Server address (overrides the saved setting)
    #[arg(long)]
    server: Option<String>,

    /// Model name (overrides the saved setting)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut settings = Settings::load()?;
    if let Some(server) = args.server {
        settings.server_address = server;
    }
    if let Some(model) = args.model {
        settings.model = model;
    }

    let sessions = match persistence::load_sessions() {
        Ok(sessions) => sessions,
        Err(e) => {
            log::warn!("could not load saved sessions: {}", e);
            Vec::new()
        }
    };

    let app = App::new(settings, sessions, sessions_path());
    app.run().await
}
