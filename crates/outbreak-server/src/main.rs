use tokio::io::{AsyncBufReadExt, BufReader};

use outbreak_infection::config::InfectionConfig;
use outbreak_server::commands::{self, Console, ConsoleReply};
use outbreak_server::config::ServerConfig;
use outbreak_server::host::LoggingHost;
use outbreak_server::state::AppState;

#[tokio::main]
async fn main() {
    outbreak_server::init_tracing();

    tracing::info!("Outbreak server starting");

    let config = ServerConfig::load();
    let tuning = InfectionConfig::load();
    let (state, broadcasts) = match AppState::build(config, tuning) {
        Ok(built) => built,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            std::process::exit(1);
        },
    };
    let host = LoggingHost::spawn(broadcasts);

    let mut console = Console::new(state.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let reply = match commands::parse(&line) {
                        Ok(cmd) => console.execute(cmd).await.map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    };
                    match reply {
                        Ok(ConsoleReply::Text(text)) => println!("{text}"),
                        Ok(ConsoleReply::Quit) => break,
                        Err(e) => println!("error: {e}"),
                    }
                },
                Ok(None) => {
                    tracing::info!("Console closed, running until Ctrl-C");
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    break;
                },
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read console");
                    break;
                },
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    state.shutdown().await;
    if let Err(e) = host.await {
        tracing::error!(error = %e, "Host task failed");
    }
}
