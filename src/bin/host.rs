//! Run a game as its coordinator over a `whodares-relay`, driven from stdin.
//!
//! Usage: `whodares-host <ROOM> [NAME]`, then one command per line:
//! `next`, `kick <id>`, `dare <text>`, `vote <id>`, `guess <id>`,
//! `choose <id>`, `timer <seconds>`, `quit`.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whodares::{
    config::{GameConfig, RelayConfig},
    coordinator::{Coordinator, CoordinatorService},
    protocol::Action,
    transport::websocket::WebSocketTransport,
    types::PeerId,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whodares=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(room) = args.next() else {
        eprintln!("usage: whodares-host <ROOM> [NAME]");
        std::process::exit(2);
    };
    let name = args.next().unwrap_or_else(|| "Host".to_string());

    let relay = RelayConfig::from_env();
    let (transport, events) = WebSocketTransport::connect(&relay.url, &room).await?;
    let host = CoordinatorService::spawn(
        Coordinator::new(name, GameConfig::from_env()),
        transport,
        events,
    );

    let mut snapshots = host.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let state = snapshots.borrow_and_update().clone();
            tracing::info!(
                "round {} {:?}: {} participants, {} dares, timer {:?}",
                state.round.round_number,
                state.round.phase,
                state.roster.len(),
                state.round.dare_submissions.len(),
                state.round.time_remaining
            );
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        let result = match command {
            "" => continue,
            "quit" => break,
            "next" => host.force_advance().await.map(|_| ()),
            "kick" => host.kick(PeerId::from(arg)).await.map(|_| ()),
            "dare" => {
                host.act(Action::SubmitDare {
                    dare: arg.to_string(),
                })
                .await
            }
            "vote" => {
                host.act(Action::VoteDare {
                    voted_for: PeerId::from(arg),
                })
                .await
            }
            "guess" => {
                host.act(Action::GuessOriginator {
                    guessed: PeerId::from(arg),
                })
                .await
            }
            "choose" => {
                host.act(Action::ChoosePerformer {
                    performer_id: PeerId::from(arg),
                })
                .await
            }
            "timer" => {
                let Ok(seconds) = arg.parse::<u32>() else {
                    eprintln!("timer needs a number of seconds");
                    continue;
                };
                let mut settings = host.state().round.settings;
                settings.round_timer = seconds;
                host.update_settings(settings).await
            }
            other => {
                eprintln!("unknown command: {}", other);
                continue;
            }
        };

        if let Err(e) = result {
            tracing::warn!("{} refused: {}", command, e);
        }
    }

    host.shutdown();
    Ok(())
}
