//! Headless Pokelink client.
//!
//! Logs in, runs the frame loop at 60 Hz, and logs every event. Trade
//! offers and battle requests are politely declined, since there is no one
//! at the keyboard.
//!
//!   cargo run -p headless-client -- --user Ash --password pikachu
//!   cargo run -p headless-client -- --config pokelink.json --user Ash --password pikachu
//!
//! Ctrl-C disconnects cleanly. Set `RUST_LOG=pokelink=debug` for more.

use std::time::Duration;

use clap::Parser;
use pokelink::prelude::*;
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "headless-client")]
#[command(about = "Headless Pokelink client")]
struct Args {
    #[arg(short, long, help = "JSON client config file")]
    config: Option<String>,

    #[arg(short, long, default_value = "Ash", help = "Account name")]
    user: String,

    #[arg(short, long, default_value = "", help = "Account password")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("headless_client=info".parse()?))
        .init();

    let Args {
        config,
        user,
        password,
    } = Args::parse();
    let config = match config {
        Some(path) => ClientConfig::load(&path)?,
        None => ClientConfig::default(),
    };

    let mut client = Client::new(config, PartyInventory::new(6), MemoryPersistence::default());
    tracing::info!(host = %client.config().host, port = client.config().port, %user, "connecting");
    if !client.connect(&user, &password).await {
        let reason = client
            .last_error()
            .map_or("unknown error".to_string(), |e| e.message.clone());
        tracing::error!(%reason, "could not connect");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(FRAME);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last = tokio::time::Instant::now();

    loop {
        tokio::select! {
            now = ticker.tick() => {
                let elapsed = now - last;
                last = now;
                if !frame(&mut client, elapsed) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                client.disconnect("quit");
                break;
            }
        }
    }
    Ok(())
}

/// One frame. Returns `false` once the session is over.
fn frame(client: &mut Client<PartyInventory, MemoryPersistence>, elapsed: Duration) -> bool {
    for event in client.update(elapsed) {
        match event {
            ClientEvent::Connected { client_id, username } => {
                tracing::info!(%client_id, %username, "logged in");
            }
            ClientEvent::Disconnected { reason } => {
                tracing::info!(%reason, "disconnected");
                return false;
            }
            ClientEvent::Chat(line) => {
                tracing::info!(from = %line.username, channel = ?line.channel, "{}", line.text);
            }
            ClientEvent::Trade(TradeEvent::OfferReceived { from, username, creature, .. }) => {
                tracing::info!(%from, %username, species = %creature.species, "declining trade offer");
                client.trade_decline(TradeDeclineReason::Declined);
            }
            ClientEvent::Battle(BattleEvent::RequestReceived { from, username, format }) => {
                tracing::info!(%from, %username, ?format, "declining battle request");
                if let Err(e) = client.battle_decline(BattleDeclineReason::Declined) {
                    tracing::warn!(error = %e, "decline failed");
                }
            }
            other => tracing::debug!(?other, "event"),
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults_without_flags() {
        let args = Args::try_parse_from(["headless-client"]).unwrap();
        assert_eq!(args.config, None);
        assert_eq!(args.user, "Ash");
        assert_eq!(args.password, "");
    }

    #[test]
    fn test_args_all_flags_parsed() {
        let args = Args::try_parse_from([
            "headless-client",
            "--config",
            "pokelink.json",
            "-u",
            "Misty",
            "--password",
            "staryu",
        ])
        .unwrap();
        assert_eq!(args.config.as_deref(), Some("pokelink.json"));
        assert_eq!(args.user, "Misty");
        assert_eq!(args.password, "staryu");
    }
}
