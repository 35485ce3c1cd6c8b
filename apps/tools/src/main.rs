use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use game::{BroadcastHub, HubConfig, SessionManager, StatsStore};
use shared::domain::Username;
use storage::{KeyValueStore, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/game.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every player's wins and losses.
    Leaderboard,
    /// Show the cards left in a player's deck.
    Deck { username: String },
    /// Deal a fresh deck and clear banked defuses. Stats are kept.
    Reset { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let store: Arc<dyn KeyValueStore> = Arc::new(Storage::new(&cli.database_url).await?);
    let hub = Arc::new(BroadcastHub::new(
        StatsStore::new(Arc::clone(&store)),
        HubConfig::default(),
    ));
    let game = SessionManager::new(store, hub);

    match cli.command {
        Command::Leaderboard => {
            for entry in game.leaderboard().await? {
                println!("{:<24} wins={} losses={}", entry.username, entry.wins, entry.losses);
            }
        }
        Command::Deck { username } => {
            let username = Username::parse(username)?;
            if !game.decks().has_deck(&username).await? {
                bail!("no game in progress for {username}");
            }
            let deck = game.decks().read_deck(&username).await?;
            let charges = game.stats().defuse_charges(&username).await?;
            let cards: Vec<&str> = deck.iter().map(|card| card.name()).collect();
            println!("{username}: [{}] defuse_charges={charges}", cards.join(", "));
        }
        Command::Reset { username } => {
            let username = Username::parse(username)?;
            if !game.decks().has_deck(&username).await? {
                bail!("no game in progress for {username}");
            }
            game.reset_session(&username).await?;
            println!("reset deck for {username}");
        }
    }

    Ok(())
}
