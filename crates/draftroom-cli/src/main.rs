//! draftroom - a terminal client for the fantasy draft service.
//!
//! Every command runs against one `QueryClient`, so a pick followed by a
//! read goes through the same cache and tag invalidation the UI uses.

mod config;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use draftroom_core::models::{Draft, League};
use draftroom_core::{DraftApi, LeagueApi, QueryClient, QueryState};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;

/// Default seconds between refetches in `watch`
const DEFAULT_WATCH_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Parser)]
#[command(name = "draftroom", version, about = "Fantasy draft room client")]
struct Cli {
    /// Path to a config file (defaults to ~/.config/draftroom/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the picks made so far in a draft
    Show { draft_id: String },
    /// Draft a player and print the refreshed draft
    Pick { draft_id: String, player: String },
    /// Print a league's teams and who is on the clock
    League { league_id: String },
    /// Print a draft every time it changes
    Watch {
        draft_id: String,
        /// Seconds between refetches
        #[arg(long, default_value_t = DEFAULT_WATCH_INTERVAL_SECS)]
        interval: u64,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=draftroom_core=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    info!(base_url = %config.client.base_url, "draftroom starting");

    let client = QueryClient::from_config(&config.client)?;
    let drafts = DraftApi::new(client.clone()).with_scope(config.invalidation_scope);
    let leagues = LeagueApi::new(client.clone());

    match cli.command {
        Command::Show { draft_id } => show(&drafts, &draft_id).await,
        Command::Pick { draft_id, player } => pick(&drafts, &draft_id, &player).await,
        Command::League { league_id } => league(&leagues, &league_id).await,
        Command::Watch { draft_id, interval } => {
            watch(&client, &drafts, &draft_id, Duration::from_secs(interval.max(1))).await
        }
    }
}

async fn show(drafts: &DraftApi, draft_id: &str) -> Result<()> {
    let draft = drafts
        .get_draft(draft_id)
        .await
        .with_context(|| format!("Failed to load draft {draft_id}"))?;
    let age = drafts
        .client()
        .snapshot(&DraftApi::draft_query(draft_id))
        .age_display();
    print_draft(&draft, &age);
    Ok(())
}

async fn pick(drafts: &DraftApi, draft_id: &str, player: &str) -> Result<()> {
    let mut view = drafts.subscribe_draft(draft_id);
    let before = view
        .settled()
        .await
        .into_result()
        .context("Draft did not load")?
        .with_context(|| format!("Failed to load draft {draft_id}"))?;
    if before.is_taken(player) {
        anyhow::bail!("{player} has already been drafted");
    }

    drafts
        .draft_player(draft_id, player)
        .await
        .with_context(|| format!("Failed to draft {player}"))?;

    let after = view
        .settled()
        .await
        .into_result()
        .context("Draft did not reload")?
        .with_context(|| format!("Failed to reload draft {draft_id}"))?;
    print_draft(&after, &view.snapshot().age_display());
    Ok(())
}

async fn league(leagues: &LeagueApi, league_id: &str) -> Result<()> {
    let league = leagues
        .get_league(league_id)
        .await
        .with_context(|| format!("Failed to load league {league_id}"))?;
    print_league(&league);
    Ok(())
}

async fn watch(
    client: &QueryClient,
    drafts: &DraftApi,
    draft_id: &str,
    interval: Duration,
) -> Result<()> {
    let mut view = drafts.subscribe_draft(draft_id);
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    let mut result = view.settled().await;
    loop {
        if !result.is_fetching {
            match &result.state {
                QueryState::Success { data, .. } => {
                    print_draft(data, &view.snapshot().age_display());
                }
                QueryState::Error(error) => eprintln!("Error: {error}"),
                QueryState::Idle | QueryState::Loading => {}
            }
        }

        tokio::select! {
            changed = view.changed() => match changed {
                Some(next) => result = next,
                None => return Ok(()),
            },
            _ = ticker.tick() => {
                client.refetch_active();
                // Wait for the refetch rather than reprinting the stale copy
                result = view.settled().await;
            }
        }
    }
}

fn print_draft(draft: &Draft, age: &str) {
    println!("Draft {} - {} picks (fetched {})", draft.id, draft.pick_count(), age);
    for (i, pick) in draft.picks.iter().enumerate() {
        println!("{:>4}. {}", i + 1, pick.display());
    }
}

fn print_league(league: &League) {
    println!("{} teams, {} turns remaining", league.teams.len(), league.turns_remaining());
    let mut teams: Vec<_> = league.teams.iter().collect();
    teams.sort_by_key(|team| team.draft_order);
    for team in teams {
        let kind = if team.simulator { " [sim]" } else { "" };
        println!(
            "{:>4}. {} ({}){} - {} players",
            team.draft_order,
            team.name,
            team.owner,
            kind,
            team.roster_size()
        );
    }
    match league.on_the_clock() {
        Some(team) => println!("On the clock: {} ({})", team.name, team.owner),
        None => println!("Draft complete"),
    }
}
