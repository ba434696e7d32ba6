use clap::{Parser, Subcommand};

use crate::domain::SyncRun;
use crate::matching::{normalize_name, TeamAliasDatabase, TeamNameExtractor};
use crate::sync::PollScheduler;

#[derive(Parser)]
#[command(name = "gamesync")]
#[command(version = "0.1.0")]
#[command(
    about = "Keeps live game scores and prediction-market contracts in step",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus the GAMESYNC_ENV overlay)
    #[arg(short, long, default_value = "config", env = "GAMESYNC_CONFIG_DIR")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sync loop until Ctrl-C
    Run {
        /// Keep state in memory instead of Postgres
        #[arg(long)]
        dry_run: bool,
    },
    /// Run a single cycle and print its record as JSON
    Once {
        /// Keep state in memory instead of Postgres
        #[arg(long)]
        dry_run: bool,
    },
    /// Show how a market title is split and resolved
    Extract {
        /// Market title, e.g. "Will the Lakers beat the Celtics?"
        title: String,
        /// Sport to resolve canonical names in (e.g., nba, ncaaf)
        #[arg(short, long)]
        sport: Option<String>,
    },
    /// Load and validate the alias table, then print variation sets
    Aliases {
        /// Only list one sport
        #[arg(short, long)]
        sport: Option<String>,
    },
    /// Show recent sync runs from Postgres
    Runs {
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

/// Render the extraction of one title
pub fn describe_extraction(
    aliases: &TeamAliasDatabase,
    extractor: &TeamNameExtractor,
    title: &str,
    sport: Option<&str>,
) -> String {
    let mut out = format!("title:  {title}\n");
    let Some(pair) = extractor.extract_teams(title) else {
        out.push_str("result: no team pair extracted\n");
        return out;
    };

    out.push_str(&format!("tokens: {pair}\n"));
    for token in [&pair.first, &pair.second] {
        let mut sports: Vec<&str> = aliases
            .iter()
            .filter(|team| team.variation(token).is_some())
            .map(|team| team.sport.as_str())
            .collect();
        sports.sort_unstable();
        sports.dedup();

        let resolved = match sport {
            Some(sport) => match extractor.canonicalize(token, sport) {
                Some(canonical) => canonical,
                None => format!("ambiguous or unknown in {sport}"),
            },
            None => format!("sports: {}", sports.join(", ")),
        };
        out.push_str(&format!("  {:<20} -> {}\n", normalize_name(token), resolved));
    }
    out
}

/// Render the alias table, optionally for one sport
pub fn describe_aliases(aliases: &TeamAliasDatabase, sport: Option<&str>) -> String {
    let mut teams: Vec<_> = aliases
        .iter()
        .filter(|team| sport.map_or(true, |s| team.sport == s))
        .collect();
    teams.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = String::new();
    for team in &teams {
        let variations: Vec<String> = team
            .variations
            .iter()
            .map(|v| format!("{} ({:?})", v.text, v.kind))
            .collect();
        out.push_str(&format!(
            "{:<40} {}{}\n",
            team.key.as_str(),
            variations.join(", "),
            if team.curated { "" } else { " [generated]" }
        ));
    }
    out.push_str(&format!(
        "{} teams, {} denylisted fragments\n",
        teams.len(),
        aliases.denylist().len()
    ));
    out
}

/// One line per run, newest first
pub fn describe_runs(runs: &[SyncRun]) -> String {
    let mut out = String::new();
    for run in runs {
        out.push_str(&format!(
            "{}  {:<11} ins={} upd={} skip={} err={} matched={} unmatched={} calls={} {}ms{}\n",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.status.as_str(),
            run.counts.inserted,
            run.counts.updated,
            run.counts.skipped,
            run.counts.errored,
            run.contracts_matched,
            run.contracts_unmatched,
            run.upstream_calls,
            run.duration_ms,
            run.error.as_deref().map(|e| format!("  {e}")).unwrap_or_default(),
        ));
    }
    out
}

/// Poll intervals in effect, for the startup banner
pub fn describe_intervals(scheduler: &PollScheduler) -> String {
    let poll = scheduler.config();
    format!(
        "scheduled={}s live={}s close-final={}s intermission={}s completed={}s retention={}s",
        poll.scheduled_secs,
        poll.live_secs,
        poll.live_close_final_secs,
        poll.intermission_secs,
        poll.completed_secs,
        poll.completed_retention_secs
    )
}
