//! Contract -> tracked game resolution
//!
//! A contract links to a game only when each of its two tokens belongs to
//! exactly one team of the game's sport and those two teams are the game's
//! two sides. Ties between games are reported, never broken.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::aliases::{TeamAlias, TeamAliasDatabase};
use crate::domain::{TeamPair, TrackedGame};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched { game_id: String, score: u32 },
    Ambiguous { game_ids: Vec<String> },
    /// A candidate game has a team the alias database does not know
    UnknownTeam { team: String },
    NoMatch,
    NotExtracted,
}

impl MatchOutcome {
    pub fn game_id(&self) -> Option<&str> {
        match self {
            MatchOutcome::Matched { game_id, .. } => Some(game_id),
            _ => None,
        }
    }
}

/// How a single game scored against a token pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameFit {
    Fit(u32),
    /// A token hit one side; the other side is not in the alias database
    UnknownOpponent(String),
    Miss,
}

pub struct TeamMatcher {
    aliases: Arc<TeamAliasDatabase>,
}

impl TeamMatcher {
    pub fn new(aliases: Arc<TeamAliasDatabase>) -> Self {
        Self { aliases }
    }

    /// Team that exclusively owns `token` in `sport`
    fn sole_owner(&self, sport: &str, token: &str) -> Option<&TeamAlias> {
        let owners = self.aliases.owners(sport, token);
        if owners.len() == 1 {
            Some(owners[0])
        } else {
            None
        }
    }

    /// Score one game. Token order does not matter ("A at B" and "B vs A"
    /// name the same game).
    pub fn fit(&self, tokens: &TeamPair, game: &TrackedGame) -> GameFit {
        let sport = game.sport.as_str();
        let home = self.aliases.resolve(sport, &game.home_team);
        let away = self.aliases.resolve(sport, &game.away_team);

        let first = self.sole_owner(sport, &tokens.first);
        let second = self.sole_owner(sport, &tokens.second);

        let (home, away) = match (home, away) {
            (Some(h), Some(a)) => (h, a),
            (Some(known), None) => {
                return Self::partial_hit(known, &game.away_team, [first, second])
            }
            (None, Some(known)) => {
                return Self::partial_hit(known, &game.home_team, [first, second])
            }
            (None, None) => return GameFit::Miss,
        };

        let (first, second) = match (first, second) {
            (Some(f), Some(s)) if f.key != s.key => (f, s),
            _ => return GameFit::Miss,
        };

        let sides_match = (first.key == home.key && second.key == away.key)
            || (first.key == away.key && second.key == home.key);
        if !sides_match {
            return GameFit::Miss;
        }

        let score = [(first, &tokens.first), (second, &tokens.second)]
            .iter()
            .filter_map(|(team, token)| team.variation(token))
            .map(|v| v.kind.score())
            .sum();
        GameFit::Fit(score)
    }

    fn partial_hit(known: &TeamAlias, unknown: &str, owners: [Option<&TeamAlias>; 2]) -> GameFit {
        if owners.iter().flatten().any(|team| team.key == known.key) {
            GameFit::UnknownOpponent(unknown.to_string())
        } else {
            GameFit::Miss
        }
    }

    /// Resolve a contract's tokens against every candidate game
    pub fn match_contract<'a, I>(&self, tokens: Option<&TeamPair>, games: I) -> MatchOutcome
    where
        I: IntoIterator<Item = &'a TrackedGame>,
    {
        let tokens = match tokens {
            Some(t) => t,
            None => return MatchOutcome::NotExtracted,
        };

        let mut best_score = 0;
        let mut best: Vec<String> = Vec::new();
        let mut unknown_team: Option<String> = None;

        for game in games {
            match self.fit(tokens, game) {
                GameFit::Fit(score) if score > best_score => {
                    best_score = score;
                    best = vec![game.external_id.clone()];
                }
                GameFit::Fit(score) if score == best_score => best.push(game.external_id.clone()),
                GameFit::Fit(_) => {}
                GameFit::UnknownOpponent(team) => {
                    debug!(
                        game = %game.external_id,
                        team = %team,
                        tokens = %tokens,
                        "Skipping game with unknown team"
                    );
                    unknown_team.get_or_insert(team);
                }
                GameFit::Miss => {}
            }
        }

        match best.len() {
            0 => match unknown_team {
                Some(team) => MatchOutcome::UnknownTeam { team },
                None => MatchOutcome::NoMatch,
            },
            1 => MatchOutcome::Matched {
                game_id: best.remove(0),
                score: best_score,
            },
            _ => {
                best.sort();
                warn!(
                    tokens = %tokens,
                    games = ?best,
                    score = best_score,
                    "Ambiguous match left unresolved"
                );
                MatchOutcome::Ambiguous { game_ids: best }
            }
        }
    }
}
