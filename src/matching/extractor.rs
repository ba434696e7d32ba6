//! Market title -> team token pair
//!
//! "College Football: Will Ohio State beat Michigan?" -> ("ohio state", "michigan").
//! Tokens are normalized alias strings; both must be known to the alias
//! database exactly as written. Abbreviations are never expanded.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::aliases::{normalize_name, TeamAliasDatabase};
use crate::domain::TeamPair;

static RE_CATEGORY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 &'.\-]{0,39}:\s*").unwrap());
static RE_WILL_LEADIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^will\s+(?:the\s+)?").unwrap());
static RE_TRAILING_WINNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\b(?:winner|win)\s*$").unwrap());
static RE_TRAILING_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());
static RE_TRAILING_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[-\u{2013}\u{2014}]\s+.*$").unwrap());
static RE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:at|vs\.?|v\.?|beat|beats)\s+|\s*@\s*").unwrap()
});
static RE_LEADING_THE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^the\s+").unwrap());

/// Strip title decoration and split on the single matchup separator.
/// Returns the raw sides in title order.
pub fn split_title(title: &str) -> Option<(String, String)> {
    let mut core = title.trim().to_string();
    // "Celtics vs Lakers: Winner?" has a colon too; only drop a prefix that
    // leaves the matchup intact. The suffix loop handles the rest.
    let without_prefix = RE_CATEGORY_PREFIX.replace(&core, "");
    if RE_SEPARATOR.is_match(&without_prefix) {
        core = without_prefix.into_owned();
    }
    core = RE_WILL_LEADIN.replace(&core, "").into_owned();

    // Suffixes can stack: "X vs Y (Dec 7) - Winner?"
    loop {
        let before = core.len();
        core = core.trim_end().trim_end_matches(['?', ':']).trim_end().to_string();
        // "...: Who will win?" carries no matchup of its own
        if let Some(colon) = core.rfind(':') {
            if !RE_SEPARATOR.is_match(&core[colon + 1..]) {
                core.truncate(colon);
            }
        }
        core = RE_TRAILING_PARENS.replace(&core, "").into_owned();
        core = RE_TRAILING_DASH.replace(&core, "").into_owned();
        core = RE_TRAILING_WINNER.replace(&core, "").into_owned();
        if core.len() == before {
            break;
        }
    }

    let separators: Vec<_> = RE_SEPARATOR.find_iter(&core).collect();
    if separators.len() != 1 {
        return None;
    }
    let sep = separators[0];
    let left = RE_LEADING_THE.replace(core[..sep.start()].trim(), "").trim().to_string();
    let right = RE_LEADING_THE.replace(core[sep.end()..].trim(), "").trim().to_string();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

pub struct TeamNameExtractor {
    aliases: Arc<TeamAliasDatabase>,
}

impl TeamNameExtractor {
    pub fn new(aliases: Arc<TeamAliasDatabase>) -> Self {
        Self { aliases }
    }

    /// Two normalized team tokens, or None when the title cannot be read
    /// safely. A denylisted side rejects the whole title.
    pub fn extract_teams(&self, title: &str) -> Option<TeamPair> {
        let (left, right) = match split_title(title) {
            Some(sides) => sides,
            None => {
                debug!(title, "No single matchup separator in title");
                return None;
            }
        };

        let denylist = self.aliases.denylist();
        if denylist.contains(&left) || denylist.contains(&right) {
            warn!(
                title,
                left = %left,
                right = %right,
                "Rejected title: collision-prone team fragment"
            );
            return None;
        }

        let first = normalize_name(&left);
        let second = normalize_name(&right);
        if first == second {
            debug!(title, "Both sides name the same team");
            return None;
        }
        for token in [&first, &second] {
            if !self.aliases.is_known_token(token) {
                debug!(title, token = %token, "Unresolvable team token");
                return None;
            }
        }

        Some(TeamPair::new(first, second))
    }

    /// Canonical name for a feed team name within a sport
    pub fn canonicalize(&self, raw_name: &str, sport: &str) -> Option<String> {
        self.aliases
            .resolve(sport, raw_name)
            .map(|team| team.canonical_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::matching::aliases::CollisionDenylist;

    fn extractor() -> TeamNameExtractor {
        let db = TeamAliasDatabase::bundled(CollisionDenylist::new(
            MatchingConfig::default().collision_denylist,
        ))
        .unwrap();
        TeamNameExtractor::new(Arc::new(db))
    }

    #[test]
    fn test_split_title_strips_decoration() {
        assert_eq!(
            split_title("Ohio State at Michigan Winner?"),
            Some(("Ohio State".into(), "Michigan".into()))
        );
        assert_eq!(
            split_title("NBA: Will the Celtics beat the Lakers?"),
            Some(("Celtics".into(), "Lakers".into()))
        );
        assert_eq!(
            split_title("Boston Celtics vs. Los Angeles Lakers (Jan 12) - Moneyline"),
            Some(("Boston Celtics".into(), "Los Angeles Lakers".into()))
        );
        assert_eq!(
            split_title("Heat @ Knicks"),
            Some(("Heat".into(), "Knicks".into()))
        );
        assert_eq!(
            split_title("Celtics vs Lakers: Winner?"),
            Some(("Celtics".into(), "Lakers".into()))
        );
        assert_eq!(
            split_title("Ohio State vs. Michigan: Who will win?"),
            Some(("Ohio State".into(), "Michigan".into()))
        );
        assert_eq!(
            split_title("NBA: Celtics vs Lakers: Game 7 (May 30)"),
            Some(("Celtics".into(), "Lakers".into()))
        );
    }

    #[test]
    fn test_split_title_needs_exactly_one_separator() {
        assert_eq!(split_title("Will Michigan win the Big Ten?"), None);
        assert_eq!(split_title("Celtics vs Lakers vs Heat"), None);
        assert_eq!(split_title("Celtics at Lakers @ Staples"), None);
    }

    #[test]
    fn test_extract_known_matchup() {
        let pair = extractor().extract_teams("Ohio State at Michigan Winner?").unwrap();
        assert_eq!(pair, TeamPair::new("ohio state", "michigan"));
    }

    #[test]
    fn test_colon_suffix_title_resolves() {
        assert_eq!(
            extractor().extract_teams("Celtics vs Lakers: Winner?"),
            Some(TeamPair::new("celtics", "lakers"))
        );
    }

    #[test]
    fn test_denylisted_side_rejects_title() {
        let extractor = extractor();
        assert!(extractor.extract_teams("State at Tech").is_none());
        assert!(extractor.extract_teams("Michigan vs State").is_none());
        assert!(extractor.extract_teams("St. vs Michigan").is_none());
    }

    #[test]
    fn test_abbreviation_is_not_expanded() {
        let extractor = extractor();
        assert!(extractor.extract_teams("Boise St. at Wisconsin").is_none());
        assert_eq!(
            extractor.extract_teams("Boise State at Wisconsin"),
            Some(TeamPair::new("boise state", "wisconsin"))
        );
        // Curated abbreviation
        assert_eq!(
            extractor.extract_teams("Ohio St. vs Penn St."),
            Some(TeamPair::new("ohio st", "penn st"))
        );
    }

    #[test]
    fn test_extracted_tokens_are_never_denylisted() {
        let extractor = extractor();
        let titles = [
            "Ohio State at Michigan",
            "Michigan State vs Penn State",
            "Texas Tech @ Texas",
            "Will Georgia Tech beat Georgia?",
            "NC State vs North Carolina",
            "State vs Michigan",
            "Kansas vs K-State",
        ];
        let denylist = extractor.aliases.denylist();
        for title in titles {
            if let Some(pair) = extractor.extract_teams(title) {
                assert!(!denylist.contains(&pair.first), "{title}");
                assert!(!denylist.contains(&pair.second), "{title}");
            }
        }
    }

    #[test]
    fn test_canonicalize_is_sport_scoped() {
        let extractor = extractor();
        assert_eq!(
            extractor.canonicalize("Michigan St.", "ncaaf").as_deref(),
            Some("Michigan State Spartans")
        );
        assert_eq!(
            extractor.canonicalize("LA Lakers", "nba").as_deref(),
            Some("Los Angeles Lakers")
        );
        assert_eq!(extractor.canonicalize("LA Lakers", "ncaaf"), None);
        assert_eq!(extractor.canonicalize("Boise St.", "ncaaf"), None);
    }
}
