use chrono::Utc;
use gamesync::config::MatchingConfig;
use gamesync::domain::{LeagueRules, ScoreboardGame, TrackedGame};
use gamesync::matching::{
    normalize_name, MatchOutcome, TeamAliasDatabase, TeamMatcher, TeamNameExtractor,
};
use std::collections::HashMap;
use std::sync::Arc;

fn bundled() -> Arc<TeamAliasDatabase> {
    Arc::new(TeamAliasDatabase::from_config(&MatchingConfig::default()).unwrap())
}

#[test]
fn test_no_variation_is_a_denylisted_fragment() {
    let db = bundled();
    assert!(!db.is_empty());
    for team in db.iter() {
        for variation in &team.variations {
            assert!(
                !db.denylist().contains(&variation.text),
                "{} carries denylisted variation {:?}",
                team.key,
                variation.text
            );
        }
    }
}

#[test]
fn test_distinct_teams_share_no_variation() {
    let db = bundled();
    let mut owners: HashMap<(String, String), String> = HashMap::new();
    for team in db.iter() {
        for variation in &team.variations {
            let slot = (team.sport.clone(), variation.normalized.clone());
            if let Some(previous) = owners.insert(slot, team.key.to_string()) {
                panic!(
                    "{:?} shared by {} and {} in {}",
                    variation.normalized, previous, team.key, team.sport
                );
            }
        }
    }
}

#[test]
fn test_extracted_pairs_never_contain_fragments() {
    let db = bundled();
    let extractor = TeamNameExtractor::new(Arc::clone(&db));
    let titles = [
        "Ohio State at Michigan Winner?",
        "College Football: Will Penn State beat Michigan State?",
        "State vs Michigan",
        "Tech @ Georgia",
        "St. vs. Ohio State",
        "Lakers vs Celtics (Jan 12)",
        "Will the Heat beat the Knicks?",
        "Texas Tech at Texas A&M",
    ];

    let mut extracted = 0;
    for title in titles {
        if let Some(pair) = extractor.extract_teams(title) {
            extracted += 1;
            for token in [&pair.first, &pair.second] {
                assert!(!db.denylist().contains(token), "{title:?} yielded fragment {token:?}");
                assert_eq!(token, &normalize_name(token));
            }
        }
    }
    assert_eq!(extracted, 5);
}

fn game(id: &str, home: &str, away: &str) -> TrackedGame {
    let snapshot = ScoreboardGame {
        external_id: id.to_string(),
        home_team_name: home.to_string(),
        away_team_name: away.to_string(),
        home_score: 7,
        away_score: 3,
        status_text: "STATUS_IN_PROGRESS".to_string(),
        period: 2,
        clock: None,
        start_time: None,
    };
    let rules = LeagueRules {
        league: "college-football",
        sport: "ncaaf",
        final_period: 4,
    };
    TrackedGame::first_sighting(&snapshot, rules, home.to_string(), away.to_string(), Utc::now())
}

#[test]
fn test_state_schools_are_not_conflated() {
    let db = bundled();
    let extractor = TeamNameExtractor::new(Arc::clone(&db));
    let matcher = TeamMatcher::new(Arc::clone(&db));

    let osu_at_mich = game("1", "Michigan Wolverines", "Ohio State Buckeyes");
    let pair = extractor.extract_teams("Ohio State at Michigan");
    assert!(matches!(
        matcher.match_contract(pair.as_ref(), [&osu_at_mich]),
        MatchOutcome::Matched { ref game_id, .. } if game_id == "1"
    ));

    let mich_at_psu = game("2", "Penn State Nittany Lions", "Michigan Wolverines");
    let pair = extractor.extract_teams("Michigan State at Penn State");
    assert_eq!(
        matcher.match_contract(pair.as_ref(), [&mich_at_psu]),
        MatchOutcome::NoMatch
    );
}
