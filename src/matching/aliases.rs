//! Team alias database
//!
//! Canonical team names plus the name variations a market title may use for
//! them. Curated lists are authoritative. Teams without one get generated
//! candidates, filtered so that no candidate can point at two teams once
//! collision-prone fragments are ignored. Everything is validated and frozen
//! at load time; matching only reads.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use crate::config::MatchingConfig;
use crate::error::{Result, SyncError};

const BUNDLED_ALIASES: &str = include_str!("../../data/team_aliases.toml");

/// Lowercase, drop periods/apostrophes/commas, hyphens to spaces, collapse
/// whitespace. Abbreviations are left as written: "St." becomes "st", never
/// "state" or "saint".
pub fn normalize_name(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '\'' | '\u{2019}' | ','))
        .map(|c| match c {
            '-' | '_' | '/' => ' ',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable identifier for a canonical team
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamKey(String);

impl TeamKey {
    fn derive(sport: &str, canonical: &str) -> Self {
        Self(format!("{}:{}", sport, normalize_name(canonical).replace(' ', "-")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TeamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How strong a variation is as evidence, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariationKind {
    Abbreviation = 1,
    Name = 2,
    FullName = 3,
}

impl VariationKind {
    pub fn score(&self) -> u32 {
        *self as u32
    }

    fn classify(text: &str, normalized: &str, canonical_normalized: &str) -> Self {
        if normalized == canonical_normalized {
            return VariationKind::FullName;
        }
        let single_word = !text.trim().contains(char::is_whitespace);
        let all_caps = text
            .chars()
            .filter(|c| c.is_alphanumeric())
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if text.contains('.') || (single_word && all_caps && text.len() <= 5) {
            VariationKind::Abbreviation
        } else {
            VariationKind::Name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variation {
    /// As written in the alias table
    pub text: String,
    pub normalized: String,
    pub kind: VariationKind,
}

#[derive(Debug, Clone)]
pub struct TeamAlias {
    pub key: TeamKey,
    pub canonical_name: String,
    pub sport: String,
    /// Ordered, canonical name first. Immutable after load.
    pub variations: Vec<Variation>,
    /// Variations came from the curated table rather than generation
    pub curated: bool,
}

impl TeamAlias {
    pub fn variation(&self, normalized: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.normalized == normalized)
    }
}

/// Fragments too common to identify a team on their own
#[derive(Debug, Clone, Default)]
pub struct CollisionDenylist {
    tokens: HashSet<String>,
}

impl CollisionDenylist {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| normalize_name(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Raw text, trimmed and normalized, equals a denylisted fragment
    pub fn contains(&self, raw: &str) -> bool {
        self.tokens.contains(&normalize_name(raw))
    }

    /// Remove denylisted words from an already-normalized name
    pub fn strip(&self, normalized: &str) -> String {
        normalized
            .split(' ')
            .filter(|word| !self.tokens.contains(*word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct AliasFile {
    #[serde(default)]
    teams: Vec<AliasEntry>,
}

#[derive(Debug, Deserialize)]
struct AliasEntry {
    sport: String,
    canonical: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    variations: Option<Vec<String>>,
}

/// Full name, mascot (last word), short form (everything but the mascot)
fn generated_candidates(canonical: &str) -> Vec<String> {
    let words: Vec<&str> = canonical.split_whitespace().collect();
    let mut out = vec![canonical.trim().to_string()];
    if words.len() >= 2 {
        out.push(words[words.len() - 1].to_string());
        out.push(words[..words.len() - 1].join(" "));
    }
    out
}

#[derive(Debug)]
pub struct TeamAliasDatabase {
    teams: Vec<TeamAlias>,
    /// (sport, normalized variation) -> teams carrying it. One entry per key
    /// after validation; kept as a list so callers can check uniqueness.
    by_variation: HashMap<(String, String), Vec<usize>>,
    denylist: CollisionDenylist,
}

impl TeamAliasDatabase {
    /// Bundled alias table
    pub fn bundled(denylist: CollisionDenylist) -> Result<Self> {
        Self::from_toml_str(BUNDLED_ALIASES, denylist)
    }

    /// Alias file named in the matching config, or the bundled table
    pub fn from_config(config: &MatchingConfig) -> Result<Self> {
        let denylist = CollisionDenylist::new(&config.collision_denylist);
        match &config.alias_file {
            Some(path) => Self::from_path(path, denylist),
            None => Self::bundled(denylist),
        }
    }

    pub fn from_path(path: impl AsRef<Path>, denylist: CollisionDenylist) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw, denylist)
    }

    pub fn from_toml_str(raw: &str, denylist: CollisionDenylist) -> Result<Self> {
        let file: AliasFile = toml::from_str(raw)?;
        Self::build(file.teams, denylist)
    }

    fn build(entries: Vec<AliasEntry>, denylist: CollisionDenylist) -> Result<Self> {
        let mut problems = Vec::new();
        let mut teams: Vec<TeamAlias> = Vec::with_capacity(entries.len());
        let mut keys = HashSet::new();
        // Curated text, or raw candidates awaiting the collision filter
        let mut pending: Vec<Vec<String>> = Vec::with_capacity(entries.len());

        for entry in entries {
            let canonical = entry.canonical.trim().to_string();
            let sport = entry.sport.trim().to_ascii_lowercase();
            if normalize_name(&canonical).is_empty() || sport.is_empty() {
                problems.push(format!(
                    "entry with empty canonical name or sport: {:?}",
                    entry.canonical
                ));
                continue;
            }
            if denylist.contains(&canonical) {
                problems.push(format!(
                    "canonical name {:?} is a collision-prone fragment",
                    canonical
                ));
                continue;
            }

            let key = match entry.key {
                Some(k) => TeamKey(k),
                None => TeamKey::derive(&sport, &canonical),
            };
            if !keys.insert(key.clone()) {
                problems.push(format!("duplicate team key {}", key));
                continue;
            }

            let curated = entry.variations.is_some();
            let mut texts = vec![canonical.clone()];
            match entry.variations {
                Some(list) => texts.extend(list),
                None => texts.extend(generated_candidates(&canonical).into_iter().skip(1)),
            }

            pending.push(texts);
            teams.push(TeamAlias {
                key,
                canonical_name: canonical,
                sport,
                variations: Vec::new(),
                curated,
            });
        }

        // Curated variations: verbatim checks only
        for (team, texts) in teams.iter_mut().zip(&pending) {
            if !team.curated {
                continue;
            }
            let canonical_norm = normalize_name(&team.canonical_name);
            for text in texts {
                let normalized = normalize_name(text);
                if normalized.is_empty() {
                    problems.push(format!("{}: empty variation", team.key));
                    continue;
                }
                if denylist.contains(text) {
                    problems.push(format!(
                        "{}: variation {:?} is a collision-prone fragment",
                        team.key, text
                    ));
                    continue;
                }
                if team.variation(&normalized).is_some() {
                    continue;
                }
                team.variations.push(Variation {
                    kind: VariationKind::classify(text, &normalized, &canonical_norm),
                    text: text.trim().to_string(),
                    normalized,
                });
            }
        }

        // Collision index over reduced forms: every curated variation, every
        // canonical name, and the generated candidates of *all* teams, so a
        // generated mascot cannot claim a nickname a curated team also uses.
        let mut reduced_index: HashMap<(String, String), BTreeSet<usize>> = HashMap::new();
        for (idx, (team, texts)) in teams.iter().zip(&pending).enumerate() {
            let mut forms: Vec<String> =
                team.variations.iter().map(|v| v.normalized.clone()).collect();
            forms.extend(
                generated_candidates(&team.canonical_name)
                    .iter()
                    .map(|c| normalize_name(c)),
            );
            if !team.curated {
                forms.extend(texts.iter().map(|t| normalize_name(t)));
            }
            for form in forms {
                let reduced = denylist.strip(&form);
                if reduced.is_empty() {
                    continue;
                }
                reduced_index
                    .entry((team.sport.clone(), reduced))
                    .or_default()
                    .insert(idx);
            }
        }

        // Generated variations: keep a candidate only if it is unambiguous
        for (idx, (team, texts)) in teams.iter_mut().zip(&pending).enumerate() {
            if team.curated {
                continue;
            }
            let canonical_norm = normalize_name(&team.canonical_name);
            for (pos, text) in texts.iter().enumerate() {
                let normalized = normalize_name(text);
                let is_canonical = pos == 0;
                if !is_canonical {
                    if denylist.contains(text) {
                        debug!(
                            team = %team.key,
                            candidate = %text,
                            "Dropped generated variation: collision-prone fragment"
                        );
                        continue;
                    }
                    let reduced = denylist.strip(&normalized);
                    let owners = reduced_index.get(&(team.sport.clone(), reduced.clone()));
                    let unambiguous = !reduced.is_empty()
                        && owners.map(|o| o.len() == 1 && o.contains(&idx)).unwrap_or(false);
                    if !unambiguous {
                        debug!(
                            team = %team.key,
                            candidate = %text,
                            reduced = %reduced,
                            "Dropped generated variation: ambiguous across teams"
                        );
                        continue;
                    }
                }
                if team.variation(&normalized).is_some() {
                    continue;
                }
                team.variations.push(Variation {
                    kind: VariationKind::classify(text, &normalized, &canonical_norm),
                    text: text.trim().to_string(),
                    normalized,
                });
            }
        }

        // Verbatim uniqueness within a sport
        let mut by_variation: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for (idx, team) in teams.iter().enumerate() {
            for variation in &team.variations {
                by_variation
                    .entry((team.sport.clone(), variation.normalized.clone()))
                    .or_default()
                    .push(idx);
            }
        }
        let mut collisions: Vec<String> = by_variation
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|((sport, text), owners)| {
                let names: Vec<&str> = owners
                    .iter()
                    .map(|&i| teams[i].canonical_name.as_str())
                    .collect();
                format!("{sport} variation {text:?} shared by {}", names.join(", "))
            })
            .collect();
        collisions.sort();
        problems.extend(collisions);

        if !problems.is_empty() {
            return Err(SyncError::AliasValidation(problems.join("; ")));
        }

        info!(
            teams = teams.len(),
            curated = teams.iter().filter(|t| t.curated).count(),
            variations = by_variation.len(),
            "Team alias database loaded"
        );

        Ok(Self {
            teams,
            by_variation,
            denylist,
        })
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeamAlias> {
        self.teams.iter()
    }

    pub fn denylist(&self) -> &CollisionDenylist {
        &self.denylist
    }

    /// Every team in `sport` whose variation set holds this normalized token
    pub fn owners(&self, sport: &str, normalized: &str) -> Vec<&TeamAlias> {
        self.by_variation
            .get(&(sport.to_string(), normalized.to_string()))
            .map(|idxs| idxs.iter().map(|&i| &self.teams[i]).collect())
            .unwrap_or_default()
    }

    /// Team for a raw name within a sport, on exact canonical or variation match
    pub fn resolve(&self, sport: &str, raw: &str) -> Option<&TeamAlias> {
        match self.owners(sport, &normalize_name(raw)).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Team by canonical name within a sport
    pub fn find_canonical(&self, sport: &str, canonical: &str) -> Option<&TeamAlias> {
        let normalized = normalize_name(canonical);
        self.teams
            .iter()
            .find(|t| t.sport == sport && normalize_name(&t.canonical_name) == normalized)
    }

    /// Does any team in any sport carry this normalized token
    pub fn is_known_token(&self, normalized: &str) -> bool {
        self.by_variation.keys().any(|(_, text)| text == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denylist() -> CollisionDenylist {
        CollisionDenylist::new(["State", "St.", "Tech", "Saint"])
    }

    fn bundled() -> TeamAliasDatabase {
        TeamAliasDatabase::bundled(CollisionDenylist::new(
            crate::config::MatchingConfig::default().collision_denylist,
        ))
        .unwrap()
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Ohio  St. "), "ohio st");
        assert_eq!(normalize_name("St. John's"), "st johns");
        assert_eq!(normalize_name("K-State"), "k state");
        assert_eq!(normalize_name("Texas A&M"), "texas a&m");
    }

    #[test]
    fn test_bundled_table_loads() {
        let db = bundled();
        assert!(db.len() > 60);

        let osu = db.resolve("ncaaf", "Ohio St.").unwrap();
        assert_eq!(osu.canonical_name, "Ohio State Buckeyes");
        assert!(osu.curated);
        assert_eq!(osu.variations[0].kind, VariationKind::FullName);
    }

    #[test]
    fn test_abbreviations_are_never_expanded() {
        let db = bundled();
        // Boise State has no curated "St." form
        assert!(db.resolve("ncaaf", "Boise St.").is_none());
        assert!(db.resolve("ncaaf", "Boise State").is_some());
        // "St." and "Saint" stay distinct
        assert_eq!(
            db.resolve("ncaab", "St. John's").unwrap().canonical_name,
            "St. John's Red Storm"
        );
        assert!(db.resolve("ncaab", "Saint John's").is_none());
        assert!(db.resolve("ncaab", "St. Mary's").is_none());
    }

    #[test]
    fn test_generated_candidates_drop_collisions() {
        let db = bundled();

        let auburn = db.find_canonical("ncaaf", "Auburn Tigers").unwrap();
        assert!(!auburn.curated);
        assert!(auburn.variation("auburn").is_some());
        assert!(auburn.variation("tigers").is_none());

        // Curated Michigan State owns "Spartans"
        let sjsu = db.find_canonical("ncaaf", "San Jose State Spartans").unwrap();
        assert!(sjsu.variation("spartans").is_none());
        assert!(sjsu.variation("san jose state").is_some());

        // Georgia and Mississippi State are also Bulldogs
        let fresno = db.find_canonical("ncaaf", "Fresno State Bulldogs").unwrap();
        assert!(fresno.variation("bulldogs").is_none());

        let boise = db.find_canonical("ncaaf", "Boise State Broncos").unwrap();
        assert!(boise.variation("broncos").is_some());
    }

    #[test]
    fn test_short_form_colliding_after_stripping_is_dropped() {
        let raw = r#"
            [[teams]]
            sport = "ncaaf"
            canonical = "Michigan Wolverines"
            variations = ["Michigan"]

            [[teams]]
            sport = "ncaaf"
            canonical = "Michigan State Spartans"
        "#;
        let db = TeamAliasDatabase::from_toml_str(raw, denylist()).unwrap();
        let msu = db.find_canonical("ncaaf", "Michigan State Spartans").unwrap();
        assert!(msu.variation("michigan state").is_none());
        assert!(msu.variation("spartans").is_some());
        assert!(msu.variation("michigan state spartans").is_some());
    }

    #[test]
    fn test_denylisted_curated_variation_fails_load() {
        let raw = r#"
            [[teams]]
            sport = "ncaaf"
            canonical = "Penn State Nittany Lions"
            variations = ["Penn State", "State"]
        "#;
        let err = TeamAliasDatabase::from_toml_str(raw, denylist()).unwrap_err();
        assert!(matches!(err, SyncError::AliasValidation(msg) if msg.contains("collision-prone")));
    }

    #[test]
    fn test_shared_curated_variation_fails_load() {
        let raw = r#"
            [[teams]]
            sport = "ncaaf"
            canonical = "Georgia Bulldogs"
            variations = ["Bulldogs"]

            [[teams]]
            sport = "ncaaf"
            canonical = "Mississippi State Bulldogs"
            variations = ["Bulldogs"]
        "#;
        let err = TeamAliasDatabase::from_toml_str(raw, denylist()).unwrap_err();
        assert!(matches!(err, SyncError::AliasValidation(msg) if msg.contains("shared by")));
    }

    #[test]
    fn test_same_variation_in_different_sports_is_allowed() {
        let raw = r#"
            [[teams]]
            sport = "nba"
            canonical = "Sacramento Kings"
            variations = ["Kings"]

            [[teams]]
            sport = "nhl"
            canonical = "Los Angeles Kings"
            variations = ["Kings"]
        "#;
        let db = TeamAliasDatabase::from_toml_str(raw, denylist()).unwrap();
        assert_eq!(db.resolve("nba", "Kings").unwrap().canonical_name, "Sacramento Kings");
        assert_eq!(db.resolve("nhl", "kings").unwrap().canonical_name, "Los Angeles Kings");
    }

    #[test]
    fn test_no_team_carries_a_denylisted_token() {
        let db = bundled();
        for team in db.iter() {
            for variation in &team.variations {
                assert!(
                    !db.denylist().contains(&variation.text),
                    "{} carries denylisted {:?}",
                    team.canonical_name,
                    variation.text
                );
            }
        }
    }
}
