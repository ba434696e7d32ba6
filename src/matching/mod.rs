//! Team-name matching
//!
//! Links free-text market titles to tracked games without a shared id:
//! - `aliases`: canonical teams and collision-safe variations
//! - `extractor`: title -> two team tokens
//! - `matcher`: tokens -> at most one game

pub mod aliases;
pub mod extractor;
pub mod matcher;

pub use aliases::{
    normalize_name, CollisionDenylist, TeamAlias, TeamAliasDatabase, TeamKey, Variation,
    VariationKind,
};
pub use extractor::{split_title, TeamNameExtractor};
pub use matcher::{GameFit, MatchOutcome, TeamMatcher};
