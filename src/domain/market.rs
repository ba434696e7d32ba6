use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Active contract as listed by the prediction-market provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractListing {
    pub contract_id: String,
    pub title: String,
    pub yes_price: Option<Decimal>,
    pub no_price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
}

/// Two normalized team tokens pulled out of a market title, in title order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamPair {
    pub first: String,
    pub second: String,
}

impl TeamPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl std::fmt::Display for TeamPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.first, self.second)
    }
}

/// A market contract and its link (if any) to a tracked game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContract {
    pub contract_id: String,
    pub title: String,
    pub extracted: Option<TeamPair>,
    /// Never points at more than one game. Cleared only when a retitle no
    /// longer names the linked game.
    pub matched_game_id: Option<String>,
    pub yes_price: Option<Decimal>,
    pub no_price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
    pub last_seen: DateTime<Utc>,
}

impl MarketContract {
    pub fn from_listing(listing: &ContractListing, now: DateTime<Utc>) -> Self {
        Self {
            contract_id: listing.contract_id.clone(),
            title: listing.title.clone(),
            extracted: None,
            matched_game_id: None,
            yes_price: listing.yes_price,
            no_price: listing.no_price,
            volume: listing.volume,
            close_time: listing.close_time,
            last_seen: now,
        }
    }

    /// Refresh quote fields from a newer listing. Returns true if anything
    /// other than `last_seen` moved.
    pub fn refresh(&mut self, listing: &ContractListing, now: DateTime<Utc>) -> bool {
        let changed = self.yes_price != listing.yes_price
            || self.no_price != listing.no_price
            || self.volume != listing.volume
            || self.close_time != listing.close_time
            || self.title != listing.title;

        if self.title != listing.title {
            // Extracted again on the next match pass; a link survives only if
            // the new title still names the same game
            self.title = listing.title.clone();
            self.extracted = None;
        }
        self.yes_price = listing.yes_price;
        self.no_price = listing.no_price;
        self.volume = listing.volume;
        self.close_time = listing.close_time;
        self.last_seen = now;
        changed
    }

    pub fn is_matched(&self) -> bool {
        self.matched_game_id.is_some()
    }

    /// Linked, but retitled since the link was made
    pub fn needs_link_check(&self) -> bool {
        self.matched_game_id.is_some() && self.extracted.is_none()
    }

    /// Drop the link and extraction so the contract is matched afresh
    pub fn unlink(&mut self) -> Option<String> {
        self.extracted = None;
        self.matched_game_id.take()
    }
}
