//! Bonus Resolver: owned-collectible counts → reward multiplier and cap.

use std::collections::{HashMap, HashSet};

/// Resource counters a session can pay into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Coins,
    Gems,
    Fuel,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Coins, ResourceKind::Gems, ResourceKind::Fuel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coins => "coins",
            Self::Gems => "gems",
            Self::Fuel => "fuel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Multiplier and payout cap for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusTier {
    pub multiplier: u32,
    pub cap: u64,
}

impl BonusTier {
    pub const fn new(multiplier: u32, cap: u64) -> Self {
        Self { multiplier, cap }
    }
}

/// What a player owns, as reported by the collection service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSnapshot {
    /// Owned collectibles boosting each resource kind.
    pub counts: HashMap<ResourceKind, u32>,
    /// Kinds for which the player owns the designated special collectible.
    pub special: HashSet<ResourceKind>,
}

impl CollectionSnapshot {
    pub fn with_count(mut self, kind: ResourceKind, owned: u32) -> Self {
        self.counts.insert(kind, owned);
        self
    }

    pub fn with_special(mut self, kind: ResourceKind) -> Self {
        self.special.insert(kind);
        self
    }
}

/// Threshold table turning ownership into tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct BonusTable {
    pub base: BonusTier,
    /// `(minimum owned, tier)`, ascending by minimum.
    pub thresholds: Vec<(u32, BonusTier)>,
    /// Applies when the special collectible is owned, regardless of count.
    pub special: BonusTier,
}

impl Default for BonusTable {
    fn default() -> Self {
        Self {
            base: BonusTier::new(1, 100),
            thresholds: vec![
                (5, BonusTier::new(2, 150)),
                (10, BonusTier::new(3, 250)),
                (20, BonusTier::new(4, 400)),
            ],
            special: BonusTier::new(5, 500),
        }
    }
}

impl BonusTable {
    pub fn tier_for(&self, owned: u32, special: bool) -> BonusTier {
        if special {
            return self.special;
        }
        self.thresholds
            .iter()
            .filter(|(min, _)| owned >= *min)
            .map(|(_, tier)| *tier)
            .last()
            .unwrap_or(self.base)
    }

    /// Resolve a profile for every resource kind.
    pub fn resolve(&self, snapshot: &CollectionSnapshot) -> BonusProfile {
        let tiers = ResourceKind::ALL
            .into_iter()
            .map(|kind| {
                let owned = snapshot.counts.get(&kind).copied().unwrap_or(0);
                (kind, self.tier_for(owned, snapshot.special.contains(&kind)))
            })
            .collect();
        BonusProfile {
            tiers,
            fallback: self.base,
        }
    }
}

/// Per-kind tiers captured when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct BonusProfile {
    tiers: HashMap<ResourceKind, BonusTier>,
    fallback: BonusTier,
}

impl BonusProfile {
    pub fn for_kind(&self, kind: ResourceKind) -> BonusTier {
        self.tiers.get(&kind).copied().unwrap_or(self.fallback)
    }
}
