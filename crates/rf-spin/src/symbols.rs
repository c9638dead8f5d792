//! Symbol definitions
//!
//! Symbol ids arrive from the upstream result as plain numbers. Each id is
//! resolved to a [`SymbolKind`] once, when it is placed on a reel slot, so
//! nothing downstream has to probe what a symbol is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Standard symbol ids
pub const WILD_ID: u32 = 11;
pub const SCATTER_ID: u32 = 12;
pub const BONUS_ID: u32 = 13;

/// Symbol kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Regular paying symbol
    #[default]
    Regular,
    /// Wild - substitutes for others
    Wild,
    /// Scatter - triggers features regardless of position
    Scatter,
    /// Bonus - triggers bonus game
    Bonus,
}

impl SymbolKind {
    /// Can this symbol start an anticipation hold
    ///
    /// Wilds never do.
    pub fn triggers_anticipation(&self) -> bool {
        matches!(self, Self::Scatter | Self::Bonus)
    }

    /// Wild, scatter or bonus
    pub fn is_special(&self) -> bool {
        !matches!(self, Self::Regular)
    }

    /// May appear as random filler while a reel spins
    pub fn is_filler(&self) -> bool {
        matches!(self, Self::Regular)
    }
}

/// A symbol placed on a reel slot, kind resolved at placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReelSymbol {
    pub id: u32,
    pub kind: SymbolKind,
}

/// Id → kind table plus the filler pool used while reels spin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolTable {
    /// Ids that are not regular symbols
    #[serde(default)]
    special: HashMap<u32, SymbolKind>,

    /// Ids drawn at random while a reel spins
    fillers: Vec<u32>,
}

impl SymbolTable {
    /// Create an empty table with the given filler pool
    pub fn new(fillers: Vec<u32>) -> Self {
        Self {
            special: HashMap::new(),
            fillers,
        }
    }

    /// Regular 1..=10, wild 11, scatter 12, bonus 13
    pub fn standard() -> Self {
        Self::new((1..=10).collect())
            .with_symbol(WILD_ID, SymbolKind::Wild)
            .with_symbol(SCATTER_ID, SymbolKind::Scatter)
            .with_symbol(BONUS_ID, SymbolKind::Bonus)
    }

    /// Register a special symbol
    pub fn with_symbol(mut self, id: u32, kind: SymbolKind) -> Self {
        if kind == SymbolKind::Regular {
            self.special.remove(&id);
        } else {
            self.special.insert(id, kind);
            self.fillers.retain(|&f| f != id);
        }
        self
    }

    /// Kind of an id; unknown ids are regular
    pub fn kind_of(&self, id: u32) -> SymbolKind {
        self.special.get(&id).copied().unwrap_or_default()
    }

    /// Resolve an id for placement on a reel
    pub fn resolve(&self, id: u32) -> ReelSymbol {
        ReelSymbol {
            id,
            kind: self.kind_of(id),
        }
    }

    pub fn fillers(&self) -> &[u32] {
        &self.fillers
    }

    /// Ids of a given kind
    pub fn ids_of(&self, kind: SymbolKind) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .special
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Every id the table knows about
    pub fn all_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .fillers
            .iter()
            .copied()
            .chain(self.special.keys().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::standard()
    }
}
