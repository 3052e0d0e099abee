//! Symbol reconciliation between two venue naming schemes
//!
//! Each venue spells the same instrument differently ("BTCUSDT" on Bybit,
//! "BTC-USD" on Coinbase). `SymbolRules::normalize` maps a native spelling to
//! a canonical `Symbol` written `BASE/REF` ("BTC/USD"); `VenueSymbolMap` keeps the inverse
//! mapping so prices can be requested in the venue's own spelling, and
//! `SymbolReconciler` intersects both venues into `CommonSymbols`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::adapters::{PriceSource, VenueError, VenueResult};
use crate::config::VenueKind;

// =============================================================================
// Core Types
// =============================================================================

/// Separator of the canonical `BASE/REF` form, accepted by every venue's rules
pub const CANONICAL_SEPARATOR: char = '/';

/// Canonical, venue-independent instrument identifier (`BASE/REF`)
///
/// The reference quote is part of the symbol so a canonical symbol normalizes
/// to itself, including bases that end in a quote ticker ("PYUSD/USD").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `BASE/REF` from a base ticker and reference quote
    pub fn canonical(base: &str, reference_quote: &str) -> Self {
        Self(format!("{}{}{}", base, CANONICAL_SEPARATOR, reference_quote))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How the quote currency of a native symbol was recognized
///
/// Ordered by preference when several natives normalize to one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QuoteKind {
    /// No quote currency in the spelling (e.g. a USDC-settled "BTCPERP")
    Implicit,
    /// Quoted in an alias of the reference currency (e.g. USDT)
    Alias,
    /// Quoted in the reference currency itself
    Reference,
}

/// Result of normalizing one native spelling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSymbol {
    pub symbol: Symbol,
    pub quote: QuoteKind,
}

// =============================================================================
// SymbolRules
// =============================================================================

/// Venue-specific normalization rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRules {
    /// Reference fiat ticker (e.g., "USD")
    pub reference_quote: String,
    /// Quote tickers treated as the reference (e.g., "USDT", "USDC")
    #[serde(default)]
    pub quote_aliases: Vec<String>,
    /// Contract-type suffixes stripped before parsing (e.g., "PERP")
    #[serde(default)]
    pub contract_suffixes: Vec<String>,
    /// Base/quote separators (e.g., "-", "/")
    #[serde(default)]
    pub separators: Vec<String>,
}

impl SymbolRules {
    /// Default rules for a venue implementation
    pub fn for_kind(kind: VenueKind) -> Self {
        match kind {
            // BTCUSDT, BTCPERP (USDC perpetual), 1000PEPEUSDT
            VenueKind::Bybit => Self {
                reference_quote: "USD".to_string(),
                quote_aliases: vec!["USDT".to_string(), "USDC".to_string()],
                contract_suffixes: vec!["PERP".to_string()],
                separators: Vec::new(),
            },
            // BTC-USD, ETH-USDT
            VenueKind::Coinbase => Self {
                reference_quote: "USD".to_string(),
                quote_aliases: vec!["USDT".to_string(), "USDC".to_string()],
                contract_suffixes: Vec::new(),
                separators: vec!["-".to_string()],
            },
        }
    }

    /// Check rules are usable; returns a reason on failure
    pub fn validate(&self) -> Result<(), String> {
        if !is_ticker(&self.reference_quote) {
            return Err(format!(
                "reference_quote must be an uppercase alphanumeric ticker (got '{}')",
                self.reference_quote
            ));
        }
        if let Some(alias) = self.quote_aliases.iter().find(|a| !is_ticker(a)) {
            return Err(format!("invalid quote alias '{}'", alias));
        }
        if self.contract_suffixes.iter().any(|s| s.trim().is_empty()) {
            return Err("contract suffixes cannot be empty".to_string());
        }
        if self.separators.iter().any(|s| s.is_empty()) {
            return Err("separators cannot be empty".to_string());
        }
        Ok(())
    }

    /// Map a native spelling to its canonical symbol
    ///
    /// Returns `None` when the native symbol is quoted in a currency other than
    /// the reference or one of its aliases, or when nothing usable remains.
    pub fn normalize(&self, native: &str) -> Option<NormalizedSymbol> {
        let mut s = native.trim().to_uppercase();

        // ccxt-style settlement tail: "BTC/USDT:USDT"
        if let Some(idx) = s.find(':') {
            s.truncate(idx);
        }

        for suffix in &self.contract_suffixes {
            let suffix = suffix.to_uppercase();
            if s.len() > suffix.len() && s.ends_with(&suffix) {
                s.truncate(s.len() - suffix.len());
                while let Some(sep) = self.separators.iter().find(|sep| s.ends_with(sep.as_str())) {
                    s.truncate(s.len() - sep.len());
                }
                break;
            }
        }

        let split = s.split_once(CANONICAL_SEPARATOR).or_else(|| {
            self.separators
                .iter()
                .find_map(|sep| s.split_once(sep.as_str()))
        });

        let (base, quote) = match split {
            Some((base, quote)) => (base.to_string(), self.classify_quote(quote)?),
            None => self.strip_quote_suffix(&s),
        };

        if !is_base(&base) {
            return None;
        }

        Some(NormalizedSymbol {
            symbol: Symbol::canonical(&base, &self.reference_quote.to_uppercase()),
            quote,
        })
    }

    fn classify_quote(&self, quote: &str) -> Option<QuoteKind> {
        if quote == self.reference_quote.to_uppercase() {
            Some(QuoteKind::Reference)
        } else if self.quote_aliases.iter().any(|a| a.to_uppercase() == quote) {
            Some(QuoteKind::Alias)
        } else {
            None
        }
    }

    fn strip_quote_suffix(&self, s: &str) -> (String, QuoteKind) {
        let mut quotes: Vec<(String, QuoteKind)> = self
            .quote_aliases
            .iter()
            .map(|a| (a.to_uppercase(), QuoteKind::Alias))
            .collect();
        quotes.push((self.reference_quote.to_uppercase(), QuoteKind::Reference));
        // Longest first so "USDT" wins over "USD"
        quotes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        for (quote, kind) in quotes {
            if s.len() > quote.len() && s.ends_with(&quote) {
                return (s[..s.len() - quote.len()].to_string(), kind);
            }
        }
        (s.to_string(), QuoteKind::Implicit)
    }
}

fn is_ticker(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_base(value: &str) -> bool {
    is_ticker(value) && value.chars().all(|c| !c.is_ascii_lowercase())
}

// =============================================================================
// VenueSymbolMap
// =============================================================================

/// Canonical-to-native mapping for one venue
#[derive(Debug, Default, Clone)]
pub struct VenueSymbolMap {
    natives: HashMap<Symbol, String>,
    ambiguous: HashSet<Symbol>,
}

impl VenueSymbolMap {
    /// Build the mapping from a venue listing
    ///
    /// When several natives normalize to one symbol, the best `QuoteKind`
    /// wins; a tie between distinct natives makes the symbol ambiguous and
    /// it is left out.
    pub fn build<I, S>(natives: I, rules: &SymbolRules) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates: HashMap<Symbol, Vec<(QuoteKind, String)>> = HashMap::new();
        for native in natives {
            let native = native.as_ref();
            if let Some(normalized) = rules.normalize(native) {
                candidates
                    .entry(normalized.symbol)
                    .or_default()
                    .push((normalized.quote, native.to_string()));
            }
        }

        let mut map = Self::default();
        for (symbol, mut options) in candidates {
            options.sort();
            options.dedup();
            let best = options.iter().map(|(kind, _)| *kind).max();
            let top: Vec<&String> = options
                .iter()
                .filter(|(kind, _)| Some(*kind) == best)
                .map(|(_, native)| native)
                .collect();

            match top.as_slice() {
                [native] => {
                    map.natives.insert(symbol, (*native).clone());
                }
                _ => {
                    debug!(symbol = %symbol, candidates = ?top, "Ambiguous native spelling, excluded");
                    map.ambiguous.insert(symbol);
                }
            }
        }
        map
    }

    /// Native spelling for a canonical symbol
    pub fn native(&self, symbol: &Symbol) -> Option<&str> {
        self.natives.get(symbol).map(String::as_str)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.natives.contains_key(symbol)
    }

    pub fn is_ambiguous(&self, symbol: &Symbol) -> bool {
        self.ambiguous.contains(symbol)
    }

    /// Resolvable canonical symbols
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.natives.keys()
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }
}

// =============================================================================
// CommonSymbols
// =============================================================================

/// Native spellings of one canonical symbol on both venues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPair {
    pub native_a: String,
    pub native_b: String,
}

/// Symbols tradable on both venues, with their native spellings
///
/// Iteration order is unspecified.
#[derive(Debug, Default, Clone)]
pub struct CommonSymbols {
    pairs: HashMap<Symbol, SymbolPair>,
}

impl CommonSymbols {
    /// Intersect two venue maps
    pub fn intersect(a: &VenueSymbolMap, b: &VenueSymbolMap) -> Self {
        let pairs = a
            .natives
            .iter()
            .filter_map(|(symbol, native_a)| {
                b.native(symbol).map(|native_b| {
                    (
                        symbol.clone(),
                        SymbolPair {
                            native_a: native_a.clone(),
                            native_b: native_b.to_string(),
                        },
                    )
                })
            })
            .collect();
        Self { pairs }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&SymbolPair> {
        self.pairs.get(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.pairs.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &SymbolPair)> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(Symbol, SymbolPair)> for CommonSymbols {
    fn from_iter<T: IntoIterator<Item = (Symbol, SymbolPair)>>(iter: T) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// SymbolReconciler
// =============================================================================

/// Computes the common symbol set of two venues once per cycle
#[derive(Debug, Clone)]
pub struct SymbolReconciler {
    rules_a: SymbolRules,
    rules_b: SymbolRules,
    listing_timeout: Duration,
}

impl SymbolReconciler {
    pub fn new(rules_a: SymbolRules, rules_b: SymbolRules, listing_timeout: Duration) -> Self {
        Self {
            rules_a,
            rules_b,
            listing_timeout,
        }
    }

    /// List both venues and intersect their canonical symbols
    ///
    /// If either venue cannot report its listing the result is empty; a
    /// partial intersection is never returned.
    pub async fn reconcile<A, B>(&self, venue_a: &A, venue_b: &B) -> CommonSymbols
    where
        A: PriceSource + ?Sized,
        B: PriceSource + ?Sized,
    {
        let (listing_a, listing_b) = tokio::join!(
            self.list_with_timeout(venue_a),
            self.list_with_timeout(venue_b),
        );

        let (natives_a, natives_b) = match (listing_a, listing_b) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) => {
                error!(venue = venue_a.venue_name(), error = %e, "[RECONCILE] Symbol listing failed");
                return CommonSymbols::default();
            }
            (_, Err(e)) => {
                error!(venue = venue_b.venue_name(), error = %e, "[RECONCILE] Symbol listing failed");
                return CommonSymbols::default();
            }
        };

        let map_a = VenueSymbolMap::build(&natives_a, &self.rules_a);
        let map_b = VenueSymbolMap::build(&natives_b, &self.rules_b);
        let common = CommonSymbols::intersect(&map_a, &map_b);

        info!(
            venue_a = venue_a.venue_name(),
            venue_b = venue_b.venue_name(),
            listed_a = natives_a.len(),
            listed_b = natives_b.len(),
            common = common.len(),
            "[RECONCILE] Common symbols computed"
        );
        common
    }

    async fn list_with_timeout<V>(&self, venue: &V) -> VenueResult<Vec<String>>
    where
        V: PriceSource + ?Sized,
    {
        match tokio::time::timeout(self.listing_timeout, venue.list_symbols()).await {
            Ok(result) => result,
            Err(_) => Err(VenueError::NetworkTimeout(
                self.listing_timeout.as_millis() as u64,
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
