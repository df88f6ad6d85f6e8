//! Static machine data: symbol alphabet, paytable, payline patterns and
//! reel layout.
//!
//! Everything here is read-only at spin time. Monetary multipliers are
//! integers; payout arithmetic never touches floating point so local results
//! cannot drift from the contract's integer math.

use crate::errors::{SpinError, SpinResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single reel symbol, identified by its character in the reel strip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub char);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Multiplier for one (symbol, run length) combination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaytableEntry {
    pub symbol: Symbol,
    pub run_length: u8,
    pub multiplier: u64,
}

/// The full multiplier table for a machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paytable {
    entries: Vec<PaytableEntry>,
}

impl Paytable {
    pub fn new(entries: Vec<PaytableEntry>) -> Self {
        Self { entries }
    }

    /// Exact multiplier lookup; `None` when the combination pays nothing.
    pub fn multiplier(&self, symbol: Symbol, run_length: u8) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.symbol == symbol && e.run_length == run_length)
            .map(|e| e.multiplier)
    }

    /// Largest multiplier in the table. Used for the over-claim bound.
    pub fn max_multiplier(&self) -> u64 {
        self.entries.iter().map(|e| e.multiplier).max().unwrap_or(0)
    }

    /// Distinct symbols that appear in the table.
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        self.entries.iter().map(|e| e.symbol).collect()
    }

    pub fn entries(&self) -> &[PaytableEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed payline patterns: one row index per reel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaylineSet {
    patterns: Vec<Vec<u8>>,
}

impl PaylineSet {
    pub fn new(patterns: Vec<Vec<u8>>) -> Self {
        Self { patterns }
    }

    pub fn empty() -> Self {
        Self { patterns: vec![] }
    }

    pub fn pattern(&self, index: usize) -> Option<&[u8]> {
        self.patterns.get(index).map(|p| p.as_slice())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.patterns.iter()
    }
}

/// Physical reel strips: `reel_count` strips of `reel_length` symbols each,
/// stored as one concatenated string, plus the visible window height.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReelLayout {
    pub reel_symbols: String,
    pub reel_count: usize,
    pub reel_length: usize,
    pub window_height: usize,
}

impl ReelLayout {
    pub fn new(
        reel_symbols: String,
        reel_count: usize,
        reel_length: usize,
        window_height: usize,
    ) -> SpinResult<Self> {
        let layout = Self {
            reel_symbols,
            reel_count,
            reel_length,
            window_height,
        };
        layout.validate()?;
        Ok(layout)
    }

    fn validate(&self) -> SpinResult<()> {
        if self.reel_count == 0 || self.reel_length == 0 {
            return Err(SpinError::Configuration {
                field: "reel_layout".to_string(),
                value: format!("{}x{}", self.reel_count, self.reel_length),
                reason: "Reel count and length must be non-zero".to_string(),
            });
        }
        if self.window_height == 0 || self.window_height > self.reel_length {
            return Err(SpinError::Configuration {
                field: "window_height".to_string(),
                value: self.window_height.to_string(),
                reason: "Window must be between 1 and the reel length".to_string(),
            });
        }
        let expected = self.reel_count * self.reel_length;
        let actual = self.reel_symbols.chars().count();
        if actual != expected {
            return Err(SpinError::Configuration {
                field: "reel_symbols".to_string(),
                value: actual.to_string(),
                reason: format!("Expected {} symbols ({} reels x {})", expected, self.reel_count, self.reel_length),
            });
        }
        Ok(())
    }

    /// Symbol at `offset` on reel `reel`, reading the strip circularly.
    pub fn symbol_at(&self, reel: usize, offset: usize) -> Symbol {
        let base = reel * self.reel_length;
        let idx = base + (offset % self.reel_length);
        // Validated at construction: the strip holds reel_count * reel_length chars.
        Symbol(self.reel_symbols.chars().nth(idx).unwrap_or('?'))
    }

    /// Distinct symbols present on the strips.
    pub fn alphabet(&self) -> BTreeSet<Symbol> {
        self.reel_symbols.chars().map(Symbol).collect()
    }
}

/// How a grid is interpreted by the win evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WinRule {
    /// Fixed payline positions, one row per reel.
    Paylines,
    /// Any-position matching per reel ("ways to win").
    Ways,
}

impl fmt::Display for WinRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinRule::Paylines => write!(f, "paylines"),
            WinRule::Ways => write!(f, "ways"),
        }
    }
}

/// Complete machine configuration as resolved from the contract.
///
/// Owned by the adapter, fetched once per adapter lifetime and shared
/// read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineConfig {
    pub win_rule: WinRule,
    pub layout: ReelLayout,
    pub paylines: PaylineSet,
    pub paytable: Paytable,
    pub min_stake_per_line: u64,
    pub max_stake_per_line: u64,
    pub max_lines: u32,
    pub max_payout_multiplier: u64,
}

impl MachineConfig {
    /// Full consistency check. An adapter either resolves a configuration
    /// that passes this or refuses to serve spins.
    pub fn validate(&self) -> SpinResult<()> {
        if self.paytable.is_empty() {
            return Err(SpinError::NotInitialized(
                "Paytable resolved empty".to_string(),
            ));
        }
        if self.win_rule == WinRule::Paylines {
            if self.paylines.is_empty() {
                return Err(SpinError::NotInitialized(
                    "Payline machine resolved without payline patterns".to_string(),
                ));
            }
            for (i, pattern) in self.paylines.iter().enumerate() {
                if pattern.len() != self.layout.reel_count {
                    return Err(SpinError::NotInitialized(format!(
                        "Payline {} has {} positions, expected {}",
                        i,
                        pattern.len(),
                        self.layout.reel_count
                    )));
                }
                if let Some(row) = pattern.iter().find(|r| **r as usize >= self.layout.window_height) {
                    return Err(SpinError::NotInitialized(format!(
                        "Payline {} references row {} outside the window",
                        i, row
                    )));
                }
            }
        }
        // Every strip symbol must be payable for every qualifying run length.
        let payable = self.paytable.symbols();
        for symbol in self.layout.alphabet() {
            if !payable.contains(&symbol) {
                return Err(SpinError::NotInitialized(format!(
                    "No paytable entries for reel symbol '{}'",
                    symbol
                )));
            }
        }
        if self.min_stake_per_line == 0 || self.max_stake_per_line < self.min_stake_per_line {
            return Err(SpinError::NotInitialized(format!(
                "Bad stake bounds: {}..{}",
                self.min_stake_per_line, self.max_stake_per_line
            )));
        }
        if self.max_lines == 0 {
            return Err(SpinError::NotInitialized("max_lines is zero".to_string()));
        }
        if self.max_payout_multiplier < self.paytable.max_multiplier() {
            return Err(SpinError::NotInitialized(format!(
                "max_payout_multiplier {} below largest table entry {}",
                self.max_payout_multiplier,
                self.paytable.max_multiplier()
            )));
        }
        Ok(())
    }

    /// Reference five-reel machine: 5x3 window, 20 paylines, eight symbols.
    /// Used by the simulated adapter and as the shape live contracts follow.
    pub fn five_reel_default() -> Self {
        const STRIP: &str = "ABCDEFGHHGFEDCBAHGFEDCBAABCDEFGH";
        let reel_length = STRIP.len();
        let mut reel_symbols = String::with_capacity(reel_length * 5);
        for reel in 0..5 {
            // Rotate each strip so the reels differ while sharing one alphabet.
            let split = (reel * 7) % reel_length;
            reel_symbols.push_str(&STRIP[split..]);
            reel_symbols.push_str(&STRIP[..split]);
        }

        let paylines = PaylineSet::new(vec![
            vec![1, 1, 1, 1, 1],
            vec![0, 0, 0, 0, 0],
            vec![2, 2, 2, 2, 2],
            vec![0, 1, 2, 1, 0],
            vec![2, 1, 0, 1, 2],
            vec![0, 0, 1, 2, 2],
            vec![2, 2, 1, 0, 0],
            vec![1, 2, 1, 0, 1],
            vec![1, 0, 1, 2, 1],
            vec![1, 2, 2, 2, 1],
            vec![0, 1, 1, 1, 0],
            vec![2, 1, 1, 1, 2],
            vec![0, 1, 0, 1, 0],
            vec![2, 1, 2, 1, 2],
            vec![1, 1, 0, 1, 1],
            vec![1, 1, 2, 1, 1],
            vec![0, 2, 0, 2, 0],
            vec![2, 0, 2, 0, 2],
            vec![0, 2, 2, 2, 0],
            vec![2, 0, 0, 0, 2],
        ]);

        let mut entries = Vec::new();
        let table: [(char, [u64; 3]); 8] = [
            ('A', [100, 1000, 10000]),
            ('B', [50, 200, 2000]),
            ('C', [40, 150, 1000]),
            ('D', [30, 100, 500]),
            ('E', [20, 75, 250]),
            ('F', [15, 50, 150]),
            ('G', [10, 25, 100]),
            ('H', [5, 15, 50]),
        ];
        for (symbol, multipliers) in table {
            for (i, multiplier) in multipliers.into_iter().enumerate() {
                entries.push(PaytableEntry {
                    symbol: Symbol(symbol),
                    run_length: 3 + i as u8,
                    multiplier,
                });
            }
        }

        Self {
            win_rule: WinRule::Paylines,
            layout: ReelLayout {
                reel_symbols,
                reel_count: 5,
                reel_length,
                window_height: 3,
            },
            paylines,
            paytable: Paytable::new(entries),
            min_stake_per_line: 1_000,
            max_stake_per_line: 100_000_000,
            max_lines: 20,
            max_payout_multiplier: 10_000,
        }
    }

    /// Same machine evaluated with the ways-to-win rule.
    pub fn ways_default() -> Self {
        let mut config = Self::five_reel_default();
        config.win_rule = WinRule::Ways;
        config.paylines = PaylineSet::empty();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MachineConfig::five_reel_default();
        config.validate().expect("default config must validate");
        assert_eq!(config.paylines.len(), 20);
        assert_eq!(config.layout.reel_count, 5);
        assert_eq!(config.layout.window_height, 3);
    }

    #[test]
    fn test_ways_config_is_valid() {
        let config = MachineConfig::ways_default();
        config.validate().expect("ways config must validate");
        assert!(config.paylines.is_empty());
    }

    #[test]
    fn test_multiplier_lookup() {
        let config = MachineConfig::five_reel_default();
        assert_eq!(config.paytable.multiplier(Symbol('A'), 5), Some(10_000));
        assert_eq!(config.paytable.multiplier(Symbol('H'), 3), Some(5));
        assert_eq!(config.paytable.multiplier(Symbol('A'), 2), None);
        assert_eq!(config.paytable.max_multiplier(), 10_000);
    }

    #[test]
    fn test_layout_symbol_wraps() {
        let layout = ReelLayout::new("ABCABC".to_string(), 2, 3, 2).unwrap();
        assert_eq!(layout.symbol_at(0, 0), Symbol('A'));
        assert_eq!(layout.symbol_at(0, 3), Symbol('A'));
        assert_eq!(layout.symbol_at(1, 2), Symbol('C'));
        assert_eq!(layout.symbol_at(1, 5), Symbol('C'));
    }

    #[test]
    fn test_layout_rejects_bad_lengths() {
        assert!(ReelLayout::new("ABC".to_string(), 2, 3, 2).is_err());
        assert!(ReelLayout::new("ABCABC".to_string(), 2, 3, 4).is_err());
        assert!(ReelLayout::new("ABCABC".to_string(), 2, 3, 0).is_err());
    }

    #[test]
    fn test_validate_rejects_unpayable_symbol() {
        let mut config = MachineConfig::five_reel_default();
        config.paytable = Paytable::new(vec![PaytableEntry {
            symbol: Symbol('A'),
            run_length: 3,
            multiplier: 10,
        }]);
        // Strip carries B..H which the table no longer covers.
        assert!(matches!(
            config.validate(),
            Err(SpinError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_validate_rejects_short_payline() {
        let mut config = MachineConfig::five_reel_default();
        config.paylines = PaylineSet::new(vec![vec![1, 1, 1]]);
        assert!(config.validate().is_err());
    }
}
