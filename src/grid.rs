//! Deterministic symbol-grid generation.
//!
//! The grid is a pure function of (bet commitment, block seed, reel layout).
//! All entropy arrives via the seed; the generator itself performs no I/O
//! and holds no randomness of its own. Every consumer in the crate — the
//! provisional computation, the claim fallback and the simulated ledger's
//! authoritative claim — routes through `generate`, so locally computed and
//! chain-computed grids are bit-for-bit identical.

use crate::paytable::{ReelLayout, Symbol};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A reel-count x window-height matrix of symbols, reel-major.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grid {
    columns: Vec<Vec<Symbol>>,
}

impl Grid {
    pub fn from_columns(columns: Vec<Vec<Symbol>>) -> Self {
        Self { columns }
    }

    pub fn cell(&self, reel: usize, row: usize) -> Symbol {
        self.columns[reel][row]
    }

    pub fn reel_count(&self) -> usize {
        self.columns.len()
    }

    pub fn window_height(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Symbols of one reel column, top row first.
    pub fn column(&self, reel: usize) -> &[Symbol] {
        &self.columns[reel]
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.window_height() {
            for reel in 0..self.reel_count() {
                if reel > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.cell(reel, row))?;
            }
            if row + 1 < self.window_height() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Stop position of each reel for a (seed, commitment) pair.
///
/// `stop(r) = u64_be(sha256(seed || bet_key || r_be32)[..8]) mod reel_len`.
/// This formula is the single source of truth for the whole crate; a live
/// deployment against a different contract replaces it here and nowhere
/// else.
pub fn derive_stops(bet_key: &[u8], seed: &[u8; 32], layout: &ReelLayout) -> Vec<usize> {
    (0..layout.reel_count)
        .map(|reel| {
            let mut hasher = Sha256::new();
            hasher.update(seed);
            hasher.update(bet_key);
            hasher.update((reel as u32).to_be_bytes());
            let digest = hasher.finalize();
            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&digest[..8]);
            (u64::from_be_bytes(prefix) % layout.reel_length as u64) as usize
        })
        .collect()
}

/// Generate the visible window for a commitment and seed.
pub fn generate(bet_key: &[u8], seed: &[u8; 32], layout: &ReelLayout) -> Grid {
    let stops = derive_stops(bet_key, seed, layout);
    let columns = stops
        .iter()
        .enumerate()
        .map(|(reel, stop)| {
            (0..layout.window_height)
                .map(|row| layout.symbol_at(reel, stop + row))
                .collect()
        })
        .collect();
    Grid::from_columns(columns)
}
