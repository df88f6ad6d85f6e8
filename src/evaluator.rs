//! Win evaluation over a generated grid.
//!
//! Pure integer arithmetic throughout. A run qualifies from the leftmost
//! reel, consecutively, with a minimum length of 3. Overlapping wins are
//! additive; nothing is deduplicated.

use crate::grid::Grid;
use crate::paytable::{MachineConfig, Symbol, WinRule};
use crate::spin::WinningLine;

/// Minimum consecutive run for a payout, fixed by the contract family.
pub const MIN_RUN: u8 = 3;

/// Winning lines and their sum for one grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinSummary {
    pub winning_lines: Vec<WinningLine>,
    pub total_payout: u64,
}

/// Evaluate a grid under the machine's win rule.
///
/// `line_count` bounds the evaluated paylines for fixed-payline machines
/// and is ignored by the ways rule, where the whole window is always live.
pub fn evaluate(
    grid: &Grid,
    config: &MachineConfig,
    stake_per_line: u64,
    line_count: u32,
) -> WinSummary {
    let winning_lines = match config.win_rule {
        WinRule::Paylines => evaluate_paylines(grid, config, stake_per_line, line_count),
        WinRule::Ways => evaluate_ways(grid, config, stake_per_line),
    };
    let total_payout = winning_lines.iter().map(|l| l.payout).sum();
    WinSummary {
        winning_lines,
        total_payout,
    }
}

fn evaluate_paylines(
    grid: &Grid,
    config: &MachineConfig,
    stake_per_line: u64,
    line_count: u32,
) -> Vec<WinningLine> {
    let active = (line_count as usize).min(config.paylines.len());
    let mut wins = Vec::new();
    for index in 0..active {
        let pattern = match config.paylines.pattern(index) {
            Some(p) => p,
            None => break,
        };
        let first = grid.cell(0, pattern[0] as usize);
        let mut run = 1u8;
        for (reel, row) in pattern.iter().enumerate().skip(1) {
            if grid.cell(reel, *row as usize) == first {
                run += 1;
            } else {
                break;
            }
        }
        if run < MIN_RUN {
            continue;
        }
        if let Some(multiplier) = config.paytable.multiplier(first, run) {
            wins.push(WinningLine {
                line_index: index as u32,
                symbol: first,
                run_length: run,
                pattern: pattern.to_vec(),
                ways: 1,
                payout: stake_per_line * multiplier,
            });
        }
    }
    wins
}

fn evaluate_ways(grid: &Grid, config: &MachineConfig, stake_per_line: u64) -> Vec<WinningLine> {
    // Candidates are the distinct symbols on reel 0; a way extends while the
    // symbol appears anywhere on each following reel.
    let mut candidates: Vec<Symbol> = Vec::new();
    for row in 0..grid.window_height() {
        let symbol = grid.cell(0, row);
        if !candidates.contains(&symbol) {
            candidates.push(symbol);
        }
    }

    let mut wins = Vec::new();
    for (index, symbol) in candidates.into_iter().enumerate() {
        let mut run = 0u8;
        let mut ways: u32 = 1;
        for reel in 0..grid.reel_count() {
            let count = grid
                .column(reel)
                .iter()
                .filter(|cell| **cell == symbol)
                .count() as u32;
            if count == 0 {
                break;
            }
            run += 1;
            ways *= count;
        }
        if run < MIN_RUN {
            continue;
        }
        if let Some(multiplier) = config.paytable.multiplier(symbol, run) {
            wins.push(WinningLine {
                line_index: index as u32,
                symbol,
                run_length: run,
                pattern: vec![],
                ways,
                payout: stake_per_line * multiplier * ways as u64,
            });
        }
    }
    wins
}
