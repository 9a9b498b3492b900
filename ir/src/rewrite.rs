//! Fixed-point rewrite driver.
//!
//! # Algorithm
//!
//! The driver sweeps a block's operation list, offering every operation to
//! the pattern set together with an *adaptor*: its operand list with all
//! result replacements recorded so far substituted in. A successful rewrite
//! splices the replacement prefix into the block and maps the old results
//! to the new values; the matched operation itself keeps its original
//! operand types until then, so later rules can still read pre-conversion
//! type information from it.
//!
//! Sweeps repeat until a full pass changes nothing (rules that declined
//! with "not yet converted" get retried once their producers are lowered),
//! then one materialization pass rebuilds the surviving operations whose
//! operands were remapped.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::context::Context;
use crate::op::{Block, Value, ValueKey};
use crate::pattern::{MatchFailure, PatternSet};

// Backstop against pattern sets that never reach a fixed point.
const MAX_SWEEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Whether any operation was rewritten.
    pub changed: bool,
    /// Number of sweeps until the fixed point (or the backstop).
    pub sweeps: usize,
}

/// Resolve a value through the replacement map, following chains.
fn resolve(mapping: &HashMap<ValueKey, Value>, value: &Value) -> Value {
    let mut current = value.clone();
    // Chains are short; the cap only guards against accidental cycles.
    for _ in 0..mapping.len() + 1 {
        match mapping.get(&current.key()) {
            Some(next) if next.key() != current.key() => current = next.clone(),
            _ => break,
        }
    }
    current
}

fn remap_operands(mapping: &HashMap<ValueKey, Value>, operands: &[Value]) -> SmallVec<[Value; 4]> {
    operands.iter().map(|v| resolve(mapping, v)).collect()
}

/// Apply `patterns` to `block` until a fixed point.
pub fn apply_patterns(ctx: &Context, block: &mut Block, patterns: &PatternSet) -> RewriteOutcome {
    let mut mapping: HashMap<ValueKey, Value> = HashMap::new();
    let mut changed_any = false;
    let mut sweeps = 0;

    loop {
        sweeps += 1;
        let mut changed = false;

        let ops = std::mem::take(&mut block.operations);
        let mut out = Vec::with_capacity(ops.len());

        for op in ops {
            let adaptor = remap_operands(&mapping, op.operands());
            match patterns.rewrite(ctx, &op, &adaptor) {
                Ok(rewrite) => {
                    debug_assert_eq!(rewrite.results.len(), op.num_results(), "rewrite of '{}'", op.name());
                    for (index, replacement) in rewrite.results.iter().enumerate() {
                        mapping.insert(op.result(index).key(), replacement.clone());
                    }
                    out.extend(rewrite.ops);
                    changed = true;
                    changed_any = true;
                }
                Err(MatchFailure::NoMatch) => out.push(op),
                Err(failure) => {
                    tracing::debug!(op = %op.name(), %failure, "pattern declined, keeping op for retry");
                    out.push(op);
                }
            }
        }

        block.operations = out;

        if !changed {
            break;
        }
        if sweeps >= MAX_SWEEPS {
            tracing::warn!(sweeps, "rewrite sweep backstop reached before a fixed point");
            break;
        }
    }

    // Materialize remaining remapped operands. Unmatched operations kept
    // their original operand values during the sweeps; rebuild the ones
    // whose operands now point at replaced results.
    if changed_any {
        let ops = std::mem::take(&mut block.operations);
        let mut out = Vec::with_capacity(ops.len());
        for op in ops {
            let adaptor = remap_operands(&mapping, op.operands());
            if adaptor.iter().zip(op.operands()).all(|(new, old)| new.key() == old.key()) {
                out.push(op);
            } else {
                let replacement = op.with_operands(adaptor);
                for index in 0..op.num_results() {
                    mapping.insert(op.result(index).key(), replacement.result(index));
                }
                out.push(replacement);
            }
        }
        block.operations = out;
    }

    RewriteOutcome { changed: changed_any, sweeps }
}
