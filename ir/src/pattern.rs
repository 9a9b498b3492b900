//! Rewrite pattern infrastructure.
//!
//! Patterns are indexed by root operation name for O(1) dispatch; patterns
//! without a root act as wildcards and are tried after the indexed ones.
//!
//! A pattern that cannot fire reports a [`MatchFailure`]: a soft, expected
//! outcome that the driver logs and treats as "no match", never as an
//! abort. Patterns must be side-effect-free on failure; they build their
//! replacement sequence and the driver splices it in only on success.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use snafu::Snafu;

use crate::context::Context;
use crate::op::{OpName, Operation, Value};

/// Soft outcome of a failed match. Propagated to the rewrite driver as
/// "no match"; the driver may retry the operation on a later sweep.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum MatchFailure {
    /// No registered pattern recognizes this operation.
    #[snafu(display("no match"))]
    NoMatch,

    /// An operand's type has not been converted yet; retry after its
    /// producer is lowered.
    #[snafu(display("operand {operand} is not in a lowered type yet"))]
    NotYetConverted { operand: usize },

    /// No target intrinsic exists for the matched configuration.
    #[snafu(display("unsupported variant: {variant}"))]
    UnsupportedVariant { variant: String },
}

/// Successful rewrite: a prefix sequence of new operations plus the values
/// replacing the matched operation's results, in result order.
pub struct Rewrite {
    pub ops: Vec<Arc<Operation>>,
    pub results: SmallVec<[Value; 2]>,
}

impl Rewrite {
    /// Replace the matched op with `ops`, the last of which supplies all
    /// result values.
    pub fn with_final(ops: Vec<Arc<Operation>>) -> Self {
        let results = ops.last().map(|op| op.results().into_iter().collect()).unwrap_or_default();
        Self { ops, results }
    }

    /// Erase the matched op, emitting `ops` in its place (no results).
    pub fn erase(ops: Vec<Arc<Operation>>) -> Self {
        Self { ops, results: SmallVec::new() }
    }
}

pub type MatchResult = Result<Rewrite, MatchFailure>;

/// One rewrite rule.
///
/// `adaptor` carries the operation's operands with all previously applied
/// rewrites substituted, while `op` itself still holds the original operand
/// values (and therefore the original, unconverted types). Rules that need
/// pre-conversion type information read it from `op`; rules build
/// replacement operations from the `adaptor` values.
pub trait RewritePattern: Send + Sync {
    /// Operation name this pattern anchors on; `None` makes it a wildcard.
    fn root(&self) -> Option<OpName>;

    fn match_and_rewrite(&self, ctx: &Context, op: &Arc<Operation>, adaptor: &[Value]) -> MatchResult;
}

struct PatternFn<F> {
    root: Option<OpName>,
    f: F,
}

impl<F> RewritePattern for PatternFn<F>
where
    F: Fn(&Context, &Arc<Operation>, &[Value]) -> MatchResult + Send + Sync,
{
    fn root(&self) -> Option<OpName> {
        self.root.clone()
    }

    fn match_and_rewrite(&self, ctx: &Context, op: &Arc<Operation>, adaptor: &[Value]) -> MatchResult {
        (self.f)(ctx, op, adaptor)
    }
}

/// Wrap a closure as a pattern anchored on `root`.
pub fn pattern<F>(root: &str, f: F) -> Box<dyn RewritePattern>
where
    F: Fn(&Context, &Arc<Operation>, &[Value]) -> MatchResult + Send + Sync + 'static,
{
    Box::new(PatternFn { root: Some(OpName::new(root)), f })
}

/// Registered rewrite rules, indexed by root operation name.
#[derive(Default)]
pub struct PatternSet {
    indexed: HashMap<OpName, Vec<Box<dyn RewritePattern>>>,
    wildcards: Vec<Box<dyn RewritePattern>>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pattern: Box<dyn RewritePattern>) {
        match pattern.root() {
            Some(root) => self.indexed.entry(root).or_default().push(pattern),
            None => self.wildcards.push(pattern),
        }
    }

    pub fn len(&self) -> usize {
        self.indexed.values().map(|v| v.len()).sum::<usize>() + self.wildcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.wildcards.is_empty()
    }

    /// Try every applicable pattern; the first success wins.
    ///
    /// Returns the most informative failure when nothing fires (a typed
    /// decline beats a plain no-match, so the driver can log why).
    pub fn rewrite(&self, ctx: &Context, op: &Arc<Operation>, adaptor: &[Value]) -> MatchResult {
        let mut failure = MatchFailure::NoMatch;

        let indexed = self.indexed.get(op.name()).map(|v| v.as_slice()).unwrap_or_default();
        tracing::trace!(op = %op.name(), pattern_count = indexed.len(), "trying indexed patterns");

        for pattern in indexed.iter().chain(&self.wildcards) {
            match pattern.match_and_rewrite(ctx, op, adaptor) {
                Ok(rewrite) => {
                    tracing::debug!(op = %op.name(), "pattern matched");
                    return Ok(rewrite);
                }
                Err(MatchFailure::NoMatch) => {}
                Err(other) => failure = other,
            }
        }

        Err(failure)
    }
}
