//! Affine expressions and maps.
//!
//! An [`AffineMap`] is a function from iteration-space coordinates (`d0`,
//! `d1`, ...) and symbols (`s0`, `s1`, ...) to operand element coordinates.
//! Symbols are placeholders that index attributes fill in at operation
//! verification time via [`AffineMap::replace_symbols`].

use std::collections::BTreeSet;

/// Affine expression over dims, symbols and integer constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AffineExpr {
    Dim(usize),
    Symbol(usize),
    Const(i64),
    Add(Box<AffineExpr>, Box<AffineExpr>),
    Mul(Box<AffineExpr>, Box<AffineExpr>),
}

impl AffineExpr {
    pub fn dim(index: usize) -> Self {
        Self::Dim(index)
    }

    pub fn sym(index: usize) -> Self {
        Self::Symbol(index)
    }

    pub fn constant(value: i64) -> Self {
        Self::Const(value)
    }

    /// Substitute bound symbols with literal values, folding constants.
    ///
    /// Symbols with no binding are left in place; the definition-time
    /// unbound-symbol check guarantees that never happens for maps reached
    /// through a generated accessor.
    pub fn replace_symbols(&self, values: &[Option<i64>]) -> AffineExpr {
        match self {
            Self::Dim(d) => Self::Dim(*d),
            Self::Const(c) => Self::Const(*c),
            Self::Symbol(s) => match values.get(*s).copied().flatten() {
                Some(v) => Self::Const(v),
                None => Self::Symbol(*s),
            },
            Self::Add(lhs, rhs) => {
                let (lhs, rhs) = (lhs.replace_symbols(values), rhs.replace_symbols(values));
                match (&lhs, &rhs) {
                    (Self::Const(a), Self::Const(b)) => Self::Const(a + b),
                    _ => Self::Add(Box::new(lhs), Box::new(rhs)),
                }
            }
            Self::Mul(lhs, rhs) => {
                let (lhs, rhs) = (lhs.replace_symbols(values), rhs.replace_symbols(values));
                match (&lhs, &rhs) {
                    (Self::Const(a), Self::Const(b)) => Self::Const(a * b),
                    _ => Self::Mul(Box::new(lhs), Box::new(rhs)),
                }
            }
        }
    }

    fn collect_symbols(&self, out: &mut BTreeSet<usize>) {
        match self {
            Self::Dim(_) | Self::Const(_) => {}
            Self::Symbol(s) => {
                out.insert(*s);
            }
            Self::Add(lhs, rhs) | Self::Mul(lhs, rhs) => {
                lhs.collect_symbols(out);
                rhs.collect_symbols(out);
            }
        }
    }
}

impl std::ops::Add for AffineExpr {
    type Output = AffineExpr;

    fn add(self, rhs: AffineExpr) -> AffineExpr {
        AffineExpr::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for AffineExpr {
    type Output = AffineExpr;

    fn mul(self, rhs: AffineExpr) -> AffineExpr {
        AffineExpr::Mul(Box::new(self), Box::new(rhs))
    }
}

impl std::fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dim(d) => write!(f, "d{d}"),
            Self::Symbol(s) => write!(f, "s{s}"),
            Self::Const(c) => write!(f, "{c}"),
            Self::Add(lhs, rhs) => write!(f, "{lhs} + {rhs}"),
            Self::Mul(lhs, rhs) => write!(f, "{lhs} * {rhs}"),
        }
    }
}

/// Affine map over a shared iteration space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffineMap {
    num_dims: usize,
    num_symbols: usize,
    results: Vec<AffineExpr>,
}

impl AffineMap {
    pub fn new(num_dims: usize, num_symbols: usize, results: Vec<AffineExpr>) -> Self {
        Self { num_dims, num_symbols, results }
    }

    /// Identity map over `rank` dimensions: `(d0, ..) -> (d0, ..)`.
    pub fn identity(rank: usize) -> Self {
        Self::new(rank, 0, (0..rank).map(AffineExpr::Dim).collect())
    }

    /// Map that projects `symbols` in order: `()[s..] -> (s_i, ..)`.
    pub fn symbol_projection(num_symbols: usize, symbols: impl IntoIterator<Item = usize>) -> Self {
        Self::new(0, num_symbols, symbols.into_iter().map(AffineExpr::Symbol).collect())
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    pub fn num_symbols(&self) -> usize {
        self.num_symbols
    }

    pub fn results(&self) -> &[AffineExpr] {
        &self.results
    }

    pub fn is_symbol_free(&self) -> bool {
        self.symbols_used().is_empty()
    }

    /// Indices of the symbols referenced by any result expression.
    pub fn symbols_used(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for result in &self.results {
            result.collect_symbols(&mut out);
        }
        out
    }

    /// Substitute bound symbols with literal values.
    ///
    /// The returned map has no symbol dimensions left; constants are folded
    /// (`d1 * s2` with `s2 = 2` becomes `d1 * 2`).
    pub fn replace_symbols(&self, values: &[Option<i64>]) -> AffineMap {
        AffineMap {
            num_dims: self.num_dims,
            num_symbols: 0,
            results: self.results.iter().map(|r| r.replace_symbols(values)).collect(),
        }
    }
}

impl std::fmt::Display for AffineMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for d in 0..self.num_dims {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "d{d}")?;
        }
        write!(f, ")")?;
        if self.num_symbols > 0 {
            write!(f, "[")?;
            for s in 0..self.num_symbols {
                if s > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "s{s}")?;
            }
            write!(f, "]")?;
        }
        write!(f, " -> (")?;
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{result}")?;
        }
        write!(f, ")")
    }
}
