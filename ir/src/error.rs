use snafu::Snafu;

use crate::attr::ParamType;

/// Errors detected while registering descriptors or generating code from
/// them. Fatal to the build; never observed while compiling a program.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum DefinitionError {
    /// Mnemonic already registered in this dialect.
    #[snafu(display("duplicate mnemonic '{mnemonic}' in dialect '{dialect}'"))]
    DuplicateMnemonic { dialect: String, mnemonic: String },

    /// More than one parameter marked as self-type.
    #[snafu(display("attribute '{mnemonic}' declares more than one self-type parameter"))]
    MultipleSelfTypeParams { mnemonic: String },

    /// Element iteration declared over a parameter that cannot back it.
    #[snafu(display(
        "attribute '{mnemonic}' declares element iteration over parameter {param}, which is not an integer array"
    ))]
    UnsupportedIterableRepr { mnemonic: String, param: usize },

    /// Indexing maps disagree on iteration-space rank.
    #[snafu(display("indexing maps disagree on iteration-space rank: expected {expected} dimensions, got {got}"))]
    RankMismatch { expected: usize, got: usize },

    /// Number of indexing maps does not match number of operands.
    #[snafu(display("expected one indexing map per operand ({expected}), got {got}"))]
    IndexingMapCountMismatch { expected: usize, got: usize },

    /// Scalar function name not present in the injected registry.
    #[snafu(display("unknown scalar function '{func}'"))]
    UnknownScalarFunction { func: String },

    /// Symbol referenced by an indexing map or scalar expression that no
    /// index attribute binds.
    #[snafu(display("unbound symbol '{symbol}'"))]
    UnboundSymbol { symbol: String },

    /// Symbol bound by two different index attributes.
    #[snafu(display("symbol 's{symbol}' is bound more than once"))]
    SymbolBoundTwice { symbol: usize },

    /// Index attribute operand whose map result is not a plain symbol.
    #[snafu(display("attribute map of operand '{operand}' must only project symbols"))]
    MalformedAttributeMap { operand: String },

    /// Output operand without an assignment, or assignment to a non-output.
    #[snafu(display("output operand '{output}' has no assignment"))]
    MissingAssignment { output: String },

    /// Assignment target that is not an output operand.
    #[snafu(display("assignment targets '{name}', which is not an output operand"))]
    UnknownAssignmentTarget { name: String },

    /// Iteration index out of the declared iteration-space rank.
    #[snafu(display("iteration index {dim} out of range for rank {rank}"))]
    IndexOutOfRange { dim: usize, rank: usize },

    /// Cast targets a type variable no operand declares.
    #[snafu(display("type variable '{var}' is not declared by any operand"))]
    UnboundTypeVar { var: String },
}

/// Errors raised while building a single attribute or operation instance.
/// Aborts that construction only; the instance store is left untouched.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum ConstructionError {
    /// Supplied value count differs from the declared parameter count.
    #[snafu(display("attribute '{mnemonic}' expects {expected} parameters, got {got}"))]
    ParameterArityMismatch { mnemonic: String, expected: usize, got: usize },

    /// A value's runtime type disagrees with the declared semantic type.
    #[snafu(display("parameter '{param}' of attribute '{mnemonic}' expects {expected:?}, got {got:?}"))]
    ParameterTypeMismatch { mnemonic: String, param: String, expected: ParamType, got: ParamType },

    /// Custom verification hook rejected the parameter tuple.
    #[snafu(display("verification of attribute '{mnemonic}' failed: {reason}"))]
    VerificationFailed { mnemonic: String, reason: String },

    /// Descriptor declares a self-type parameter but no result type was
    /// supplied and no type builder is present.
    #[snafu(display("attribute '{mnemonic}' requires a result type"))]
    MissingResultType { mnemonic: String },

    /// Sub-element replacement on an attribute that does not support it.
    #[snafu(display("attribute '{mnemonic}' does not support sub-element replacement"))]
    SubElementsNotSupported { mnemonic: String },

    /// Sub-element index past the end of the immediate child sequence.
    #[snafu(display("sub-element index {index} out of range for attribute '{mnemonic}' with {count} children"))]
    SubElementIndexOutOfRange { mnemonic: String, index: usize, count: usize },

    /// Segment bookkeeping attribute disagrees with the operand list.
    #[snafu(display("operand segments of '{op}' sum to {expected}, but the operation has {got} operands"))]
    SegmentMismatch { op: String, expected: usize, got: usize },

    /// Scalar expression references an operand that has no block argument.
    #[snafu(display("scalar expression references unknown operand '{name}'"))]
    UnboundScalarArgument { name: String },

    /// Region construction is missing a concrete binding for a type variable.
    #[snafu(display("no concrete type bound for type variable '{var}'"))]
    MissingTypeBinding { var: String },
}

/// Errors raised by per-instance verification passes. Reported through the
/// diagnostic channel; the operation is marked invalid, the process
/// continues.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum VerificationError {
    /// Declared index attribute not attached to the operation instance.
    #[snafu(display("operation '{op}' is missing required index attribute '{attr_name}'"))]
    MissingIndexAttribute { op: String, attr_name: String },

    /// Index attribute present but with the wrong element count.
    #[snafu(display("index attribute '{attr_name}' of '{op}' must have {expected} elements, got {got}"))]
    MisshapenIndexAttribute { op: String, attr_name: String, expected: usize, got: usize },
}
