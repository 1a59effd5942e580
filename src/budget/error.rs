use thiserror::Error;

/// Errors raised while turning engine statistics into a filter configuration.
///
/// Every variant is an input-contract violation. Degenerate inputs (a single
/// run, zero entries, a zero budget) are not errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocError {
    #[error("negative {unit} at level {level}, run {run}: {value}")]
    NegativeStat {
        unit: &'static str,
        level: usize,
        run: usize,
        value: i64,
    },

    #[error("average entry size must be greater than zero")]
    ZeroKeySize,

    #[error("no runs to allocate filter bits to")]
    NoRuns,

    #[error("run layout covers {expected} runs but {actual} values were given")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("level {0} has no runs")]
    EmptyLevel(usize),

    #[error("bit budget does not fit in 64 bits")]
    BudgetOverflow,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("exact entry counts were requested but the engine does not report them")]
    ExactCountsUnavailable,
}
