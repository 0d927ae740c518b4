use std::fmt;

/// Errors surfaced by the partition function core. The core never writes
/// to stderr or logs on its own behalf; callers decide how to surface
/// these (the `pf-fold` binary logs them via `log`/`colored`).
#[derive(Debug)]
pub enum PfError {
    /// The sequence or a constraint derived from it could not be used.
    InvalidInput { why: String },
    /// A DP cell reached the floating-point maximum.
    Overflow { i: usize, j: usize, value: f64 },
    /// The root cell underflowed to (near) zero.
    Underflow,
    /// Hard constraints exclude every structure, and it isn't underflow.
    ConstraintInfeasible,
    /// Stochastic backtracking could not settle a decomposition.
    SampleFailure { region: String },
    /// A cancel token was observed mid-fill.
    Cancelled,
}

impl fmt::Display for PfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PfError::InvalidInput { why } => write!(f, "invalid input: {}", why),
            PfError::Overflow { i, j, value } => write!(
                f,
                "partition function overflow at ({}, {}) = {:e}; retry with a larger pf_scale",
                i, j, value
            ),
            PfError::Underflow => write!(
                f,
                "partition function underflowed at the root cell; retry with a smaller pf_scale"
            ),
            PfError::ConstraintInfeasible => {
                write!(f, "hard constraints exclude every structure (Z = 0)")
            }
            PfError::SampleFailure { region } => {
                write!(f, "stochastic traceback failed to settle a decomposition in {}", region)
            }
            PfError::Cancelled => write!(f, "computation was cancelled"),
        }
    }
}

impl std::error::Error for PfError {}
