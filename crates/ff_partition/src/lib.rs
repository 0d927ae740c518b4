//! McCaskill-style partition-function core: the equilibrium ensemble
//! partition function `Z`, base-pair probabilities, ensemble free energy,
//! and stochastic Boltzmann sampling for a single nucleic-acid sequence.
//!
//! Parameter-file loading, MFE folding, and structure/plot rendering are
//! deliberately out of scope here — see [`params::PfParamSet`] and
//! [`context::FoldContext`] for the boundary this crate draws.

pub mod constraints;
pub mod context;
pub mod demo;
pub mod diagnostics;
pub mod energy_oracle;
pub mod error;
pub mod forward;
pub mod model;
pub mod outside;
pub mod params;
pub mod reductions;
pub mod sampler;
pub mod scaler;
pub mod sequence;
pub mod tables;
pub mod triangular;

#[cfg(test)]
mod testfixtures;

pub use constraints::{DecompKind, HardConstraints, SoftConstraints};
pub use context::{CancelToken, FoldContext};
pub use diagnostics::{DiagnosticSink, LogDiagnosticSink, NullDiagnosticSink};
pub use energy_oracle::EnergyOracle;
pub use error::PfError;
pub use forward::ForwardEngine;
pub use model::{BacktrackType, ModelDetails, RootCell};
pub use outside::OutsideEngine;
pub use params::PfParamSet;
pub use sampler::Sampler;
pub use scaler::Scaler;
pub use sequence::EncodedSequence;
pub use tables::ForwardTables;
pub use triangular::{TriMatrix, Triangular};
