//! # fuzzyfold
//!
//! The main entry point for the fuzzyfold nucleic acid folding package, with
//! interfaces to multiple crates that are organized as a workspace. At this
//! level, you can also find argument parsers for the binaries shipped with the
//! fuzzyfold package.
//!
//! This crate re-exports the main functionality from its submodules.

/// Exposing fuzzyfold::structure. A collection of practical data structures
/// for RNA structure representations.
pub mod structure {
    pub use ::ff_structure::*;
}

/// Exposing fuzzyfold::energy. Handling of nucleotide sequences and pair
/// types.
pub mod energy {
    pub use ::ff_energy::*;
}

/// Exposing fuzzyfold::partition. The McCaskill-style partition function
/// core: Z, base-pair probabilities, ensemble free energy, and stochastic
/// sampling.
pub mod partition {
    pub use ::ff_partition::*;
}

/// Various flavors of handling sequence/structure input.
pub mod input_parsers;

/// Exposing the currently supported parameters of fuzzyfold's partition
/// function model.
pub mod model_parsers;
