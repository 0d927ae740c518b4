use std::collections::HashMap;

use ff_energy::{BCOUNT, PCOUNT};

/// Thermodynamic parameter tables, in ViennaRNA's convention of
/// "deci-kcal/mol" integers (`10 * kcal/mol`, so values round-trip
/// without floating point in the parameter file itself).
///
/// Loading this from a parameter file is an external concern (§1,
/// Non-goals): callers build it however they like (file parser, embedded
/// constants, a test fixture) and hand it to [`crate::context::FoldContext`]
/// as a read-only, shareable bundle — the core only ever reads from it.
///
/// Indices into the pair-type dimension follow
/// `ff_energy::PairTypeRNA`'s own discriminant order; indices into a base
/// dimension follow `ff_energy::Base`'s.
#[derive(Debug, Clone)]
pub struct PfParamSet {
    pub hairpin: [i32; 31],
    pub bulge: [i32; 31],
    pub interior: [i32; 31],

    pub stack: [[i32; PCOUNT]; PCOUNT],

    pub mismatch_hairpin: [[[i32; BCOUNT]; BCOUNT]; PCOUNT],
    pub mismatch_interior: [[[i32; BCOUNT]; BCOUNT]; PCOUNT],
    pub mismatch_interior_1n: [[[i32; BCOUNT]; BCOUNT]; PCOUNT],
    pub mismatch_interior_23: [[[i32; BCOUNT]; BCOUNT]; PCOUNT],
    pub mismatch_multi: [[[i32; BCOUNT]; BCOUNT]; PCOUNT],
    pub mismatch_exterior: [[[i32; BCOUNT]; BCOUNT]; PCOUNT],

    pub dangle5: [[i32; BCOUNT]; PCOUNT],
    pub dangle3: [[i32; BCOUNT]; PCOUNT],

    pub int11: Box<[[[[i32; BCOUNT]; BCOUNT]; PCOUNT]; PCOUNT]>,
    pub int21: Box<[[[[[i32; BCOUNT]; BCOUNT]; BCOUNT]; PCOUNT]; PCOUNT]>,
    pub int22: Box<[[[[[[i32; BCOUNT]; BCOUNT]; BCOUNT]; BCOUNT]; PCOUNT]; PCOUNT]>,

    /// Per-unpaired-base multibranch energy (usually 0).
    pub ml_base: i32,
    /// Charged once per multibranch loop closure.
    pub ml_closing: i32,
    /// Charged once per stem inside a multibranch loop.
    pub ml_intern: i32,
    /// Per-unit-of-asymmetry "ninio" penalty for generic internal loops.
    pub ninio_m: i32,
    /// Cap on the total ninio penalty.
    pub ninio_max: i32,
    /// Terminal AU/GU penalty.
    pub term_au: i32,
    /// Logarithmic loop-energy extrapolation constant for hairpins/
    /// interior loops longer than the tabulated range.
    pub lxc: f64,

    /// Sequence-specific tetraloop/triloop/hexaloop bonuses, keyed by the
    /// literal loop substring (closing pair inclusive).
    pub tetraloops: HashMap<String, i32>,
    pub triloops: HashMap<String, i32>,
    pub hexaloops: HashMap<String, i32>,
}

impl PfParamSet {
    /// All-zero tables; useful as a base for callers building a partial
    /// set programmatically (never as a substitute for real parameters).
    pub fn zeroed() -> Self {
        PfParamSet {
            hairpin: [0; 31],
            bulge: [0; 31],
            interior: [0; 31],
            stack: [[0; PCOUNT]; PCOUNT],
            mismatch_hairpin: [[[0; BCOUNT]; BCOUNT]; PCOUNT],
            mismatch_interior: [[[0; BCOUNT]; BCOUNT]; PCOUNT],
            mismatch_interior_1n: [[[0; BCOUNT]; BCOUNT]; PCOUNT],
            mismatch_interior_23: [[[0; BCOUNT]; BCOUNT]; PCOUNT],
            mismatch_multi: [[[0; BCOUNT]; BCOUNT]; PCOUNT],
            mismatch_exterior: [[[0; BCOUNT]; BCOUNT]; PCOUNT],
            dangle5: [[0; BCOUNT]; PCOUNT],
            dangle3: [[0; BCOUNT]; PCOUNT],
            int11: Box::new([[[[0; BCOUNT]; BCOUNT]; PCOUNT]; PCOUNT]),
            int21: Box::new([[[[[0; BCOUNT]; BCOUNT]; BCOUNT]; PCOUNT]; PCOUNT]),
            int22: Box::new([[[[[[0; BCOUNT]; BCOUNT]; BCOUNT]; BCOUNT]; PCOUNT]; PCOUNT]),
            ml_base: 0,
            ml_closing: 0,
            ml_intern: 0,
            ninio_m: 0,
            ninio_max: 300,
            term_au: 0,
            lxc: 107.856,
            tetraloops: HashMap::new(),
            triloops: HashMap::new(),
            hexaloops: HashMap::new(),
        }
    }
}
