use crate::error::PfError;

/// Bitflags describing which loop contexts a position/pair is allowed to
/// participate in. Mirrors the original's `IN_*_LOOP` decomposition masks
/// bit-for-bit so constraint strings translate without reinterpretation.
pub mod decomp {
    pub const IN_EXT_LOOP: u8 = 1 << 0;
    pub const IN_HP_LOOP: u8 = 1 << 1;
    pub const IN_INT_LOOP: u8 = 1 << 2;
    pub const IN_INT_LOOP_ENC: u8 = 1 << 3;
    pub const IN_MB_LOOP: u8 = 1 << 4;
    pub const IN_MB_LOOP_ENC: u8 = 1 << 5;

    pub const ALL: u8 = IN_EXT_LOOP | IN_HP_LOOP | IN_INT_LOOP | IN_INT_LOOP_ENC | IN_MB_LOOP | IN_MB_LOOP_ENC;
}

/// Which decomposition step a soft-constraint callback is being asked to
/// score, so a single callback can disambiguate call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompKind {
    ExtLoop,
    HairpinLoop,
    InteriorLoop,
    MultiLoop,
    MultiLoopClosing,
}

/// Hard constraints: per-pair decomposition gating and per-position
/// "must be unpaired in context X" windows. All gating is conjunctive with
/// the base-pairing rules already enforced by [`crate::energy_oracle`] —
/// a hard constraint can only ever forbid, never permit, an otherwise
/// impossible pair.
#[derive(Debug, Clone)]
pub struct HardConstraints {
    n: usize,
    /// `decomp[(i,j)]` bitmask of [`decomp`] flags; absent pairs behave as
    /// [`decomp::ALL`].
    pub decomp: std::collections::HashMap<(usize, usize), u8>,
    /// Positions forced unpaired in the exterior loop.
    pub up_ext: Vec<bool>,
    /// Positions forced unpaired inside a hairpin loop.
    pub up_hp: Vec<bool>,
    /// Positions forced unpaired inside an interior loop.
    pub up_int: Vec<bool>,
    /// Positions forced unpaired inside a multibranch loop.
    pub up_ml: Vec<bool>,
}

impl HardConstraints {
    /// The zero-cost default: every decomposition is permitted everywhere,
    /// so [`crate::forward::ForwardEngine::run`] never needs to special-
    /// case an absent constraint set.
    pub fn unconstrained(n: usize) -> Self {
        HardConstraints {
            n,
            decomp: std::collections::HashMap::new(),
            up_ext: vec![false; n + 1],
            up_hp: vec![false; n + 1],
            up_int: vec![false; n + 1],
            up_ml: vec![false; n + 1],
        }
    }

    #[inline]
    pub fn allows(&self, i: usize, j: usize, flag: u8) -> bool {
        let mask = self.decomp.get(&(i, j)).copied().unwrap_or(decomp::ALL);
        mask & flag != 0
    }

    #[inline]
    pub fn is_unpaired_forced(&self, i: usize) -> bool {
        self.up_ext[i] || self.up_hp[i] || self.up_int[i] || self.up_ml[i]
    }

    /// Parses a minimal hard-constraint string the same length as the
    /// sequence: `.` (unconstrained), `x` (forced unpaired in every
    /// context). Any other character is rejected rather than silently
    /// ignored.
    pub fn from_str(n: usize, s: &str) -> Result<Self, PfError> {
        if s.chars().count() != n {
            return Err(PfError::InvalidInput {
                why: format!("hard constraint string length {} does not match sequence length {}", s.chars().count(), n),
            });
        }
        let mut hc = Self::unconstrained(n);
        for (idx, c) in s.chars().enumerate() {
            let i = idx + 1;
            match c {
                '.' => {}
                'x' => {
                    hc.up_ext[i] = true;
                    hc.up_hp[i] = true;
                    hc.up_int[i] = true;
                    hc.up_ml[i] = true;
                }
                other => {
                    return Err(PfError::InvalidInput {
                        why: format!("unrecognized hard constraint token '{}' at position {}", other, i),
                    })
                }
            }
        }
        Ok(hc)
    }
}

/// Soft constraints: multiplicative Boltzmann-factor bonuses layered on
/// top of the thermodynamic weights, plus an optional user callback for
/// bonuses that don't fit the position/pair/stack shapes below. Every
/// accessor defaults to a neutral `1.0` when the corresponding table (or
/// the whole struct) is absent, so callers can mix partial constraints
/// freely.
#[derive(Default)]
pub struct SoftConstraints {
    /// Per-position unpaired bonus, indexed like [`HardConstraints::up_ext`].
    pub bf_up: Option<Vec<f64>>,
    /// Per-pair `(i, j)` bonus.
    pub bf_bp: Option<std::collections::HashMap<(usize, usize), f64>>,
    /// Per-stacked-pair `(i, j, p, q)` bonus, `(p, q)` nested immediately
    /// inside `(i, j)`.
    pub bf_stack: Option<std::collections::HashMap<(usize, usize, usize, usize), f64>>,
    /// Generic callback for bonuses keyed on decomposition context rather
    /// than position; receives the kind of decomposition and the bounding
    /// indices of the loop being scored.
    #[allow(clippy::type_complexity)]
    pub callback: Option<std::sync::Arc<dyn Fn(DecompKind, usize, usize) -> f64 + Send + Sync>>,
}

impl SoftConstraints {
    #[inline]
    pub fn sc_up(&self, i: usize) -> f64 {
        self.bf_up.as_ref().map(|v| v[i]).unwrap_or(1.0)
    }

    /// Product of [`Self::sc_up`] over the `len`-base run starting at
    /// `start`, for loop contexts (hairpin, interior) that consume several
    /// unpaired bases in a single decomposition step rather than one at a
    /// time.
    #[inline]
    pub fn sc_up_run(&self, start: usize, len: usize) -> f64 {
        match &self.bf_up {
            None => 1.0,
            Some(v) => (start..start + len).map(|p| v.get(p).copied().unwrap_or(1.0)).product(),
        }
    }

    #[inline]
    pub fn sc_bp(&self, i: usize, j: usize) -> f64 {
        self.bf_bp.as_ref().and_then(|m| m.get(&(i, j)).copied()).unwrap_or(1.0)
    }

    #[inline]
    pub fn sc_stack(&self, i: usize, j: usize, p: usize, q: usize) -> f64 {
        self.bf_stack.as_ref().and_then(|m| m.get(&(i, j, p, q)).copied()).unwrap_or(1.0)
    }

    #[inline]
    pub fn sc_f(&self, kind: DecompKind, i: usize, j: usize) -> f64 {
        self.callback.as_ref().map(|f| f(kind, i, j)).unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_allows_everything() {
        let hc = HardConstraints::unconstrained(5);
        assert!(hc.allows(1, 5, decomp::IN_HP_LOOP));
        assert!(!hc.is_unpaired_forced(3));
    }

    #[test]
    fn from_str_forces_unpaired() {
        let hc = HardConstraints::from_str(4, "x...").unwrap();
        assert!(hc.is_unpaired_forced(1));
        assert!(!hc.is_unpaired_forced(2));
    }

    #[test]
    fn from_str_rejects_bad_length() {
        assert!(HardConstraints::from_str(3, "..").is_err());
    }

    #[test]
    fn soft_constraints_default_to_neutral() {
        let sc = SoftConstraints::default();
        assert_eq!(sc.sc_up(1), 1.0);
        assert_eq!(sc.sc_bp(1, 2), 1.0);
        assert_eq!(sc.sc_f(DecompKind::HairpinLoop, 1, 2), 1.0);
    }
}
