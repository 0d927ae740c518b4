/// Gas constant in cal/(K*mol), the same constant ViennaRNA's parameter
/// conversion uses.
pub const GASCONST: f64 = 1.98717;

/// Kelvin offset for 0 degrees Celsius.
pub const K0: f64 = 273.15;

/// Which cell the ensemble free energy and sampler treat as the root.
/// Mirrors `backtrack_type` in §6 (`'F'`, `'C'`, `'M'`); the circular case
/// is not a separate letter here because it is implied by
/// [`ModelDetails::circ`] together with `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktrackType {
    /// `q[1,n]`, or `qo` when [`ModelDetails::circ`] is set.
    Full,
    /// `qb[1,n]`: assume the full sequence is closed by a single pair.
    Pair,
    /// `qm[1,n]`: assume the full sequence is itself a multibranch segment.
    Ml,
}

/// The root cell actually selected once `circ` is folded in; used by
/// [`crate::reductions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootCell {
    Full,
    Circ,
    Pair,
    Ml,
}

impl BacktrackType {
    pub fn root(self, circ: bool) -> RootCell {
        match (self, circ) {
            (BacktrackType::Full, true) => RootCell::Circ,
            (BacktrackType::Full, false) => RootCell::Full,
            (BacktrackType::Pair, _) => RootCell::Pair,
            (BacktrackType::Ml, _) => RootCell::Ml,
        }
    }
}

/// Model settings, constructed by the caller the way `model_detailsT` is
/// populated in the original: plain field assignment, no config-file
/// format (loading one is an external concern, out of scope for the core).
#[derive(Debug, Clone)]
pub struct ModelDetails {
    /// Degrees Celsius; 37.0 is the Turner-parameter reference temperature.
    pub temperature: f64,
    /// 0, 1, 2 or 3 — see the GLOSSARY.
    pub dangles: u8,
    /// Forbid lonely (unstacked) pairs.
    pub no_lp: bool,
    /// Forbid G-U pairs from forming at all.
    pub no_gu: bool,
    /// Forbid a G-U pair from closing a hairpin/interior/multibranch loop.
    pub no_gu_closure: bool,
    /// Fold in optional G-quadruplex contributions via an externally
    /// supplied `G` table (never computed by this crate).
    pub gquad: bool,
    /// Apply tetra/tri/hexaloop sequence-specific hairpin bonuses.
    pub special_hp: bool,
    /// Treat the sequence as circular.
    pub circ: bool,
    /// 0 disables the limit; otherwise the maximum `j - i` span allowed
    /// to pair.
    pub max_bp_span: usize,
    /// -1.0 requests automatic scaling (see [`crate::scaler`]).
    pub pf_scale: f64,
    /// Multiplies 1/RT before exponentiating; 1.0 is the physical value.
    pub beta_scale: f64,
    pub backtrack_type: BacktrackType,
}

impl Default for ModelDetails {
    fn default() -> Self {
        ModelDetails {
            temperature: 37.0,
            dangles: 2,
            no_lp: false,
            no_gu: false,
            no_gu_closure: false,
            gquad: false,
            special_hp: true,
            circ: false,
            max_bp_span: 0,
            pf_scale: -1.0,
            beta_scale: 1.0,
            backtrack_type: BacktrackType::Full,
        }
    }
}

impl ModelDetails {
    /// RT in kcal/mol at the configured temperature, already including
    /// `beta_scale`. `beta_scale` multiplies `1/RT` (see §6), so it
    /// divides `RT` here rather than multiplying it.
    pub fn rt_kcal(&self) -> f64 {
        (GASCONST / 1000.0) * (K0 + self.temperature) / self.beta_scale
    }

    /// RT expressed in the same "deci-kcal" unit the energy tables use
    /// (ViennaRNA's convention of storing energies as `10 * kcal/mol`).
    pub fn rt_decikcal(&self) -> f64 {
        self.rt_kcal() * 10.0
    }

    /// RT in cal/mol -- the unit the original implementation's empirical
    /// `pf_scale` auto-selection estimate (`-185 + (T-37)*7.27`, itself in
    /// cal/mol) is divided by. Distinct from [`Self::rt_decikcal`], which
    /// is cal/mol scaled down by 100x for the deci-kcal energy tables.
    pub fn rt_cal_per_mol(&self) -> f64 {
        self.rt_kcal() * 1000.0
    }

    /// Minimum number of unpaired bases in a hairpin loop.
    pub fn turn(&self) -> usize {
        3
    }

    /// Upper bound on unpaired bases summed over an interior/bulge loop.
    pub fn maxloop(&self) -> usize {
        30
    }
}
