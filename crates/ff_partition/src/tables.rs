use crate::triangular::TriMatrix;

/// All forward and outside quantities for one fold. `q`/`qb`/`qm`/`qm1` are
/// the four forward tables from spec.md §4.4; `probs` is the outside
/// result from §4.5 and stays all-zero until [`crate::outside::OutsideEngine`]
/// runs. `qm2` is a plain vector (not triangular) because it is only ever
/// indexed by a single split point, matching the original's own
/// `qm2[n+1]`-shaped array.
#[derive(Debug, Clone)]
pub struct ForwardTables {
    pub n: usize,

    /// Partition function restricted to the exterior loop over `[i, j]`.
    pub q: TriMatrix<f64>,
    /// Partition function restricted to structures in which `(i, j)` pairs.
    pub qb: TriMatrix<f64>,
    /// Partition function restricted to `[i, j]` viewed from inside an
    /// enclosing multibranch loop, at least one branch.
    pub qm: TriMatrix<f64>,
    /// Partition function restricted to `[i, j]` viewed from inside an
    /// enclosing multibranch loop, exactly one branch starting at `i`.
    pub qm1: TriMatrix<f64>,
    /// `qm2[k]`: partition function for two-or-more multibranch stems
    /// split at `k`, used directly by multibranch closure and by circular
    /// sampling/backtracking.
    pub qm2: Vec<f64>,

    /// Optional externally supplied G-quadruplex partition function,
    /// `g[i,j]`, consumed as-is wherever a gquad alternative is mixed in.
    /// `None` means "no G-quadruplex support in this fold".
    pub g: Option<TriMatrix<f64>>,

    /// Per-length rescaling factors, `scale[u] = sigma^-u`.
    pub scale: Vec<f64>,
    /// Per-length rescaling folded with the Boltzmann weight of `u`
    /// unpaired multibranch bases.
    pub expmlbase: Vec<f64>,

    /// Whole-sequence exterior-loop partition function, `q[1,n]` after
    /// rescaling is undone — set once `ForwardEngine::run` completes.
    pub qo: f64,
    /// Circular-fold hairpin-loop contribution to `qo`.
    pub qho: f64,
    /// Circular-fold interior-loop contribution to `qo`.
    pub qio: f64,
    /// Circular-fold multibranch-loop contribution to `qo`.
    pub qmo: f64,

    /// Base-pair probability matrix, `probs[i,j] = P(i pairs with j)`.
    pub probs: TriMatrix<f64>,
}

impl ForwardTables {
    pub fn new(n: usize, scale: Vec<f64>, expmlbase: Vec<f64>, with_gquad: bool) -> Self {
        ForwardTables {
            n,
            q: TriMatrix::filled(n, 0.0),
            qb: TriMatrix::filled(n, 0.0),
            qm: TriMatrix::filled(n, 0.0),
            qm1: TriMatrix::filled(n, 0.0),
            qm2: vec![0.0; n + 2],
            g: if with_gquad { Some(TriMatrix::filled(n, 0.0)) } else { None },
            scale,
            expmlbase,
            qo: 0.0,
            qho: 0.0,
            qio: 0.0,
            qmo: 0.0,
            probs: TriMatrix::filled(n, 0.0),
        }
    }
}
