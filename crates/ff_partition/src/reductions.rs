use ff_structure::PairTable;

use crate::energy_oracle::EnergyOracle;
use crate::model::ModelDetails;
use crate::sequence::EncodedSequence;
use crate::tables::ForwardTables;

/// Ensemble free energy, `-RT * ln(Z)`, undoing the per-base rescaling
/// folded into `q[1,n]` by `ForwardEngine`. Returned in kcal/mol.
///
/// `model.rt_kcal()` is already RT expressed in kcal/mol (the `/1000`
/// against the cal/mol gas constant happens inside it), so no further
/// unit conversion belongs here.
pub fn ensemble_free_energy(tables: &ForwardTables, model: &ModelDetails) -> f64 {
    let n = tables.n;
    if tables.qo <= 0.0 || n == 0 {
        return 0.0;
    }
    let log_scale: f64 = (1..=n).map(|_| tables.scale[1].ln()).sum();
    -(tables.qo.ln() - log_scale) * model.rt_kcal()
}

/// The maximum-expected-accuracy-free centroid structure: for each
/// position, pair `i` with the `j` maximizing `P(i, j)` among partners
/// that together form a valid nested structure, built greedily by
/// decreasing probability (ties broken by the lower `i`). This is the
/// same greedy construction used to report representative structures
/// from a base-pair probability matrix without a separate MEA solver.
pub fn centroid(tables: &ForwardTables) -> PairTable {
    let n = tables.n;
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for i in 1..=n {
        for j in (i + 1)..=n {
            let p = *tables.probs.get(i, j);
            if p > 0.5 {
                pairs.push((i, j, p));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut pt = PairTable(vec![None; n + 1]);
    for (i, j, _) in pairs {
        if pt[i].is_some() || pt[j].is_some() {
            continue;
        }
        if !pt.is_well_formed(1, n + 1) {
            continue;
        }
        pt[i] = Some(j as ff_structure::NAIDX);
        pt[j] = Some(i as ff_structure::NAIDX);
        if !pt.is_well_formed(1, n + 1) {
            pt[i] = None;
            pt[j] = None;
        }
    }
    pt
}

/// Shannon entropy of the unpaired/paired marginal at each position,
/// `S[i] = -sum_j P(i,j) ln P(i,j) - P(unpaired) ln P(unpaired)`, in bits.
/// A common per-position confidence readout alongside `probs` itself.
pub fn positional_entropy(tables: &ForwardTables) -> Vec<f64> {
    let n = tables.n;
    let mut entropy = vec![0.0; n + 1];
    for i in 1..=n {
        let mut paired_mass = 0.0;
        let mut acc = 0.0;
        for j in 1..=n {
            let p = if i <= j { *tables.probs.get(i, j) } else { *tables.probs.get(j, i) };
            if p > 0.0 {
                acc -= p * p.log2();
                paired_mass += p;
            }
        }
        let unpaired = (1.0 - paired_mass).max(0.0);
        if unpaired > 0.0 {
            acc -= unpaired * unpaired.log2();
        }
        entropy[i] = acc;
    }
    entropy
}

/// The centroid symbol at column `i`: one of `.`, `(`, `)`, `{`, `}`, `|`,
/// `,`, `:`, chosen from `x0 = P(unpaired)`, `x1 = Σ P(i, k)` over `k > i`
/// (`i` the upstream/5' partner), `x2 = Σ P(k, i)` over `k < i` (`i` the
/// downstream/3' partner). A richer-than-dot-bracket summary of the
/// ensemble at a single column, for positions where no single pairing
/// dominates enough to call it `(` or `)` outright.
pub fn centroid_symbol(tables: &ForwardTables, i: usize) -> char {
    let n = tables.n;
    let mut x1 = 0.0;
    for k in (i + 1)..=n {
        x1 += *tables.probs.get(i, k);
    }
    let mut x2 = 0.0;
    for k in 1..i {
        x2 += *tables.probs.get(k, i);
    }
    let x0 = (1.0 - x1 - x2).max(0.0);

    if x0 > 0.667 {
        '.'
    } else if x1 > 0.667 {
        '('
    } else if x2 > 0.667 {
        ')'
    } else if x1 + x2 > x0 {
        if x1 + x2 <= 0.0 {
            '|'
        } else if x1 / (x1 + x2) > 0.667 {
            '{'
        } else if x2 / (x1 + x2) > 0.667 {
            '}'
        } else {
            '|'
        }
    } else if x0 > x1 + x2 {
        ','
    } else {
        ':'
    }
}

/// [`centroid_symbol`] over every column, as a single string the same
/// length as the sequence.
pub fn centroid_symbol_string(tables: &ForwardTables) -> String {
    (1..=tables.n).map(|i| centroid_symbol(tables, i)).collect()
}

/// Expected base-pair distance between two draws from the ensemble,
/// `2 * sum_{i<j} P(i,j) * (1 - P(i,j))`.
pub fn mean_bp_distance(tables: &ForwardTables) -> f64 {
    let n = tables.n;
    let mut acc = 0.0;
    for i in 1..=n {
        for j in (i + 1)..=n {
            let p = *tables.probs.get(i, j);
            acc += p * (1.0 - p);
        }
    }
    2.0 * acc
}

/// Conditional probability that `(i+1, j-1)` is also paired given `(i, j)`
/// is paired -- a helical-stacking readout derived directly from `qb`,
/// not stored separately by the forward pass.
pub fn stack_probabilities(tables: &ForwardTables, seq: &EncodedSequence, oracle: &EnergyOracle) -> Vec<(usize, usize, f64)> {
    let n = tables.n;
    let mut out = Vec::new();
    for i in 1..n {
        for j in (i + 2)..=n {
            let qbij = *tables.qb.get(i, j);
            if qbij < f64::MIN_POSITIVE {
                continue;
            }
            let qbinner = *tables.qb.get(i + 1, j - 1);
            if qbinner < f64::MIN_POSITIVE {
                continue;
            }
            let probij = *tables.probs.get(i, j);
            if probij <= 0.0 {
                continue;
            }
            let w = oracle.interior(seq, i, j, i + 1, j - 1);
            let scale2 = tables.scale.get(2).copied().unwrap_or(1.0);
            let p_stack = probij * (qbinner / qbij) * w * scale2;
            out.push((i, j, p_stack));
        }
    }
    out
}

/// One entry of a [`plist`] export: a base pair (or gquad cell) with its
/// ensemble probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlistEntry {
    pub i: usize,
    pub j: usize,
    pub p: f64,
    pub is_gquad: bool,
}

/// Every `(i, j)` with `P(i, j) >= cutoff`, sorted by decreasing
/// probability, flagging which entries are resolved from the optional
/// G-quadruplex table rather than an ordinary base pair.
pub fn plist(tables: &ForwardTables, cutoff: f64) -> Vec<PlistEntry> {
    let n = tables.n;
    let mut out = Vec::new();
    for i in 1..=n {
        for j in i..=n {
            let p = *tables.probs.get(i, j);
            if p < cutoff {
                continue;
            }
            let is_gquad = tables.g.as_ref().map(|g| *g.get(i, j) > 0.0).unwrap_or(false);
            out.push(PlistEntry { i, j, p, is_gquad });
        }
    }
    out.sort_by(|a, b| b.p.partial_cmp(&a.p).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{HardConstraints, SoftConstraints};
    use crate::outside::fold;
    use crate::scaler::Scaler;
    use crate::sequence::EncodedSequence;
    use crate::demo::placeholder_params;

    #[test]
    fn free_energy_is_finite_and_non_positive_direction_sane() {
        let seq = EncodedSequence::new("GGGAAACCC").unwrap();
        let params = placeholder_params();
        let model = ModelDetails::default();
        let hc = HardConstraints::unconstrained(seq.len());
        let sc = SoftConstraints::default();
        let scaler = Scaler::prepare(seq.len(), &model, 1.0);
        let tables = fold(&seq, &params, &model, &hc, &sc, scaler.scale, scaler.expmlbase, false).unwrap();
        let f = ensemble_free_energy(&tables, &model);
        assert!(f.is_finite());
    }

    #[test]
    fn centroid_is_well_formed() {
        let seq = EncodedSequence::new("GGGAAACCC").unwrap();
        let params = placeholder_params();
        let model = ModelDetails::default();
        let hc = HardConstraints::unconstrained(seq.len());
        let sc = SoftConstraints::default();
        let scaler = Scaler::prepare(seq.len(), &model, 1.0);
        let tables = fold(&seq, &params, &model, &hc, &sc, scaler.scale, scaler.expmlbase, false).unwrap();
        let pt = centroid(&tables);
        assert!(pt.is_well_formed(1, seq.len()));
    }

    #[test]
    fn centroid_symbol_string_is_one_char_per_column() {
        let seq = EncodedSequence::new("GGGAAACCC").unwrap();
        let params = placeholder_params();
        let model = ModelDetails::default();
        let hc = HardConstraints::unconstrained(seq.len());
        let sc = SoftConstraints::default();
        let scaler = Scaler::prepare(seq.len(), &model, 1.0);
        let tables = fold(&seq, &params, &model, &hc, &sc, scaler.scale, scaler.expmlbase, false).unwrap();
        let s = centroid_symbol_string(&tables);
        assert_eq!(s.chars().count(), seq.len());
        for c in s.chars() {
            assert!(matches!(c, '.' | '(' | ')' | '{' | '}' | '|' | ',' | ':'));
        }
    }

    #[test]
    fn mean_bp_distance_is_nonnegative() {
        let seq = EncodedSequence::new("GGGAAACCC").unwrap();
        let params = placeholder_params();
        let model = ModelDetails::default();
        let hc = HardConstraints::unconstrained(seq.len());
        let sc = SoftConstraints::default();
        let scaler = Scaler::prepare(seq.len(), &model, 1.0);
        let tables = fold(&seq, &params, &model, &hc, &sc, scaler.scale, scaler.expmlbase, false).unwrap();
        assert!(mean_bp_distance(&tables) >= 0.0);
    }

    #[test]
    fn stack_probabilities_are_bounded() {
        let seq = EncodedSequence::new("GGGGAAACCCC").unwrap();
        let params = placeholder_params();
        let model = ModelDetails::default();
        let hc = HardConstraints::unconstrained(seq.len());
        let sc = SoftConstraints::default();
        let scaler = Scaler::prepare(seq.len(), &model, 1.0);
        let tables = fold(&seq, &params, &model, &hc, &sc, scaler.scale, scaler.expmlbase, false).unwrap();
        let oracle = EnergyOracle::new(&params, &model);
        for (_, _, p) in stack_probabilities(&tables, &seq, &oracle) {
            assert!(p >= -1e-6 && p <= 1.0 + 1e-3);
        }
    }

    #[test]
    fn plist_is_sorted_descending_and_above_cutoff() {
        let seq = EncodedSequence::new("GGGGAAACCCC").unwrap();
        let params = placeholder_params();
        let model = ModelDetails::default();
        let hc = HardConstraints::unconstrained(seq.len());
        let sc = SoftConstraints::default();
        let scaler = Scaler::prepare(seq.len(), &model, 1.0);
        let tables = fold(&seq, &params, &model, &hc, &sc, scaler.scale, scaler.expmlbase, false).unwrap();
        let entries = plist(&tables, 1e-6);
        for w in entries.windows(2) {
            assert!(w[0].p >= w[1].p);
        }
        for e in &entries {
            assert!(e.p >= 1e-6);
            assert!(!e.is_gquad);
        }
    }
}
