use rand::Rng;

use ff_structure::PairTable;

use crate::constraints::{decomp, DecompKind, HardConstraints, SoftConstraints};
use crate::energy_oracle::EnergyOracle;
use crate::error::PfError;
use crate::model::ModelDetails;
use crate::params::PfParamSet;
use crate::sequence::EncodedSequence;
use crate::tables::ForwardTables;

const MAXLOOP: usize = 30;

/// Draws structures from the Boltzmann ensemble by stochastic traceback
/// through an already-filled [`ForwardTables`]: at every decomposition
/// point, each alternative is weighted by its share of the cell's total
/// partition function and one alternative is drawn at random, so the
/// marginal distribution over complete structures matches the Boltzmann
/// distribution by construction.
pub struct Sampler<'a> {
    pub seq: &'a EncodedSequence,
    pub model: &'a ModelDetails,
    pub oracle: EnergyOracle<'a>,
    pub hc: &'a HardConstraints,
    pub sc: &'a SoftConstraints,
}

impl<'a> Sampler<'a> {
    pub fn new(seq: &'a EncodedSequence, params: &'a PfParamSet, model: &'a ModelDetails, hc: &'a HardConstraints, sc: &'a SoftConstraints) -> Self {
        Sampler { seq, model, oracle: EnergyOracle::new(params, model), hc, sc }
    }

    /// Draws one structure, returning its pair table. `tables` must come
    /// from a completed [`crate::forward::ForwardEngine::run`] (the
    /// outside pass is not needed for sampling).
    pub fn sample<R: Rng + ?Sized>(&self, tables: &ForwardTables, rng: &mut R) -> Result<PairTable, PfError> {
        let n = tables.n;
        let mut pt = PairTable(vec![None; n + 1]);
        if self.model.circ {
            self.sample_circular(tables, &mut pt, rng)?;
        } else {
            self.sample_exterior(tables, 1, n, &mut pt, rng)?;
        }
        Ok(pt)
    }

    /// Draws a structure for a circular fold: the whole-sequence partition
    /// function `qo` splits into the open chain (no pairs at all), the
    /// exterior hairpin (a single pair crossing no other pair, loop content
    /// wrapping the seam), the exterior interior loop (two disjoint pairs
    /// wrapping the seam), and the exterior multibranch split, mirroring
    /// `ForwardEngine::finish_circular`'s own three sums term for term so
    /// the sampled marginal matches `qo`'s decomposition by construction.
    fn sample_circular<R: Rng + ?Sized>(&self, tables: &ForwardTables, pt: &mut PairTable, rng: &mut R) -> Result<(), PfError> {
        let n = tables.n;
        let total = tables.qo;
        if total <= 0.0 {
            return Err(PfError::SampleFailure { region: "qo".to_string() });
        }
        let turn = self.model.turn();

        #[derive(Clone, Copy)]
        enum Branch {
            Open,
            Hairpin(usize, usize),
            Interior(usize, usize, usize, usize),
            MultiSplit(usize),
        }

        let mut candidates: Vec<(f64, Branch)> = Vec::new();
        let scale_n = tables.scale.get(n).copied().unwrap_or(0.0);
        candidates.push((scale_n, Branch::Open));

        for i in 1..=n {
            for j in i..=n {
                let qbij = Self::qb(tables, i, j);
                if qbij == 0.0 {
                    continue;
                }
                let outside_len = n - (j - i + 1);
                if outside_len >= turn {
                    let scale = tables.scale.get(outside_len).copied().unwrap_or(0.0);
                    let w = qbij * self.oracle.wraparound_hairpin(self.seq, i, j) * scale;
                    if w > 0.0 {
                        candidates.push((w, Branch::Hairpin(i, j)));
                    }
                }
                for k in (j + 1)..=n {
                    let u1 = k - j - 1;
                    if u1 > MAXLOOP {
                        break;
                    }
                    for l in k..=n {
                        let qbkl = Self::qb(tables, k, l);
                        if qbkl == 0.0 {
                            continue;
                        }
                        let u2 = (n - l) + (i - 1);
                        if u1 + u2 > MAXLOOP {
                            continue;
                        }
                        let scale = tables.scale.get(u1 + u2).copied().unwrap_or(0.0);
                        let w = qbij * qbkl * self.oracle.wraparound_interior(self.seq, i, j, k, l, u1, u2) * scale;
                        if w > 0.0 {
                            candidates.push((w, Branch::Interior(i, j, k, l)));
                        }
                    }
                }
            }
        }

        let closing_flat = crate::energy_oracle::boltz(self.oracle.params.ml_closing, self.oracle.rt);
        for k in 2..=n {
            let w = Self::qm(tables, 1, k - 1) * Self::qm1(tables, k, n) * closing_flat;
            if w > 0.0 {
                candidates.push((w, Branch::MultiSplit(k)));
            }
        }

        let weights: Vec<f64> = candidates.iter().map(|(w, _)| *w).collect();
        let idx = Self::weighted_choice(&weights, total, rng);
        match candidates[idx].1 {
            Branch::Open => Ok(()),
            Branch::Hairpin(i, j) => {
                pt[i] = Some(j as ff_structure::NAIDX);
                pt[j] = Some(i as ff_structure::NAIDX);
                self.sample_pair(tables, i, j, pt, rng)
            }
            Branch::Interior(i, j, k, l) => {
                pt[i] = Some(j as ff_structure::NAIDX);
                pt[j] = Some(i as ff_structure::NAIDX);
                pt[k] = Some(l as ff_structure::NAIDX);
                pt[l] = Some(k as ff_structure::NAIDX);
                self.sample_pair(tables, i, j, pt, rng)?;
                self.sample_pair(tables, k, l, pt, rng)
            }
            Branch::MultiSplit(k) => {
                self.sample_multi(tables, 1, k - 1, pt, rng, true)?;
                self.sample_qm1(tables, k, n, pt, rng)
            }
        }
    }

    fn qb(tables: &ForwardTables, i: usize, j: usize) -> f64 {
        if i >= j {
            0.0
        } else {
            *tables.qb.get(i, j)
        }
    }

    fn qm(tables: &ForwardTables, i: usize, j: usize) -> f64 {
        if i > j {
            0.0
        } else {
            *tables.qm.get(i, j)
        }
    }

    fn qm1(tables: &ForwardTables, i: usize, j: usize) -> f64 {
        if i > j {
            0.0
        } else {
            *tables.qm1.get(i, j)
        }
    }

    fn q(tables: &ForwardTables, i: usize, j: usize) -> f64 {
        if i > j {
            1.0
        } else {
            *tables.q.get(i, j)
        }
    }

    /// Picks an index `0..weights.len()` proportional to `weights`,
    /// falling back to the last index if floating point error leaves a
    /// residual draw past the final cumulative bucket.
    fn weighted_choice<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> usize {
        let mut x = rng.random::<f64>() * total;
        for (idx, w) in weights.iter().enumerate() {
            if x < *w {
                return idx;
            }
            x -= w;
        }
        weights.len() - 1
    }

    fn sample_exterior<R: Rng + ?Sized>(&self, tables: &ForwardTables, i: usize, j: usize, pt: &mut PairTable, rng: &mut R) -> Result<(), PfError> {
        if i > j {
            return Ok(());
        }
        let total = Self::q(tables, i, j);
        if total <= 0.0 {
            return Err(PfError::SampleFailure { region: format!("q[{},{}]", i, j) });
        }

        let mut candidates: Vec<(f64, usize)> = Vec::new();
        let skip_weight = Self::q(tables, i, j - 1) * tables.scale.get(1).copied().unwrap_or(1.0) * self.sc.sc_up(j);
        candidates.push((skip_weight, usize::MAX));
        for k in i..=j {
            let qbkj = Self::qb(tables, k, j);
            if qbkj == 0.0 {
                continue;
            }
            let pt_type = self.seq.pair_type(k, j);
            let five = if k > 1 { self.seq.base_or_boundary(k - 1) } else { ff_energy::Base::N };
            let three = self.seq.base_or_boundary(j + 1);
            let stem = self.oracle.ext_stem(pt_type, five, three);
            if stem == 0.0 {
                continue;
            }
            let w = Self::q(tables, i, k.saturating_sub(1)) * qbkj * stem * self.sc.sc_f(DecompKind::ExtLoop, k, j);
            candidates.push((w, k));
        }

        let weights: Vec<f64> = candidates.iter().map(|(w, _)| *w).collect();
        let chosen = Self::weighted_choice(&weights, total, rng);
        let (_, k) = candidates[chosen];

        if k == usize::MAX {
            self.sample_exterior(tables, i, j - 1, pt, rng)
        } else {
            pt[k] = Some(j as ff_structure::NAIDX);
            pt[j] = Some(k as ff_structure::NAIDX);
            self.sample_pair(tables, k, j, pt, rng)?;
            self.sample_exterior(tables, i, k.saturating_sub(1), pt, rng)
        }
    }

    /// `(i, j)` is already known to pair; decides hairpin vs interior vs
    /// multibranch by weight and recurses into the chosen branch.
    fn sample_pair<R: Rng + ?Sized>(&self, tables: &ForwardTables, i: usize, j: usize, pt: &mut PairTable, rng: &mut R) -> Result<(), PfError> {
        let total = Self::qb(tables, i, j);
        if total <= 0.0 {
            return Err(PfError::SampleFailure { region: format!("qb[{},{}]", i, j) });
        }
        let turn = self.model.turn();

        let mut branches: Vec<(f64, u8, usize, usize)> = Vec::new(); // (weight, kind, k, l)

        if j - i - 1 >= turn && self.hc.allows(i, j, decomp::IN_HP_LOOP) {
            let u = j - i - 1;
            let scale = tables.scale.get(u + 2).copied().unwrap_or(0.0);
            let sc_up = self.sc.sc_up_run(i + 1, u);
            let w = self.oracle.hairpin(self.seq, i, j) * scale * sc_up * self.sc.sc_bp(i, j) * self.sc.sc_f(DecompKind::HairpinLoop, i, j);
            branches.push((w, 0, 0, 0));
        }

        if self.hc.allows(i, j, decomp::IN_INT_LOOP) {
            let kmax = (j - 1).min(i + MAXLOOP + 1);
            for k in (i + 1)..=kmax {
                let u1 = k - i - 1;
                let remaining = MAXLOOP.saturating_sub(u1);
                let lmax = (j - 1).min(k + remaining + 1);
                for l in (k + 1)..=lmax {
                    let qbkl = Self::qb(tables, k, l);
                    if qbkl == 0.0 {
                        continue;
                    }
                    let u2 = j - l - 1;
                    if u1 + u2 > MAXLOOP {
                        continue;
                    }
                    let scale = tables.scale.get(u1 + u2 + 2).copied().unwrap_or(0.0);
                    let sc_up = self.sc.sc_up_run(i + 1, u1) * self.sc.sc_up_run(l + 1, u2);
                    let w = qbkl * self.oracle.interior(self.seq, i, j, k, l) * scale * sc_up * self.sc.sc_bp(i, j) * self.sc.sc_stack(i, j, k, l);
                    if w > 0.0 {
                        branches.push((w, 1, k, l));
                    }
                }
            }
        }

        if self.hc.allows(i, j, decomp::IN_MB_LOOP) && j - i - 1 >= 2 * turn + 2 {
            let pt_inner = EncodedSequence::rtype(self.seq.pair_type(i, j));
            let five = self.seq.base_or_boundary(j - 1);
            let three = self.seq.base_or_boundary(i + 1);
            let closing_w = self.oracle.ml_closing_weight(pt_inner, five, three);
            let scale2 = tables.scale.get(2).copied().unwrap_or(0.0);
            let closing_sc = self.sc.sc_bp(i, j) * self.sc.sc_f(DecompKind::MultiLoopClosing, i, j);
            for k in (i + 2)..(j - turn) {
                let w = closing_w * scale2 * closing_sc * Self::qm(tables, i + 1, k) * Self::qm1(tables, k + 1, j - 1);
                if w > 0.0 {
                    branches.push((w, 2, k, 0));
                }
            }
        }

        if branches.is_empty() {
            return Err(PfError::SampleFailure { region: format!("qb[{},{}] has no enumerable branch", i, j) });
        }

        let weights: Vec<f64> = branches.iter().map(|(w, ..)| *w).collect();
        let total_branches: f64 = weights.iter().sum();
        let idx = Self::weighted_choice(&weights, total_branches, rng);
        let (_, kind, k, l) = branches[idx];

        match kind {
            0 => Ok(()),
            1 => {
                pt[k] = Some(l as ff_structure::NAIDX);
                pt[l] = Some(k as ff_structure::NAIDX);
                self.sample_pair(tables, k, l, pt, rng)
            }
            _ => {
                self.sample_multi(tables, i + 1, k, pt, rng, true)?;
                self.sample_multi(tables, k + 1, j - 1, pt, rng, false)
            }
        }
    }

    /// Samples inside `qm[i,j]` (`is_qm`) or `qm1[i,j]` depending on
    /// `is_qm`: `true` samples a `qm`-style "one or more stems, optional
    /// leading unpaired run" interval, `false` samples a `qm1`-style
    /// "exactly one stem starting at `i`, optional trailing unpaired run"
    /// interval.
    fn sample_multi<R: Rng + ?Sized>(&self, tables: &ForwardTables, i: usize, j: usize, pt: &mut PairTable, rng: &mut R, is_qm: bool) -> Result<(), PfError> {
        if i > j {
            return Ok(());
        }
        if !is_qm {
            return self.sample_qm1(tables, i, j, pt, rng);
        }

        let total = Self::qm(tables, i, j);
        if total <= 0.0 {
            return Err(PfError::SampleFailure { region: format!("qm[{},{}]", i, j) });
        }

        let mut branches: Vec<(f64, u8, usize)> = Vec::new();
        branches.push((Self::qm1(tables, i, j), 0, 0));
        for k in (i + 1)..=j {
            let tail = tables.expmlbase.get(k - i).copied().unwrap_or(1.0);
            branches.push((tail * Self::qm1(tables, k, j), 1, k));
        }
        for k in i..j {
            branches.push((Self::qm(tables, i, k) * Self::qm1(tables, k + 1, j), 2, k));
        }

        let weights: Vec<f64> = branches.iter().map(|(w, ..)| *w).collect();
        let idx = Self::weighted_choice(&weights, total, rng);
        let (_, kind, k) = branches[idx];

        match kind {
            0 => self.sample_qm1(tables, i, j, pt, rng),
            1 => self.sample_qm1(tables, k, j, pt, rng),
            _ => {
                self.sample_multi(tables, i, k, pt, rng, true)?;
                self.sample_qm1(tables, k + 1, j, pt, rng)
            }
        }
    }

    fn sample_qm1<R: Rng + ?Sized>(&self, tables: &ForwardTables, i: usize, j: usize, pt: &mut PairTable, rng: &mut R) -> Result<(), PfError> {
        let total = Self::qm1(tables, i, j);
        if total <= 0.0 {
            return Err(PfError::SampleFailure { region: format!("qm1[{},{}]", i, j) });
        }
        let mut branches: Vec<(f64, usize)> = Vec::new();
        for k in i..=j {
            let qbik = Self::qb(tables, i, k);
            if qbik == 0.0 {
                continue;
            }
            let pt_type = self.seq.pair_type(i, k);
            let five = if i > 1 { self.seq.base_or_boundary(i - 1) } else { ff_energy::Base::N };
            let three = self.seq.base_or_boundary(k + 1);
            let stem = self.oracle.ml_stem(pt_type, five, three);
            if stem == 0.0 {
                continue;
            }
            let tail = tables.expmlbase.get(j - k).copied().unwrap_or(1.0);
            branches.push((qbik * stem * tail, k));
        }
        if branches.is_empty() {
            return Err(PfError::SampleFailure { region: format!("qm1[{},{}] has no enumerable branch", i, j) });
        }
        let weights: Vec<f64> = branches.iter().map(|(w, _)| *w).collect();
        let idx = Self::weighted_choice(&weights, total, rng);
        let (_, k) = branches[idx];
        pt[i] = Some(k as ff_structure::NAIDX);
        pt[k] = Some(i as ff_structure::NAIDX);
        self.sample_pair(tables, i, k, pt, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::placeholder_params;
    use rand::SeedableRng;

    #[test]
    fn sampled_structure_is_well_formed() {
        let seq = EncodedSequence::new("GGGAAACCC").unwrap();
        let params = placeholder_params();
        let model = ModelDetails::default();
        let hc = crate::constraints::HardConstraints::unconstrained(seq.len());
        let sc = crate::constraints::SoftConstraints::default();
        let scaler = crate::scaler::Scaler::prepare(seq.len(), &model, 1.0);
        let mut tables = crate::tables::ForwardTables::new(seq.len(), scaler.scale, scaler.expmlbase, false);
        let forward = crate::forward::ForwardEngine::new(&seq, &params, &model, &hc, &sc);
        forward.run(&mut tables).unwrap();

        let sampler = Sampler::new(&seq, &params, &model, &hc, &sc);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let pt = sampler.sample(&tables, &mut rng).unwrap();
        for (a, b) in pt.pairs() {
            assert!(a < b);
            assert!(pt.is_well_formed(1, seq.len()));
        }
    }
}
