use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ff_structure::PairTable;
use rand::Rng;

use crate::constraints::{HardConstraints, SoftConstraints};
use crate::diagnostics::LogDiagnosticSink;
use crate::error::PfError;
use crate::forward::ForwardEngine;
use crate::model::ModelDetails;
use crate::outside::OutsideEngine;
use crate::params::PfParamSet;
use crate::sampler::Sampler;
use crate::scaler::Scaler;
use crate::sequence::EncodedSequence;
use crate::tables::ForwardTables;

/// Cooperative cancellation flag shared between a fold and whatever is
/// driving it (a CLI `Ctrl-C` handler, a `rayon` batch supervisor). The
/// engines check it between outer DP passes, not inside the innermost
/// loops, so cancellation latency is one pass, not one cell.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Owns one sequence's encoded form, model, and parameter set, and
/// orchestrates forward fill, outside pass, and sampling against them.
/// Construction never does any folding; call [`Self::partition_function`]
/// to actually run the DP.
pub struct FoldContext<'p> {
    pub seq: EncodedSequence,
    pub params: &'p PfParamSet,
    pub model: ModelDetails,
    pub hc: HardConstraints,
    pub sc: SoftConstraints,
    pub cancel: CancelToken,
}

impl<'p> FoldContext<'p> {
    pub fn new(seq: &str, params: &'p PfParamSet, model: ModelDetails) -> Result<Self, PfError> {
        let seq = EncodedSequence::new(seq)?;
        let n = seq.len();
        Ok(FoldContext {
            seq,
            params,
            model,
            hc: HardConstraints::unconstrained(n),
            sc: SoftConstraints::default(),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_hard_constraints(mut self, hc: HardConstraints) -> Self {
        self.hc = hc;
        self
    }

    pub fn with_soft_constraints(mut self, sc: SoftConstraints) -> Self {
        self.sc = sc;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the forward recursion and outside pass, returning the filled
    /// tables (`q`, `qb`, `qm`, `qm1`, `probs`, and the circular sums when
    /// `model.circ` is set).
    pub fn partition_function(&self) -> Result<ForwardTables, PfError> {
        if self.cancel.is_cancelled() {
            return Err(PfError::Cancelled);
        }
        let n = self.seq.len();
        let ml_base_weight = crate::energy_oracle::boltz(self.params.ml_base, self.model.rt_decikcal());
        let scaler = Scaler::prepare(n, &self.model, ml_base_weight);
        let mut tables = ForwardTables::new(n, scaler.scale, scaler.expmlbase, self.model.gquad);

        let forward = ForwardEngine::new(&self.seq, self.params, &self.model, &self.hc, &self.sc);
        forward.run_with_sink(&mut tables, &LogDiagnosticSink, Some(&self.cancel))?;

        if self.cancel.is_cancelled() {
            return Err(PfError::Cancelled);
        }

        let outside = OutsideEngine::new(&self.seq, self.params, &self.model, &self.sc);
        outside.run_with_sink(&mut tables, &LogDiagnosticSink, Some(&self.cancel))?;

        Ok(tables)
    }

    /// Draws `count` independent stochastic samples from an already-filled
    /// [`ForwardTables`] (normally from [`Self::partition_function`]).
    pub fn sample<R: Rng + ?Sized>(&self, tables: &ForwardTables, count: usize, rng: &mut R) -> Result<Vec<PairTable>, PfError> {
        let sampler = Sampler::new(&self.seq, self.params, &self.model, &self.hc, &self.sc);
        (0..count).map(|_| sampler.sample(tables, rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::placeholder_params;

    #[test]
    fn context_runs_end_to_end() {
        let params = placeholder_params();
        let ctx = FoldContext::new("GGGAAACCC", &params, ModelDetails::default()).unwrap();
        let tables = ctx.partition_function().unwrap();
        assert!(tables.qo > 0.0);
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let params = placeholder_params();
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = FoldContext::new("GGGAAACCC", &params, ModelDetails::default())
            .unwrap()
            .with_cancel_token(cancel);
        assert!(matches!(ctx.partition_function(), Err(PfError::Cancelled)));
    }
}
