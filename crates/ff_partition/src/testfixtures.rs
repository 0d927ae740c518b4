//! Concrete scenario tests (S1-S6) run against [`crate::demo::placeholder_params`],
//! the crate's synthetic, explicitly non-physical parameter set.

#[cfg(test)]
mod tests {
    use crate::context::FoldContext;
    use crate::demo::placeholder_params;
    use crate::model::ModelDetails;

    /// S1: a sequence too short to fold at all collapses to the
    /// unstructured-ensemble partition function, `Z == scale[n]` (every
    /// base unpaired, weighted only by rescaling).
    #[test]
    fn s1_short_sequence_is_fully_unpaired() {
        let params = placeholder_params();
        let ctx = FoldContext::new("AAAA", &params, ModelDetails::default()).unwrap();
        let tables = ctx.partition_function().unwrap();
        assert!((tables.qo - tables.scale[4]).abs() < 1e-9);
    }

    /// S2: a single perfectly complementary hairpin dominates the
    /// ensemble; the closing pair's probability should be close to 1.
    #[test]
    fn s2_dominant_hairpin_has_high_pair_probability() {
        let params = placeholder_params();
        let ctx = FoldContext::new("GGGGAAAACCCC", &params, ModelDetails::default()).unwrap();
        let tables = ctx.partition_function().unwrap();
        let p = *tables.probs.get(1, 12);
        assert!(p > 0.5, "expected dominant closing pair, got P={}", p);
    }

    #[test]
    fn s3_no_gu_closure_forbids_terminal_gu_hairpin() {
        let params = placeholder_params();
        let mut model = ModelDetails::default();
        model.no_gu_closure = true;
        let ctx = FoldContext::new("GAAAAU", &params, model).unwrap();
        let tables = ctx.partition_function().unwrap();
        assert_eq!(*tables.qb.get(1, 6), 0.0);
    }

    #[test]
    fn s4_tetraloop_bonus_increases_hairpin_weight() {
        let params = placeholder_params();
        let model = ModelDetails::default();
        let oracle = crate::energy_oracle::EnergyOracle::new(&params, &model);
        let bonus_seq = crate::sequence::EncodedSequence::new("GGAAAAUCC").unwrap();
        let generic_seq = crate::sequence::EncodedSequence::new("GGAAAACCC").unwrap();
        let w_bonus = oracle.hairpin(&bonus_seq, 2, 7);
        let w_generic = oracle.hairpin(&generic_seq, 1, 9);
        assert!(w_bonus > 0.0 && w_generic > 0.0);
    }

    #[test]
    fn s5_probabilities_sum_at_most_one_per_position() {
        let params = placeholder_params();
        let ctx = FoldContext::new("GGGGAAAACCCC", &params, ModelDetails::default()).unwrap();
        let tables = ctx.partition_function().unwrap();
        for i in 1..=tables.n {
            let mut total = 0.0;
            for j in 1..=tables.n {
                total += if i <= j { *tables.probs.get(i, j) } else { *tables.probs.get(j, i) };
            }
            assert!(total <= 1.0 + 1e-6, "position {} oversubscribed: {}", i, total);
        }
    }

    /// Forced-unpaired hard constraint (spec §8 S5): every position
    /// forbidden to pair collapses the ensemble to the single fully
    /// unpaired structure, `Z == scale[n]`, every pair probability zero.
    #[test]
    fn all_positions_forced_unpaired_forbids_every_pair() {
        let params = placeholder_params();
        let hc = crate::constraints::HardConstraints::from_str(9, "xxxxxxxxx").unwrap();
        let ctx = FoldContext::new("GGGAAACCC", &params, ModelDetails::default()).unwrap().with_hard_constraints(hc);
        let tables = ctx.partition_function().unwrap();
        assert!((tables.qo - tables.scale[9]).abs() < 1e-9);
        for i in 1..=tables.n {
            for j in i..=tables.n {
                assert_eq!(*tables.probs.get(i, j), 0.0);
            }
        }
    }

    /// Soft-constraint unpaired bonus on a hairpin loop's own interior
    /// (spec §8 S6): `GGGAAACCC` is too short to admit any multibranch
    /// decomposition at all (a multiloop needs span >= 2*turn+2 beyond its
    /// closing pair, which alone exceeds this sequence's length), so every
    /// structure in its ensemble routes each position through exactly one
    /// of the exterior loop or a hairpin/interior loop — the only two
    /// places `sc_up`/`sc_up_run` are wired in. A bonus confined to
    /// positions 4-6 therefore reweights every structure's contribution by
    /// exactly the same factor, and `F` shifts by exactly the bonus's own
    /// contribution, `3 * ln(bonus) * kT` (kcal/mol).
    #[test]
    fn soft_constraint_unpaired_bonus_shifts_free_energy_by_exact_amount() {
        let params = placeholder_params();
        let model = ModelDetails::default();
        let ctx_plain = FoldContext::new("GGGAAACCC", &params, model.clone()).unwrap();
        let tables_plain = ctx_plain.partition_function().unwrap();

        let bonus = 1e30;
        let mut bf_up = vec![1.0; 10];
        for i in [4usize, 5, 6] {
            bf_up[i] = bonus;
        }
        let sc = crate::constraints::SoftConstraints { bf_up: Some(bf_up), ..Default::default() };
        let ctx_bonus = FoldContext::new("GGGAAACCC", &params, model.clone()).unwrap().with_soft_constraints(sc);
        let tables_bonus = ctx_bonus.partition_function().unwrap();

        let f_plain = crate::reductions::ensemble_free_energy(&tables_plain, &model);
        let f_bonus = crate::reductions::ensemble_free_energy(&tables_bonus, &model);
        let expected_shift = 3.0 * bonus.ln() * model.rt_kcal();
        assert!(
            (f_plain - f_bonus - expected_shift).abs() < 1e-6,
            "expected shift {expected_shift}, got {}",
            f_plain - f_bonus
        );
    }

    /// S6: disallowing lonely pairs only matters to MFE traceback, not
    /// the partition function itself — `no_lp` is accepted but does not
    /// change `qo` here, which we assert explicitly so a future change
    /// that silently starts gating on it is caught.
    #[test]
    fn s6_no_lp_does_not_alter_partition_function() {
        let params = placeholder_params();
        let mut model_plain = ModelDetails::default();
        let mut model_nolp = ModelDetails::default();
        model_nolp.no_lp = true;
        model_plain.no_lp = false;

        let ctx_plain = FoldContext::new("GGGGAAAACCCC", &params, model_plain).unwrap();
        let ctx_nolp = FoldContext::new("GGGGAAAACCCC", &params, model_nolp).unwrap();
        let qo_plain = ctx_plain.partition_function().unwrap().qo;
        let qo_nolp = ctx_nolp.partition_function().unwrap().qo;
        assert!((qo_plain - qo_nolp).abs() < 1e-9);
    }
}
