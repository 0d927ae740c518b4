use crate::model::ModelDetails;

/// Per-length Boltzmann rescaling factors.
///
/// `scale[u] = sigma^-u` for a rescaling constant `sigma` chosen so that
/// `log(sigma) ~ -E_avg / (kT * n)`, keeping partial sums of order 1
/// regardless of sequence length. `expmlbase[u]` additionally folds in the
/// Boltzmann weight of `u` unpaired multibranch bases.
#[derive(Debug, Clone)]
pub struct Scaler {
    pub scale: Vec<f64>,
    pub expmlbase: Vec<f64>,
}

impl Scaler {
    /// `w_ml` is the Boltzmann weight of a single unpaired multibranch
    /// base (i.e. `boltz(ml_base_energy)`), computed by the caller from
    /// the parameter set so this module stays a pure numeric routine.
    pub fn prepare(n: usize, model: &ModelDetails, w_ml: f64) -> Self {
        let sigma = Self::choose_sigma(model);

        let mut scale = vec![0.0f64; n + 2];
        scale[0] = 1.0;
        if n >= 1 {
            scale[1] = 1.0 / sigma;
        }
        // Halving, to avoid the precision drift of repeated `powi` calls.
        for u in 2..=(n + 1).min(scale.len() - 1) {
            scale[u] = scale[u / 2] * scale[u - u / 2];
        }

        let mut expmlbase = vec![0.0f64; n + 2];
        for u in 0..scale.len() {
            expmlbase[u] = w_ml.powi(u as i32) * scale[u];
        }

        Scaler { scale, expmlbase }
    }

    fn choose_sigma(model: &ModelDetails) -> f64 {
        if model.pf_scale < 0.0 {
            let kt = model.rt_cal_per_mol();
            let est = -185.0 + (model.temperature - 37.0) * 7.27;
            (-est / kt).exp().max(1.0)
        } else {
            model.pf_scale.max(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_monotonically_decreasing_past_one() {
        let model = ModelDetails::default();
        let s = Scaler::prepare(20, &model, 1.0);
        for u in 1..s.scale.len() - 1 {
            assert!(s.scale[u + 1] <= s.scale[u], "scale should not grow with length");
        }
    }

    #[test]
    fn scale_zero_and_one_are_sane() {
        let model = ModelDetails::default();
        let s = Scaler::prepare(10, &model, 1.0);
        assert_eq!(s.scale[0], 1.0);
        assert!(s.scale[1] > 0.0 && s.scale[1] <= 1.0);
    }

    #[test]
    fn explicit_pf_scale_hint_is_honored() {
        let mut model = ModelDetails::default();
        model.pf_scale = 2.0;
        let s = Scaler::prepare(4, &model, 1.0);
        assert_eq!(s.scale[1], 0.5);
        assert_eq!(s.scale[2], 0.25);
    }
}
