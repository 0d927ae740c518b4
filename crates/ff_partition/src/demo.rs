//! A small, internally consistent placeholder parameter set, for demo
//! and test use only. These numbers are *not* real Turner nearest-
//! neighbor values — loading real parameters is an external, out-of-
//! scope concern (see [`crate::params::PfParamSet`]'s own docs). They
//! exist only to exercise the DP engines end-to-end (favorable pairing,
//! a hairpin penalty, mild loop-length and asymmetry penalties, so every
//! Boltzmann weight stays finite and the stronger pair types `CG`/`GC`
//! are favored over `AU`/`GU`, as a real nearest-neighbor model would be).

use ff_energy::PairTypeRNA;

use crate::params::PfParamSet;

/// Builds the placeholder parameter set described above. The `pf-fold`
/// demo binary uses this directly; real users of this crate should build
/// their own `PfParamSet` from an actual Turner parameter source.
pub fn placeholder_params() -> PfParamSet {
    let mut p = PfParamSet::zeroed();

    for u in 0..=30 {
        p.hairpin[u] = 45 + (u as i32) * 5;
        p.bulge[u] = 38 + (u as i32) * 4;
        p.interior[u] = 10 + (u as i32) * 2;
    }

    let stack_strength = |pt: PairTypeRNA| -> i32 {
        match pt {
            PairTypeRNA::CG | PairTypeRNA::GC => -34,
            PairTypeRNA::AU | PairTypeRNA::UA => -22,
            PairTypeRNA::GU | PairTypeRNA::UG => -14,
            PairTypeRNA::NN => 0,
        }
    };
    for a in 0..7 {
        for b in 0..7 {
            let pt_a = pair_type_from_index(a);
            let pt_b = pair_type_from_index(b);
            if pt_a == PairTypeRNA::NN || pt_b == PairTypeRNA::NN {
                p.stack[a][b] = 0;
            } else {
                p.stack[a][b] = (stack_strength(pt_a) + stack_strength(pt_b)) / 2;
            }
        }
    }

    for pt in 0..7 {
        for x in 0..5 {
            for y in 0..5 {
                p.mismatch_hairpin[pt][x][y] = -5;
                p.mismatch_interior[pt][x][y] = -4;
                p.mismatch_interior_1n[pt][x][y] = -3;
                p.mismatch_interior_23[pt][x][y] = -3;
                p.mismatch_multi[pt][x][y] = -2;
                p.mismatch_exterior[pt][x][y] = -2;
            }
        }
        for x in 0..5 {
            p.dangle5[pt][x] = -4;
            p.dangle3[pt][x] = -4;
        }
    }

    for a in 0..7 {
        for b in 0..7 {
            for x in 0..5 {
                for y in 0..5 {
                    p.int11[a][b][x][y] = -8;
                }
            }
        }
    }
    for a in 0..7 {
        for b in 0..7 {
            for x in 0..5 {
                for y in 0..5 {
                    for z in 0..5 {
                        p.int21[a][b][x][y][z] = -6;
                    }
                }
            }
        }
    }
    for a in 0..7 {
        for b in 0..7 {
            for w in 0..5 {
                for x in 0..5 {
                    for y in 0..5 {
                        for z in 0..5 {
                            p.int22[a][b][w][x][y][z] = -6;
                        }
                    }
                }
            }
        }
    }

    p.ml_base = 4;
    p.ml_closing = 34;
    p.ml_intern = 4;
    p.ninio_m = 6;
    p.ninio_max = 30;
    p.term_au = 5;
    p.lxc = 107.856;

    p.tetraloops.insert("GAAAAU".to_string(), -30);
    p.triloops.insert("GAAAC".to_string(), -15);

    p
}

fn pair_type_from_index(idx: usize) -> PairTypeRNA {
    match idx {
        0 => PairTypeRNA::AU,
        1 => PairTypeRNA::UA,
        2 => PairTypeRNA::CG,
        3 => PairTypeRNA::GC,
        4 => PairTypeRNA::GU,
        5 => PairTypeRNA::UG,
        _ => PairTypeRNA::NN,
    }
}
