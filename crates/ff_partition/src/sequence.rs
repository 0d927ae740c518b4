use ff_energy::{Base, NucleotideVec, PairTypeRNA};

use crate::error::PfError;

/// A 1-indexed nucleotide sequence: `bases[0]` is an unused sentinel so
/// that every DP index matches the spec's 1-based convention directly.
#[derive(Debug, Clone)]
pub struct EncodedSequence {
    bases: Vec<Base>,
}

impl EncodedSequence {
    /// `T` is folded into `U` at ingestion, matching §6; any other
    /// non-nucleotide character is rejected rather than silently mapped
    /// to `N` (unlike [`NucleotideVec::from_lossy`], which is meant for
    /// display-only contexts).
    pub fn new(seq: &str) -> Result<Self, PfError> {
        if seq.is_empty() {
            return Err(PfError::InvalidInput { why: "empty sequence".into() });
        }
        let nv = NucleotideVec::try_from(seq)
            .map_err(|e| PfError::InvalidInput { why: e.to_string() })?;
        let mut bases = Vec::with_capacity(nv.len() + 1);
        bases.push(Base::N); // 0 is never addressed
        bases.extend_from_slice(&nv);
        Ok(EncodedSequence { bases })
    }

    pub fn len(&self) -> usize {
        self.bases.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn base(&self, i: usize) -> Base {
        self.bases[i]
    }

    /// Like [`Self::base`], but returns the `N` sentinel for positions
    /// outside `1..=len()` instead of panicking — used for the "no flanking
    /// base" case at the ends of a linear (non-circular) sequence.
    #[inline]
    pub fn base_or_boundary(&self, i: usize) -> Base {
        if i == 0 || i > self.len() {
            Base::N
        } else {
            self.bases[i]
        }
    }

    /// Pair type formed by positions `i` (5') and `j` (3'). `PairTypeRNA::NN`
    /// means the positions cannot pair at all under Watson-Crick/wobble
    /// rules (independent of any hard constraint).
    #[inline]
    pub fn pair_type(&self, i: usize, j: usize) -> PairTypeRNA {
        PairTypeRNA::from((self.bases[i], self.bases[j]))
    }

    /// Reverse-complement orientation of a pair type, e.g. `CG -> GC`.
    #[inline]
    pub fn rtype(pt: PairTypeRNA) -> PairTypeRNA {
        pt.invert()
    }

    /// The literal substring `i..=j`, used for tetra/tri/hexaloop lookups.
    pub fn substring(&self, i: usize, j: usize) -> String {
        (i..=j).map(|k| self.bases[k].to_string()).collect()
    }

    /// Wraps an arbitrary (possibly out-of-range) 1-indexed position onto
    /// `1..=len()`, the way a circular sequence's position arithmetic
    /// needs whenever a loop crosses the `n`/`1` seam.
    pub fn wrap(&self, pos: isize) -> usize {
        let n = self.len() as isize;
        let mut p = pos % n;
        if p <= 0 {
            p += n;
        }
        p as usize
    }

    /// The literal substring running from `start` to `end` inclusive,
    /// wrapping past `len()` back to `1` along the way. Used for
    /// tetra/tri/hexaloop lookups on a hairpin loop that wraps across the
    /// circular seam.
    pub fn wrap_substring(&self, start: usize, end: usize) -> String {
        let n = self.len();
        let mut s = String::new();
        let mut k = start;
        loop {
            s.push_str(&self.bases[k].to_string());
            if k == end {
                break;
            }
            k = if k == n { 1 } else { k + 1 };
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_is_folded_to_u() {
        let s = EncodedSequence::new("ACGT").unwrap();
        assert_eq!(s.base(4), Base::U);
    }

    #[test]
    fn rejects_invalid_chars() {
        assert!(EncodedSequence::new("ACGX").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(EncodedSequence::new("").is_err());
    }

    #[test]
    fn pair_type_is_symmetric_under_rtype() {
        let s = EncodedSequence::new("GC").unwrap();
        let pt = s.pair_type(1, 2);
        assert_eq!(pt, PairTypeRNA::GC);
        assert_eq!(EncodedSequence::rtype(pt), PairTypeRNA::CG);
    }
}
