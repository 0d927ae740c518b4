/// Base, NucleotideVec, PairTypeRNA, ....
mod nucleotides;

pub use nucleotides::*;
