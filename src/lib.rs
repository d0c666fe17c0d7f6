//! # Estimate k-mer similarity between viral strains with HyperLogLog sketches.
//!
//! strainsketch builds a [HyperLogLog][0] sketch for the k-mer set of each
//! sequence (one sketch per strain), persists the sketches so they only
//! need to be computed once, and estimates the Jaccard similarity between
//! strains by inclusion-exclusion on the sketch cardinalities.
//!
//! [0]: https://en.wikipedia.org/wiki/HyperLogLog
//!
//! The pairwise similarities are assembled into a [`compare::DistanceMatrix`]
//! that can be handed to any hierarchical-clustering routine.

pub mod errors;
pub use errors::StrainSketchError as Error;

pub type Result<T> = std::result::Result<T, Error>;

pub mod cmd;
pub mod compare;
pub mod encodings;
pub mod sketch;
pub mod storage;

use murmurhash3::murmurhash3_x64_128;

type HashIntoType = u64;

pub fn _hash_murmur(kmer: &[u8], seed: u64) -> u64 {
    murmurhash3_x64_128(kmer, seed).0
}
