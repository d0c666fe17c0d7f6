use std::iter::{ExactSizeIterator, FusedIterator, Iterator};
use std::slice::Windows;

use crate::_hash_murmur;
use crate::Error;
use crate::HashIntoType;

pub const VALID: [bool; 256] = {
    let mut lookup = [false; 256];
    lookup[b'A' as usize] = true;
    lookup[b'C' as usize] = true;
    lookup[b'G' as usize] = true;
    lookup[b'T' as usize] = true;
    lookup
};

#[inline]
pub fn is_valid_dna(kmer: &[u8]) -> bool {
    kmer.iter().all(|nt| VALID[*nt as usize])
}

/// Sliding window (stride 1) over a sequence, yielding every substring of
/// length `ksize` from left to right.
///
/// Repeated substrings are yielded once per position; deduplication is the
/// job of the sketch consuming them.
#[derive(Debug, Clone)]
pub struct SeqToKmers<'a> {
    windows: Option<Windows<'a, u8>>,
}

impl<'a> SeqToKmers<'a> {
    pub fn new(seq: &'a [u8], ksize: usize) -> Result<SeqToKmers<'a>, Error> {
        if ksize == 0 {
            return Err(Error::InvalidKsize);
        }

        // `windows` would yield nothing anyway, but keep it explicit
        let windows = if seq.len() < ksize {
            None
        } else {
            Some(seq.windows(ksize))
        };

        Ok(SeqToKmers { windows })
    }
}

impl<'a> Iterator for SeqToKmers<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.windows.as_mut()?.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.windows {
            Some(w) => w.size_hint(),
            None => (0, Some(0)),
        }
    }
}

impl<'a> ExactSizeIterator for SeqToKmers<'a> {}

impl<'a> FusedIterator for SeqToKmers<'a> {}

// Iterator for converting sequence to hashes
pub struct SeqToHashes {
    sequence: Vec<u8>,
    kmer_index: usize,
    k_size: usize,
    max_index: usize,
    force: bool,
    seed: u64,
}

impl SeqToHashes {
    pub fn new(seq: &[u8], k_size: usize, force: bool, seed: u64) -> SeqToHashes {
        let sequence = seq.to_ascii_uppercase();

        // By setting max_index to 0, the iterator will return None and exit
        let max_index = if k_size == 0 || sequence.len() < k_size {
            0
        } else {
            sequence.len() - k_size + 1
        };

        SeqToHashes {
            sequence,
            kmer_index: 0,
            k_size,
            max_index,
            force,
            seed,
        }
    }
}

impl Iterator for SeqToHashes {
    type Item = Result<HashIntoType, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.kmer_index < self.max_index {
            let kmer = &self.sequence[self.kmer_index..self.kmer_index + self.k_size];
            self.kmer_index += 1;

            if is_valid_dna(kmer) {
                return Some(Ok(_hash_murmur(kmer, self.seed)));
            }

            if !self.force {
                // Stop iterating after the first error
                self.kmer_index = self.max_index;
                return Some(Err(Error::InvalidDNA {
                    message: String::from_utf8_lossy(kmer).into_owned(),
                }));
            }
            // skip windows with ambiguous bases when forced
        }
        None
    }
}
