/*
Based on the HyperLogLog implementations in khmer
  https://github.com/dib-lab/khmer/blob/fb65d21eaedf0d397d49ae3debc578897f9d6eb4/src/oxli/hllcounter.cc
and pdatastructs
  https://github.com/crepererum/pdatastructs.rs/blob/0254dbce33c0404f444f29e0cca8f73002d6e5e6/src/hyperloglog.rs
*/

use std::cmp;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::encodings::SeqToHashes;
use crate::sketch::{Estimator, SketchConfig, DEFAULT_SEED};
use crate::Error;
use crate::HashIntoType;

pub mod estimators;

use estimators::CounterType;

pub const MIN_PRECISION: usize = 4;
pub const MAX_PRECISION: usize = 18;

const MAGIC: &[u8; 4] = b"HLLS";
const FORMAT_VERSION: u8 = 1;
// magic + version + p + ksize + seed + n_added
const HEADER_SIZE: usize = 4 + 1 + 1 + 4 + 8 + 8;

/// HyperLogLog sketch over 64-bit murmur3 hashes.
///
/// The low `p` bits of a hash select the register, the remaining `64 - p`
/// bits give the rank (position of the first set bit). Registers only ever
/// grow, so inserting the same hash twice is a no-op and merging two sketches
/// produces exactly the sketch of the union of their inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperLogLog {
    registers: Vec<CounterType>,
    p: usize,
    ksize: usize,
    seed: u64,
    n_added: u64,
}

impl HyperLogLog {
    pub fn with_error_rate(error_rate: f64, ksize: usize) -> Result<HyperLogLog, Error> {
        let p = f64::ceil(f64::log2(f64::powi(1.04 / error_rate, 2)));
        if !p.is_finite() || p < 0. {
            return Err(Error::HLLPrecisionBounds);
        }
        HyperLogLog::new(p as usize, ksize)
    }

    pub fn new(p: usize, ksize: usize) -> Result<HyperLogLog, Error> {
        HyperLogLog::with_seed(p, ksize, DEFAULT_SEED)
    }

    pub fn from_config(config: &SketchConfig) -> Result<HyperLogLog, Error> {
        HyperLogLog::with_seed(config.precision(), config.ksize(), config.seed())
    }

    pub fn with_seed(p: usize, ksize: usize, seed: u64) -> Result<HyperLogLog, Error> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&p) {
            return Err(Error::HLLPrecisionBounds);
        }
        if ksize == 0 {
            return Err(Error::InvalidKsize);
        }

        let size = 1usize << p;
        let registers = vec![0; size];

        Ok(HyperLogLog {
            registers,
            p,
            ksize,
            seed,
            n_added: 0,
        })
    }

    pub fn precision(&self) -> usize {
        self.p
    }

    pub fn ksize(&self) -> usize {
        self.ksize
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of hashes inserted, duplicates included.
    pub fn n_added(&self) -> u64 {
        self.n_added
    }

    pub fn size(&self) -> usize {
        self.registers.len()
    }

    pub fn registers(&self) -> &[CounterType] {
        &self.registers
    }

    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|r| *r == 0)
    }

    /// Largest value a register can hold for this precision.
    pub fn max_rank(&self) -> CounterType {
        max_rank(self.p)
    }

    pub fn check_compatible(&self, other: &HyperLogLog) -> Result<(), Error> {
        if self.p != other.p {
            Err(Error::PrecisionMismatch {
                p1: self.p,
                p2: other.p,
            })
        } else if self.ksize != other.ksize {
            Err(Error::MismatchKSizes)
        } else if self.seed != other.seed {
            Err(Error::MismatchSeed)
        } else {
            Ok(())
        }
    }

    pub fn merge(&mut self, other: &HyperLogLog) -> Result<(), Error> {
        self.check_compatible(other)?;
        self.registers
            .iter_mut()
            .zip(other.registers.iter())
            .for_each(|(a, b)| *a = cmp::max(*a, *b));
        self.n_added += other.n_added;
        Ok(())
    }

    /// Sketch of the union of both inputs, leaving them untouched.
    pub fn union(&self, other: &HyperLogLog) -> Result<HyperLogLog, Error> {
        let mut merged = self.clone();
        merged.merge(other)?;
        Ok(merged)
    }

    pub fn add_hash(&mut self, hash: HashIntoType) {
        let value = hash >> self.p;
        let index = (hash - (value << self.p)) as usize;

        // leading zeros counted within the (64 - p)-bit field
        let rank = value.leading_zeros() + 1 - (self.p as u32);

        let old_value = self.registers[index];
        self.registers[index] = cmp::max(old_value, rank as CounterType);
        self.n_added += 1;
    }

    pub fn add_many(&mut self, hashes: &[HashIntoType]) {
        for hash in hashes {
            self.add_hash(*hash);
        }
    }

    pub fn add_word(&mut self, word: &[u8]) {
        let hash = crate::_hash_murmur(word, self.seed);
        self.add_hash(hash);
    }

    /// Insert every k-mer of `seq`.
    ///
    /// Windows with a non-ACGT symbol are an error unless `force` is set, in
    /// which case they are skipped. On error the sketch is left unchanged.
    pub fn add_sequence(&mut self, seq: &[u8], force: bool) -> Result<(), Error> {
        let hashes = SeqToHashes::new(seq, self.ksize, force, self.seed)
            .collect::<Result<Vec<_>, Error>>()?;
        self.add_many(&hashes);
        Ok(())
    }

    pub fn estimate(&self) -> f64 {
        HyperLogLog::estimate_cardinality(&self.registers)
    }

    pub fn estimate_with(&self, estimator: Estimator) -> f64 {
        match estimator {
            Estimator::Classic => self.estimate(),
            Estimator::Mle => {
                let q = 64 - self.p;
                let counts = estimators::counts(&self.registers, q);
                estimators::mle(&counts, self.p, q, 0.01)
            }
        }
    }

    pub fn cardinality(&self) -> usize {
        self.estimate().round() as usize
    }

    fn alpha(m: usize) -> f64 {
        match m {
            0..=16 => 0.673,
            17..=32 => 0.697,
            33..=64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
        }
    }

    /// Raw HyperLogLog estimate with linear counting below `2.5m`.
    ///
    /// Hashes are 64 bits wide, so no large-range correction applies.
    pub fn estimate_cardinality(registers: &[CounterType]) -> f64 {
        let nregisters = registers.len();
        let zeros = registers.iter().filter(|r| **r == 0).count();
        if zeros == nregisters {
            return 0.;
        }

        let m = nregisters as f64;
        let z = registers
            .iter()
            .fold(0., |acc, &v| acc + 2f64.powi(-(i32::from(v))));

        let e = HyperLogLog::alpha(nregisters) * m * m / z;

        if e <= 2.5 * m && zeros > 0 {
            // do linear counting
            m * (m / zeros as f64).ln()
        } else {
            e
        }
    }

    /// Estimated size of the intersection, by inclusion-exclusion.
    pub fn intersection(&self, other: &HyperLogLog) -> Result<f64, Error> {
        let union = self.union(other)?;
        Ok(f64::max(0., self.estimate() + other.estimate() - union.estimate()))
    }

    /// Estimated Jaccard similarity, always within `[0, 1]`.
    pub fn similarity(&self, other: &HyperLogLog) -> Result<f64, Error> {
        self.similarity_with(other, Estimator::Classic)
    }

    pub fn similarity_with(&self, other: &HyperLogLog, estimator: Estimator) -> Result<f64, Error> {
        let union = self.union(other)?;

        let est_union = union.estimate_with(estimator);
        if !est_union.is_finite() || est_union <= 0. {
            return Ok(0.);
        }

        let est_inter =
            self.estimate_with(estimator) + other.estimate_with(estimator) - est_union;
        Ok((f64::max(0., est_inter) / est_union).clamp(0., 1.))
    }

    /// Fraction of `self` estimated to be contained in `other`.
    pub fn containment(&self, other: &HyperLogLog) -> Result<f64, Error> {
        let intersection = self.intersection(other)?;
        let size = self.estimate();
        if size <= 0. {
            return Ok(0.);
        }
        Ok((intersection / size).clamp(0., 1.))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)?;
        let mut wtr = BufWriter::new(file);
        self.to_writer(&mut wtr)?;
        wtr.flush()?;
        Ok(())
    }

    pub fn to_writer<W>(&self, wtr: &mut W) -> Result<(), Error>
    where
        W: io::Write,
    {
        wtr.write_all(MAGIC)?;
        wtr.write_u8(FORMAT_VERSION)?;
        wtr.write_u8(self.p as u8)?;
        wtr.write_u32::<LittleEndian>(self.ksize as u32)?;
        wtr.write_u64::<LittleEndian>(self.seed)?;
        wtr.write_u64::<LittleEndian>(self.n_added)?;
        wtr.write_all(&self.registers)?;
        Ok(())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<HyperLogLog, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound {
                path: path.display().to_string(),
            },
            _ => e.into(),
        })?;
        HyperLogLog::from_reader(BufReader::new(file))
    }

    /// Load a sketch, transparently decompressing gzipped input.
    pub fn from_reader<R>(mut rdr: R) -> Result<HyperLogLog, Error>
    where
        R: io::Read,
    {
        let mut raw = Vec::new();
        rdr.read_to_end(&mut raw)?;

        // too short to even sniff a compression format
        if raw.len() < 5 {
            return Err(Error::corrupt(format!(
                "expected at least {} bytes, found {}",
                HEADER_SIZE,
                raw.len()
            )));
        }

        // input is in memory, errors past this point mean a bad stream
        let (mut rdr, _format) = niffler::get_reader(Box::new(io::Cursor::new(raw)))
            .map_err(|e| Error::corrupt(format!("unreadable compression header: {}", e)))?;
        let mut data = Vec::new();
        rdr.read_to_end(&mut data)
            .map_err(|e| Error::corrupt(format!("decompression failed: {}", e)))?;

        HyperLogLog::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<HyperLogLog, Error> {
        if data.len() < HEADER_SIZE {
            return Err(Error::corrupt(format!(
                "expected at least {} bytes, found {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        let (mut header, registers) = data.split_at(HEADER_SIZE);

        let mut magic = [0u8; 4];
        header.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::corrupt("not a sketch file (bad magic)"));
        }

        let version = header.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(Error::corrupt(format!(
                "unsupported format version {}",
                version
            )));
        }

        let p = header.read_u8()? as usize;
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&p) {
            return Err(Error::corrupt(format!("precision {} out of bounds", p)));
        }

        let ksize = header.read_u32::<LittleEndian>()? as usize;
        if ksize == 0 {
            return Err(Error::corrupt("ksize is zero"));
        }
        let seed = header.read_u64::<LittleEndian>()?;
        let n_added = header.read_u64::<LittleEndian>()?;

        let size = 1usize << p;
        if registers.len() != size {
            return Err(Error::corrupt(format!(
                "precision {} needs {} registers, found {}",
                p,
                size,
                registers.len()
            )));
        }

        let max = max_rank(p);
        if let Some((i, r)) = registers.iter().enumerate().find(|(_, r)| **r > max) {
            return Err(Error::corrupt(format!(
                "register {} holds {}, above the maximum rank {}",
                i, r, max
            )));
        }

        Ok(HyperLogLog {
            registers: registers.to_vec(),
            p,
            ksize,
            seed,
            n_added,
        })
    }
}

fn max_rank(p: usize) -> CounterType {
    (64 - p + 1) as CounterType
}
