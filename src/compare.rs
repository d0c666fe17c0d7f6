//! Pairwise similarity between strain sketches.
//!
//! Distances are `1 - J`, where `J` is the Jaccard similarity estimated by
//! inclusion-exclusion over sketch cardinalities. The resulting matrix is
//! symmetric, non-negative and has a zero diagonal, but since every entry
//! carries its own estimation error the triangle inequality only holds
//! approximately.

use std::collections::BTreeMap;
use std::io;

use cfg_if::cfg_if;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::sketch::hyperloglog::HyperLogLog;
use crate::sketch::Estimator;
use crate::Error;

/// Estimated Jaccard similarity of the k-mer sets behind two sketches.
pub fn jaccard_estimate(a: &HyperLogLog, b: &HyperLogLog) -> Result<f64, Error> {
    a.similarity(b)
}

pub fn jaccard_estimate_with(
    a: &HyperLogLog,
    b: &HyperLogLog,
    estimator: Estimator,
) -> Result<f64, Error> {
    a.similarity_with(b, estimator)
}

/// Symmetric strain-by-strain distance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    names: Vec<String>,
    distances: Vec<f64>,
}

impl DistanceMatrix {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances[i * self.len() + j]
    }

    pub fn similarity(&self, i: usize, j: usize) -> f64 {
        1. - self.distance(i, j)
    }

    /// Distance between two strains by name.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.distance(self.index_of(a)?, self.index_of(b)?))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics, and an empty matrix has no rows anyway
        self.distances.chunks(self.len().max(1))
    }

    /// Upper triangle in row-major order, the layout clustering routines
    /// (e.g. scipy's `linkage`) expect.
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.len();
        let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                condensed.push(self.distance(i, j));
            }
        }
        condensed
    }

    /// Write the matrix as CSV, with a header row of strain names.
    pub fn to_csv_writer<W: io::Write>(&self, wtr: W) -> Result<(), Error> {
        let mut wtr = csv::Writer::from_writer(wtr);

        let mut header = Vec::with_capacity(self.len() + 1);
        header.push("");
        header.extend(self.names.iter().map(String::as_str));
        wtr.write_record(&header)?;

        for (name, row) in self.names.iter().zip(self.rows()) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(name.clone());
            record.extend(row.iter().map(|d| d.to_string()));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

/// Build the distance matrix of every strain against every other.
///
/// Each unordered pair is estimated once and mirrored. Strains are ordered
/// by name.
pub fn build_distance_matrix(
    sketches: &BTreeMap<String, HyperLogLog>,
) -> Result<DistanceMatrix, Error> {
    build_distance_matrix_with(sketches, Estimator::default())
}

pub fn build_distance_matrix_with(
    sketches: &BTreeMap<String, HyperLogLog>,
    estimator: Estimator,
) -> Result<DistanceMatrix, Error> {
    let names: Vec<String> = sketches.keys().cloned().collect();
    let hlls: Vec<&HyperLogLog> = sketches.values().collect();
    let n = hlls.len();

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();

    let compute = |&(i, j): &(usize, usize)| -> Result<(usize, usize, f64), Error> {
        let similarity = hlls[i].similarity_with(hlls[j], estimator)?;
        Ok((i, j, 1. - similarity))
    };

    let computed: Result<Vec<_>, Error>;
    cfg_if! {
        if #[cfg(feature = "parallel")] {
            computed = pairs.par_iter().map(compute).collect();
        } else {
            computed = pairs.iter().map(compute).collect();
        }
    }

    let mut distances = vec![0.; n * n];
    for (i, j, d) in computed? {
        distances[i * n + j] = d;
        distances[j * n + i] = d;
    }

    Ok(DistanceMatrix { names, distances })
}

/// Similarity of a new strain to each existing one, most similar first.
pub fn compare_with_existing(
    query: &HyperLogLog,
    existing: &BTreeMap<String, HyperLogLog>,
) -> Result<Vec<(String, f64)>, Error> {
    compare_with_existing_with(query, existing, Estimator::default())
}

pub fn compare_with_existing_with(
    query: &HyperLogLog,
    existing: &BTreeMap<String, HyperLogLog>,
    estimator: Estimator,
) -> Result<Vec<(String, f64)>, Error> {
    let mut similarities = existing
        .iter()
        .map(|(name, hll)| Ok((name.clone(), query.similarity_with(hll, estimator)?)))
        .collect::<Result<Vec<_>, Error>>()?;

    similarities.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(similarities)
}
