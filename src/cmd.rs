use std::fs::{DirBuilder, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use cfg_if::cfg_if;
use getset::{CopyGetters, Getters, Setters};
use log::{debug, info, warn};
use needletail::{parse_fastx_reader, Sequence};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::compare::{build_distance_matrix_with, compare_with_existing_with, DistanceMatrix};
use crate::sketch::hyperloglog::HyperLogLog;
use crate::sketch::SketchConfig;
use crate::storage::{load_all, FSStorage, LoadReport, SketchStore};
use crate::Error;

const FASTA_EXTENSIONS: [&str; 6] = ["gz", "fasta", "fa", "fna", "fas", "ffn"];

#[derive(Debug, Clone, TypedBuilder, CopyGetters, Getters, Setters, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeParameters {
    #[getset(get_copy = "pub", set = "pub")]
    #[builder(default)]
    sketch: SketchConfig,

    /// Skip k-mers with ambiguous bases instead of failing.
    #[getset(get_copy = "pub", set = "pub")]
    #[builder(default = true)]
    force: bool,

    #[getset(get = "pub", set = "pub")]
    #[builder(default = PathBuf::from("."), setter(into))]
    output_dir: PathBuf,
}

impl Default for ComputeParameters {
    fn default() -> Self {
        ComputeParameters::builder().build()
    }
}

impl ComputeParameters {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ComputeParameters, Error> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Strain name for a sequence file: the file name without FASTA or
/// compression extensions.
pub fn strain_name_for<P: AsRef<Path>>(path: P) -> String {
    let mut name = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    while let Some((stem, ext)) = name.rsplit_once('.') {
        if stem.is_empty() || !FASTA_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            break;
        }
        name = stem.to_string();
    }
    name
}

/// Raw contents of a sequence file, gunzipped if needed.
fn read_sequences(path: &Path) -> Result<Vec<u8>, Error> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            path: path.display().to_string(),
        },
        _ => e.into(),
    })?;

    let mut raw = Vec::new();
    BufReader::new(file).read_to_end(&mut raw)?;

    // too short to carry a compression header
    if raw.len() < 5 {
        return Ok(raw);
    }

    let (mut rdr, _format) = niffler::get_reader(Box::new(io::Cursor::new(raw)))?;
    let mut data = Vec::new();
    rdr.read_to_end(&mut data)?;
    Ok(data)
}

/// Build one sketch from every record in a FASTA/FASTQ file, plain or
/// gzipped.
pub fn sketch_file<P: AsRef<Path>>(
    path: P,
    params: &ComputeParameters,
) -> Result<HyperLogLog, Error> {
    let path = path.as_ref();
    let mut hll = HyperLogLog::from_config(&params.sketch())?;

    let mut parser = parse_fastx_reader(io::Cursor::new(read_sequences(path)?))?;
    let mut n_records = 0;
    while let Some(record) = parser.next() {
        let record = record?;
        let norm_seq = record.normalize(false);
        hll.add_sequence(&norm_seq, params.force())?;
        n_records += 1;
    }

    if n_records == 0 {
        warn!("no sequences found in {}", path.display());
    }
    debug!(
        "{}: {} records, {} k-mers, ~{} distinct",
        path.display(),
        n_records,
        hll.n_added(),
        hll.cardinality()
    );
    Ok(hll)
}

/// Sketch each sequence file and save it as `<output_dir>/<strain>.hll`.
pub fn compute<P: AsRef<Path> + Sync>(
    files: &[P],
    params: &ComputeParameters,
) -> Result<Vec<PathBuf>, Error> {
    DirBuilder::new()
        .recursive(true)
        .create(params.output_dir())?;
    let store = SketchStore::new(FSStorage::new(params.output_dir()));

    info!(
        "Computing sketches for {} files with k={}, p={}",
        files.len(),
        params.sketch().ksize(),
        params.sketch().precision()
    );

    let process = |filename: &P| -> Result<PathBuf, Error> {
        let filename = filename.as_ref();
        let name = strain_name_for(filename);
        let hll = sketch_file(filename, params)?;
        let saved = store.save_sketch(&name, &hll)?;
        info!("saved sketch for {} to {}", name, saved);
        Ok(params.output_dir().join(saved))
    };

    let saved: Result<Vec<PathBuf>, Error>;
    cfg_if! {
        if #[cfg(feature = "parallel")] {
            saved = files.par_iter().map(process).collect();
        } else {
            saved = files.iter().map(process).collect();
        }
    }
    saved
}

fn report_failures(report: &LoadReport) {
    for failure in &report.failures {
        warn!("skipped {}: {}", failure.path, failure.error);
    }
}

/// Distance matrix of every sketch stored in `sketch_dir`.
pub fn compare<P: AsRef<Path>>(
    sketch_dir: P,
    params: &ComputeParameters,
) -> Result<DistanceMatrix, Error> {
    let report = load_all(sketch_dir.as_ref())?;
    report_failures(&report);

    info!("comparing {} sketches", report.sketches.len());
    build_distance_matrix_with(&report.sketches, params.sketch().estimator())
}

/// Jaccard similarity of a new strain against every sketch in `sketch_dir`,
/// most similar first.
pub fn query<P: AsRef<Path>, Q: AsRef<Path>>(
    sequence_file: P,
    sketch_dir: Q,
    params: &ComputeParameters,
) -> Result<Vec<(String, f64)>, Error> {
    let query = sketch_file(sequence_file.as_ref(), params)?;

    let report = load_all(sketch_dir.as_ref())?;
    report_failures(&report);

    compare_with_existing_with(&query, &report.sketches, params.sketch().estimator())
}
