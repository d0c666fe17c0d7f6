use std::collections::{BTreeMap, HashMap};
use std::fs::{DirBuilder, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info, warn};

use crate::sketch::hyperloglog::HyperLogLog;
use crate::Error;

/// File extension of stored sketches.
pub const SKETCH_EXTENSION: &str = "hll";

/// An abstraction for any place where we can store data.
pub trait Storage {
    /// Save bytes into path, replacing previous content
    fn save(&self, path: &str, content: &[u8]) -> Result<String, Error>;

    /// Load bytes from path
    fn load(&self, path: &str) -> Result<Vec<u8>, Error>;

    /// Paths of everything stored, in sorted order
    fn list(&self) -> Result<Vec<String>, Error>;
}

/// Store files locally into a directory
#[derive(Debug, Clone)]
pub struct FSStorage {
    /// path for the directory where data is saved.
    fullpath: PathBuf,
}

impl FSStorage {
    pub fn new<P: AsRef<Path>>(location: P) -> FSStorage {
        FSStorage {
            fullpath: location.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.fullpath
    }
}

fn not_found(path: &Path, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            path: path.display().to_string(),
        },
        _ => err.into(),
    }
}

impl Storage for FSStorage {
    fn save(&self, path: &str, content: &[u8]) -> Result<String, Error> {
        if path.is_empty() {
            return Err(Error::IOError(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Path can't be empty",
            )));
        }

        let fpath = self.fullpath.join(path);
        if let Some(parent) = fpath.parent() {
            DirBuilder::new().recursive(true).create(parent)?;
        }

        let file = File::create(&fpath)?;
        let mut buf_writer = BufWriter::new(file);
        buf_writer.write_all(content)?;
        buf_writer.flush()?;
        Ok(path.into())
    }

    fn load(&self, path: &str) -> Result<Vec<u8>, Error> {
        let path = self.fullpath.join(path);
        let file = File::open(&path).map_err(|e| not_found(&path, e))?;
        let mut buf_reader = BufReader::new(file);
        let mut contents = Vec::new();
        buf_reader.read_to_end(&mut contents)?;
        Ok(contents)
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        let entries = std::fs::read_dir(&self.fullpath).map_err(|e| not_found(&self.fullpath, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => paths.push(name),
                Err(name) => warn!("skipping non UTF-8 file name {:?}", name),
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[derive(Default)]
pub struct MemStorage {
    storage: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemStorage {
    pub fn new() -> MemStorage {
        MemStorage::default()
    }
}

impl Storage for MemStorage {
    fn save(&self, path: &str, content: &[u8]) -> Result<String, Error> {
        let mut lock = self.storage.lock().unwrap();
        lock.insert(path.into(), content.into());
        Ok(path.into())
    }

    fn load(&self, path: &str) -> Result<Vec<u8>, Error> {
        let lock = self.storage.lock().unwrap();
        let v = lock.get(path).ok_or_else(|| Error::NotFound { path: path.into() })?;
        Ok(v.clone())
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        let lock = self.storage.lock().unwrap();
        let mut paths: Vec<String> = lock.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

/// A file that could not be turned into a sketch.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: String,
    pub error: Error,
}

/// Result of loading every sketch from a storage.
///
/// Sketches are keyed by strain name (the file stem).
#[derive(Debug, Default)]
pub struct LoadReport {
    pub sketches: BTreeMap<String, HyperLogLog>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Strain-name keyed access to sketches held in a [`Storage`].
pub struct SketchStore<S: Storage> {
    storage: S,
}

impl<S: Storage> SketchStore<S> {
    pub fn new(storage: S) -> SketchStore<S> {
        SketchStore { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn path_for(name: &str) -> String {
        format!("{}.{}", name, SKETCH_EXTENSION)
    }

    pub fn save_sketch(&self, name: &str, hll: &HyperLogLog) -> Result<String, Error> {
        let mut buffer = Vec::with_capacity(hll.size() + 32);
        hll.to_writer(&mut buffer)?;
        self.storage.save(&Self::path_for(name), &buffer)
    }

    pub fn load_sketch(&self, name: &str) -> Result<HyperLogLog, Error> {
        let data = self.storage.load(&Self::path_for(name))?;
        HyperLogLog::from_reader(&data[..])
    }

    /// Strain names of every stored sketch.
    pub fn names(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .storage
            .list()?
            .iter()
            .filter_map(|path| strain_name(path))
            .collect())
    }

    /// Load every sketch, collecting per-file failures instead of stopping at
    /// the first one.
    pub fn load_all(&self) -> Result<LoadReport, Error> {
        let mut report = LoadReport::default();

        for path in self.storage.list()? {
            let name = match strain_name(&path) {
                Some(name) => name,
                None => {
                    debug!("ignoring {}", path);
                    continue;
                }
            };

            let loaded = self
                .storage
                .load(&path)
                .and_then(|data| HyperLogLog::from_reader(&data[..]));

            match loaded {
                Ok(hll) => {
                    report.sketches.insert(name, hll);
                }
                Err(error) => {
                    warn!("failed to load sketch {}: {}", path, error);
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        info!(
            "loaded {} sketches ({} failed)",
            report.sketches.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// Strain name for a sketch path, `None` if it is not a sketch file.
pub fn strain_name(path: &str) -> Option<String> {
    let path = Path::new(path);
    match path.extension() {
        Some(ext) if ext == SKETCH_EXTENSION => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(String::from),
        _ => None,
    }
}

/// Load every `*.hll` sketch in `directory`.
pub fn load_all<P: AsRef<Path>>(directory: P) -> Result<LoadReport, Error> {
    SketchStore::new(FSStorage::new(directory)).load_all()
}
