use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use strainsketch::cmd::{compare, compute, query, sketch_file, ComputeParameters};
use strainsketch::sketch::hyperloglog::HyperLogLog;
use strainsketch::sketch::{Estimator, SketchConfig};
use strainsketch::Error;

fn random_sequence(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn fasta(records: &[(&str, &[u8])]) -> Vec<u8> {
    let mut content = Vec::new();
    for (name, seq) in records {
        content.push(b'>');
        content.extend_from_slice(name.as_bytes());
        content.push(b'\n');
        for line in seq.chunks(60) {
            content.extend_from_slice(line);
            content.push(b'\n');
        }
    }
    content
}

fn write_fasta(path: &Path, records: &[(&str, &[u8])]) {
    fs::write(path, fasta(records)).unwrap();
}

fn write_gzipped_fasta(path: &Path, records: &[(&str, &[u8])]) {
    let mut buffer = vec![];
    {
        let mut writer = niffler::get_writer(
            Box::new(&mut buffer),
            niffler::compression::Format::Gzip,
            niffler::compression::Level::One,
        )
        .unwrap();
        writer.write_all(&fasta(records)).unwrap();
    }
    assert_eq!(&buffer[..2], &[0x1f, 0x8b]);
    fs::write(path, buffer).unwrap();
}

fn params(output_dir: PathBuf) -> ComputeParameters {
    ComputeParameters::builder()
        .sketch(SketchConfig::builder().precision(12).ksize(11).build())
        .output_dir(output_dir)
        .build()
}

struct Strains {
    dir: TempDir,
    files: Vec<PathBuf>,
    ha: Vec<u8>,
    na: Vec<u8>,
}

fn strains() -> Strains {
    let mut rng = StdRng::seed_from_u64(1957);
    let ha = random_sequence(&mut rng, 1000);
    let na = random_sequence(&mut rng, 800);
    let other = random_sequence(&mut rng, 1000);

    let dir = TempDir::new().unwrap();
    let files = vec![
        dir.path().join("H1N1.fasta"),
        dir.path().join("H1N1_copy.fa"),
        dir.path().join("H3N2.fasta"),
    ];
    write_fasta(&files[0], &[("HA", &ha[..]), ("NA", &na[..])]);
    write_fasta(&files[1], &[("HA", &ha[..]), ("NA", &na[..])]);
    write_fasta(&files[2], &[("HA", &other[..])]);

    Strains { dir, files, ha, na }
}

#[test]
fn compute_writes_one_sketch_per_file() {
    let strains = strains();
    let out = strains.dir.path().join("sketches");
    let params = params(out.clone());

    let mut saved = compute(&strains.files, &params).unwrap();
    saved.sort();
    assert_eq!(
        saved,
        vec![
            out.join("H1N1.hll"),
            out.join("H1N1_copy.hll"),
            out.join("H3N2.hll"),
        ]
    );

    let hll = HyperLogLog::from_path(out.join("H1N1.hll")).unwrap();
    assert_eq!(hll.ksize(), 11);
    assert_eq!(hll.precision(), 12);
    // both records, 990 + 790 windows
    assert_eq!(hll.n_added(), 1780);
}

#[test]
fn records_are_merged_into_one_sketch() {
    let strains = strains();
    let params = params(strains.dir.path().to_path_buf());

    let h1n1 = sketch_file(&strains.files[0], &params).unwrap();

    let mut by_hand = HyperLogLog::from_config(&params.sketch()).unwrap();
    by_hand.add_sequence(&strains.ha, false).unwrap();
    by_hand.add_sequence(&strains.na, false).unwrap();
    assert_eq!(h1n1, by_hand);

    let mut ha_only = HyperLogLog::from_config(&params.sketch()).unwrap();
    ha_only.add_sequence(&strains.ha, false).unwrap();
    assert!(h1n1.n_added() > ha_only.n_added());
    assert!(h1n1.estimate() > ha_only.estimate());
}

#[test]
fn gzipped_fasta() {
    let strains = strains();
    let gz = strains.dir.path().join("H1N1.fa.gz");
    write_gzipped_fasta(&gz, &[("HA", &strains.ha[..]), ("NA", &strains.na[..])]);

    let params = params(strains.dir.path().join("sketches"));
    let plain = sketch_file(&strains.files[0], &params).unwrap();
    assert_eq!(sketch_file(&gz, &params).unwrap(), plain);

    let saved = compute(&[gz], &params).unwrap();
    assert_eq!(saved, vec![params.output_dir().join("H1N1.hll")]);
    assert_eq!(HyperLogLog::from_path(&saved[0]).unwrap(), plain);
}

#[test]
fn ambiguous_bases_are_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ambiguous.fasta");
    write_fasta(&path, &[("seg4", &b"ACGTACGTACGTNNACGTACGTAC"[..])]);

    let p = params(dir.path().to_path_buf());
    let hll = sketch_file(&path, &p).unwrap();
    // two 11-mers before the Ns, none fit after them
    assert_eq!(hll.n_added(), 2);

    let mut strict = p.clone();
    strict.set_force(false);
    assert!(matches!(
        sketch_file(&path, &strict),
        Err(Error::InvalidDNA { .. })
    ));
}

#[test]
fn compare_stored_strains() {
    let strains = strains();
    let out = strains.dir.path().join("sketches");
    let params = params(out.clone());
    compute(&strains.files, &params).unwrap();

    let matrix = compare(&out, &params).unwrap();
    assert_eq!(matrix.names(), &["H1N1", "H1N1_copy", "H3N2"]);
    assert_eq!(matrix.get("H1N1", "H1N1_copy"), Some(0.));
    assert_eq!(matrix.get("H1N1", "H1N1"), Some(0.));

    let unrelated = matrix.get("H1N1", "H3N2").unwrap();
    assert!(unrelated > 0.9, "{}", unrelated);
    assert_eq!(matrix.get("H3N2", "H1N1"), Some(unrelated));

    let mut csv = Vec::new();
    matrix.to_csv_writer(&mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with(",H1N1,H1N1_copy,H3N2\n"));
}

#[test]
fn compare_with_mle_estimator() {
    let strains = strains();
    let out = strains.dir.path().join("sketches");
    let mut params = params(out.clone());
    compute(&strains.files, &params).unwrap();

    params.set_sketch(
        SketchConfig::builder()
            .precision(12)
            .ksize(11)
            .estimator(Estimator::Mle)
            .build(),
    );
    let matrix = compare(&out, &params).unwrap();
    assert_eq!(matrix.get("H1N1", "H1N1_copy"), Some(0.));
    assert!(matrix.get("H1N1", "H3N2").unwrap() > 0.9);
}

#[test]
fn query_new_strain() {
    let strains = strains();
    let out = strains.dir.path().join("sketches");
    let params = params(out.clone());
    compute(&strains.files, &params).unwrap();

    let new_strain = strains.dir.path().join("new.fasta");
    write_fasta(&new_strain, &[("HA", &strains.ha[..])]);

    let results = query(&new_strain, &out, &params).unwrap();
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["H1N1", "H1N1_copy", "H3N2"]);

    // the HA segment is a bit over half of H1N1's k-mers
    let best = results[0].1;
    assert!((best - 990. / 1780.).abs() < 0.1, "{}", best);
    assert!(results[2].1 < 0.1);
}

#[test]
fn missing_inputs() {
    let dir = TempDir::new().unwrap();
    let params = params(dir.path().join("sketches"));

    assert!(matches!(
        compute(&[dir.path().join("absent.fasta")], &params),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        compare(dir.path().join("absent"), &params),
        Err(Error::NotFound { .. })
    ));
}
