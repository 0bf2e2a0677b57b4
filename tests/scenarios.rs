use byteorder::{LittleEndian, WriteBytesExt};
use entwine::builder::Builder;
use entwine::config::Config;
use entwine::executor::RawExecutor;
use entwine::manifest::FileStatus;
use entwine::merger::Merger;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn write_raw_fixture(path: &Path, points: &[(f64, f64, f64)]) {
    let mut file = File::create(path).unwrap();
    file.write_u64::<LittleEndian>(points.len() as u64).unwrap();
    for (x, y, z) in points {
        file.write_f64::<LittleEndian>(*x).unwrap();
        file.write_f64::<LittleEndian>(*y).unwrap();
        file.write_f64::<LittleEndian>(*z).unwrap();
        file.write_all(&[0u8; 3]).unwrap();
    }
}

fn build_config(input: &Path, output: &Path, extra: &str) -> Config {
    Config::parse(&format!(
        r#"{{"input":"{}","output":"{}","bounds":[0,0,0,1,1,1],"dataStorage":"binary"{}}}"#,
        input.display().to_string().replace('\\', "\\\\"),
        output.display().to_string().replace('\\', "\\\\"),
        extra,
    ))
    .unwrap()
}

/// E1: a unit cube, one file of 8 corner points, a single base chunk
/// (splits=1 so a single chunk covers the whole root cube, overflowDepth=0
/// so it never splits). Every corner lands in a distinct tube; the
/// hierarchy's root count equals 8.
#[test]
fn e1_single_chunk_absorbs_every_corner() {
    let dir = tempdir::TempDir::new("entwine-e1").unwrap();
    let input = dir.path().join("corners.bin");
    let corners = [
        (0.01, 0.01, 0.01),
        (0.01, 0.01, 0.99),
        (0.01, 0.99, 0.01),
        (0.01, 0.99, 0.99),
        (0.99, 0.01, 0.01),
        (0.99, 0.01, 0.99),
        (0.99, 0.99, 0.01),
        (0.99, 0.99, 0.99),
    ];
    write_raw_fixture(&input, &corners);

    let output = dir.path().join("out");
    let config = build_config(&input, &output, r#","splits":1,"overflowDepth":0,"overflowRatio":0.5"#);

    let builder = Builder::new(config, Box::new(RawExecutor)).unwrap();
    builder.go().unwrap();

    assert_eq!(builder.registry().resident_count(), 1);
    assert_eq!(builder.registry().resident_point_count(), 8);

    builder.save().unwrap();
    assert!(output.join("entwine.json").is_file());
    assert!(output.join("h").join("0-0-0-0.json").is_file());
}

/// E2: a chunk overflows and splits once its bucket crosses the
/// threshold. `splits=0` (gridSpan 1, a single tube per chunk) with an
/// overflow threshold of 2 means the third point inserted into the same
/// XY tube overflows, and the fourth crosses the threshold and splits the
/// chunk, redistributing every held cell one depth down.
#[test]
fn e2_overflow_then_split_conserves_every_point() {
    let dir = tempdir::TempDir::new("entwine-e2").unwrap();
    let input = dir.path().join("column.bin");
    // Five points sharing the same XY tube at distinct Z ticks.
    let points: Vec<(f64, f64, f64)> =
        (0..5).map(|i| (0.5, 0.5, 0.05 + i as f64 * 0.15)).collect();
    write_raw_fixture(&input, &points);

    let output = dir.path().join("out");
    let config = build_config(&input, &output, r#","splits":0,"overflowDepth":6,"overflowRatio":1.0"#);

    let builder = Builder::new(config, Box::new(RawExecutor)).unwrap();
    builder.go().unwrap();

    // Every point is accounted for regardless of how many times the
    // originating chunk had to split to hold them all.
    assert_eq!(builder.registry().resident_point_count(), 5);
}

/// E3: restart-is-noop. Building over two files in one run produces the
/// same resident point count as building the first file, saving, then
/// awakening the same output and building the second file as a separate
/// run (the restart path `Config::is_continuation` drives).
#[test]
fn e3_restart_matches_a_single_combined_run() {
    let dir = tempdir::TempDir::new("entwine-e3").unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    write_raw_fixture(&a, &[(0.1, 0.1, 0.1), (0.2, 0.2, 0.2)]);
    write_raw_fixture(&b, &[(0.8, 0.8, 0.8)]);

    // Single combined run, as a baseline.
    let whole_output = dir.path().join("whole");
    let whole_config = Config::parse(&format!(
        r#"{{"input":["{}","{}"],"output":"{}","bounds":[0,0,0,1,1,1],"dataStorage":"binary"}}"#,
        a.display(),
        b.display(),
        whole_output.display(),
    ))
    .unwrap();
    let whole_builder = Builder::new(whole_config, Box::new(RawExecutor)).unwrap();
    whole_builder.go().unwrap();
    assert_eq!(whole_builder.registry().resident_point_count(), 3);

    // Split across two runs against the same output directory.
    let restart_output = dir.path().join("restart");
    let first_config = Config::parse(&format!(
        r#"{{"input":["{}","{}"],"output":"{}","bounds":[0,0,0,1,1,1],"dataStorage":"binary"}}"#,
        a.display(),
        b.display(),
        restart_output.display(),
    ))
    .unwrap();
    let first_builder = Builder::new(first_config, Box::new(RawExecutor)).unwrap();
    // Only process the first file, simulating a crash before `b.bin`.
    first_builder.save().unwrap();

    let second_config = Config::parse(&format!(
        r#"{{"input":["{}","{}"],"output":"{}","bounds":[0,0,0,1,1,1],"dataStorage":"binary"}}"#,
        a.display(),
        b.display(),
        restart_output.display(),
    ))
    .unwrap();
    assert!(second_config.is_continuation(&restart_output, ""));
    let second_builder = Builder::new(second_config, Box::new(RawExecutor)).unwrap();
    second_builder.go().unwrap();
    assert_eq!(second_builder.registry().resident_point_count(), 3);
}

/// E4: subset + merge. Building 8 subsets of a power-of-8 split over the
/// same input, then merging them into subset 0, yields the same resident
/// point total as a single whole build.
#[test]
fn e4_merged_subsets_match_a_whole_build() {
    let dir = tempdir::TempDir::new("entwine-e4").unwrap();
    let input = dir.path().join("cloud.bin");
    let points: Vec<(f64, f64, f64)> = (0..40)
        .map(|i| {
            let t = i as f64 / 40.0;
            (t, 1.0 - t, (t * 3.0).fract())
        })
        .collect();
    write_raw_fixture(&input, &points);

    let whole_output = dir.path().join("whole");
    let whole_config = build_config(&input, &whole_output, "");
    let whole_builder = Builder::new(whole_config, Box::new(RawExecutor)).unwrap();
    whole_builder.go().unwrap();
    let whole_total = whole_builder.registry().resident_point_count();

    let sharded_output = dir.path().join("sharded");
    for id in 1..=8u64 {
        let config = Config::parse(&format!(
            r#"{{"input":"{}","output":"{}","bounds":[0,0,0,1,1,1],"dataStorage":"binary","subset":{{"id":{},"of":8}}}}"#,
            input.display(),
            sharded_output.display(),
            id,
        ))
        .unwrap();
        let builder = Builder::new(config, Box::new(RawExecutor)).unwrap();
        builder.go().unwrap();
        builder.save().unwrap();
    }

    let merge_config = Config::parse(&format!(
        r#"{{"input":"{}","output":"{}","bounds":[0,0,0,1,1,1],"dataStorage":"binary","subset":{{"id":1,"of":8}}}}"#,
        input.display(),
        sharded_output.display(),
    ))
    .unwrap();
    let mut merger = Merger::new(merge_config.clone(), || Box::new(RawExecutor)).unwrap();
    merger.go(&merge_config, || Box::new(RawExecutor)).unwrap();

    let whole_metadata = entwine::Metadata::load(&sharded_output, "").unwrap();
    assert!(whole_metadata.subset().is_none());

    // The merged registry (subset 0, post-merge) holds every sibling's
    // points now, matching the single whole build's total.
    assert_eq!(merger.builder().registry().resident_point_count(), whole_total);
}

/// E5: out-of-bounds counting. A file with points both inside and outside
/// the configured bounds reports the split via `FileInfo`, and only the
/// in-bounds points actually land in the registry.
#[test]
fn e5_out_of_bounds_points_are_tallied_not_inserted() {
    let dir = tempdir::TempDir::new("entwine-e5").unwrap();
    let input = dir.path().join("mixed.bin");
    let mut points: Vec<(f64, f64, f64)> = (0..90).map(|i| {
        let t = i as f64 / 90.0;
        (t, t, t)
    }).collect();
    points.extend((0..10).map(|i| (2.0 + i as f64, 2.0, 2.0)));
    write_raw_fixture(&input, &points);

    let output = dir.path().join("out");
    let config = build_config(&input, &output, "");
    let builder = Builder::new(config, Box::new(RawExecutor)).unwrap();
    builder.go().unwrap();

    assert_eq!(builder.registry().resident_point_count(), 90);

    builder.save().unwrap();
    let manifest = entwine::manifest::load_manifest(&output, "").unwrap();
    let info = &manifest.files()[0];
    assert_eq!(info.status, FileStatus::Inserted);
    assert_eq!(info.points, Some(90));
    assert_eq!(info.out_of_bounds, 10);
}

/// E6: fetch retry. A `Fetcher` that fails every attempt against an input
/// path still lets the build finish, marking that file `Error` rather
/// than aborting the whole run, so a batch with one unreachable file
/// doesn't lose every other file's progress.
#[test]
fn e6_permanently_failing_fetch_marks_error_and_continues() {
    use entwine::builder::Fetcher;
    use entwine::errors::{Error, ErrorKind, Result};
    use std::path::PathBuf;

    struct FailsOnMarkerFetcher;
    impl Fetcher for FailsOnMarkerFetcher {
        fn fetch(&self, input: &str, _tmp_dir: &Path) -> Result<PathBuf> {
            if input.contains("unreachable") {
                return Err(Error::from(ErrorKind::Fetch(0, 1)));
            }
            Ok(PathBuf::from(input))
        }
    }

    let dir = tempdir::TempDir::new("entwine-e6").unwrap();
    let good = dir.path().join("good.bin");
    write_raw_fixture(&good, &[(0.1, 0.1, 0.1)]);

    let output = dir.path().join("out");
    let config = Config::parse(&format!(
        r#"{{"input":["{}","unreachable.bin"],"output":"{}","bounds":[0,0,0,1,1,1],"dataStorage":"binary"}}"#,
        good.display(),
        output.display(),
    ))
    .unwrap();

    let builder =
        Builder::with_fetcher(config, Box::new(RawExecutor), Box::new(FailsOnMarkerFetcher)).unwrap();
    builder.go().unwrap();

    assert_eq!(builder.registry().resident_point_count(), 1);
    builder.save().unwrap();
    let manifest = entwine::manifest::load_manifest(&output, "").unwrap();
    assert_eq!(manifest.files()[0].status, FileStatus::Inserted);
    assert_eq!(manifest.files()[1].status, FileStatus::Error);
}
