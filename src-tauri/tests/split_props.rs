//! Property-based tests for splitting
//!
//! Splitting any well-formed CSV must preserve every record, in order, across
//! `ceil(R / K)` files, each starting with the header when there is one.

use std::fs;
use std::path::Path;

use csv_splitter::streaming::{Record, RecordReader};
use csv_splitter::{ProgressEvent, ProgressFn, SplitConfig, SplitParams, SplitRequest, Splitter};
use proptest::prelude::*;
use std::sync::Mutex;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

/// Fields mixing plain text with commas, quotes and embedded newlines.
/// The first character is never special so a one-column record is never blank.
fn field_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9]{1,12}".prop_map(|s| s),
        "[a-z][a-z0-9 ,\"\n]{0,10}".prop_map(|s| s),
        Just("x, \"quoted\"\nnext line".to_string()),
        Just("世界".to_string()),
    ]
}

/// A table of `rows` records, all with the same column count.
fn table_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    (1usize..5).prop_flat_map(|columns| {
        prop::collection::vec(prop::collection::vec(field_strategy(), columns), 1..60)
    })
}

fn write_input(path: &Path, header: Option<&[String]>, rows: &[Vec<String>]) {
    let mut writer = csv::Writer::from_path(path).expect("Failed to create input");
    if let Some(header) = header {
        writer.write_record(header).unwrap();
    }
    for row in rows {
        writer.write_record(row).unwrap();
    }
    writer.flush().unwrap();
}

fn read_records(path: &Path) -> Vec<Record> {
    let bytes = fs::read(path).expect("Failed to read output");
    RecordReader::new(bytes.as_slice())
        .map(|r| r.expect("Output is not valid CSV"))
        .collect()
}

fn split(
    input: &Path,
    output: &Path,
    rows_per_file: usize,
    has_header: bool,
    config: SplitConfig,
) -> csv_splitter::SplitOutcome {
    let request = SplitRequest::validate(&SplitParams {
        input_path: input.to_string_lossy().into_owned(),
        output_dir: output.to_string_lossy().into_owned(),
        rows_per_file,
        has_header,
        convert_to_excel: false,
        job_id: None,
    })
    .expect("Request should be valid");

    Splitter::new(config).run(&request, &(), &CancellationToken::new())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // Concatenating the data rows of every output, in index order, reproduces
    // the input exactly.
    #[test]
    fn prop_split_preserves_records(
        rows in table_strategy(),
        rows_per_file in 1usize..20,
        has_header in any::<bool>(),
    ) {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        let header: Vec<String> = (0..rows[0].len()).map(|i| format!("col{}", i)).collect();
        write_input(&input, has_header.then_some(header.as_slice()), &rows);

        let outcome = split(&input, &dir.path().join("out"), rows_per_file, has_header, SplitConfig::default());
        prop_assert!(outcome.is_success(), "split failed: {:?}", outcome.error);

        let expected_files = rows.len().div_ceil(rows_per_file);
        prop_assert_eq!(outcome.files.len(), expected_files);
        prop_assert_eq!(outcome.data_rows, rows.len() as u64);

        let mut rebuilt = Vec::new();
        for file in &outcome.files {
            let mut records = read_records(&file.path);
            if has_header {
                prop_assert_eq!(&records[0], &Record::from(header.clone()));
                records.remove(0);
            }
            prop_assert!(!records.is_empty());
            prop_assert!(records.len() <= rows_per_file);
            rebuilt.extend(records.into_iter().map(Record::into_fields));
        }
        prop_assert_eq!(rebuilt, rows);
    }

    // The background writer produces byte-identical files.
    #[test]
    fn prop_pipelined_output_is_identical(
        rows in table_strategy(),
        rows_per_file in 1usize..10,
        depth in 1usize..4,
    ) {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        write_input(&input, None, &rows);

        let sequential = split(&input, &dir.path().join("seq"), rows_per_file, false, SplitConfig::default());
        let pipelined = split(
            &input,
            &dir.path().join("pipe"),
            rows_per_file,
            false,
            SplitConfig::default().write_queue_depth(depth),
        );

        prop_assert!(pipelined.is_success());
        prop_assert_eq!(sequential.files.len(), pipelined.files.len());
        for (a, b) in sequential.files.iter().zip(&pipelined.files) {
            prop_assert_eq!(a.path.file_name(), b.path.file_name());
            prop_assert_eq!(fs::read(&a.path).unwrap(), fs::read(&b.path).unwrap());
        }
    }

    // Progress starts at 0, ends at 100 and never goes backwards.
    #[test]
    fn prop_progress_is_monotonic(
        rows in table_strategy(),
        rows_per_file in 1usize..10,
    ) {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.csv");
        write_input(&input, None, &rows);

        let request = SplitRequest::validate(&SplitParams {
            input_path: input.to_string_lossy().into_owned(),
            output_dir: dir.path().join("out").to_string_lossy().into_owned(),
            rows_per_file,
            has_header: false,
            convert_to_excel: false,
            job_id: None,
        })
        .unwrap();

        let seen = Mutex::new(Vec::new());
        let reporter = ProgressFn(|e: &ProgressEvent| seen.lock().unwrap().push(e.percent));
        let outcome = Splitter::default().run(&request, &reporter, &CancellationToken::new());
        prop_assert!(outcome.is_success());

        let percents = seen.into_inner().unwrap();
        prop_assert_eq!(percents.first().copied(), Some(0));
        prop_assert_eq!(percents.last().copied(), Some(100));
        prop_assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }
}
