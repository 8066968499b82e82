//! Property-based tests for the index builder and the folder loader

use cft_dataset::index::DatasetIndex;
use cft_dataset::io::SubjectCondition;
use cft_dataset::storage::load_recording_folder;
use proptest::prelude::*;
use std::io::Write;

fn write_recording(dir: &std::path::Path, name: &str, sampling_rate: usize, rows: usize) {
    let mut file = std::fs::File::create(dir.join(name)).unwrap();
    writeln!(file, "# sampling_rate_hz: {sampling_rate}").unwrap();
    writeln!(file, "ecg").unwrap();
    for row in 0..rows {
        writeln!(file, "{}", row as f64).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the trimmed table is exactly floor(sampling_rate)
    /// samples shorter than the parsed recording.
    #[test]
    fn prop_tail_trim_length(
        rows in 0usize..400,
        sampling_rate in 1usize..128,
    ) {
        let dir = tempfile::tempdir().unwrap();
        write_recording(dir.path(), "a.csv", sampling_rate, rows);

        let session = load_recording_folder(dir.path(), None, None).unwrap();
        let batch = session.phase("Part0").unwrap();
        prop_assert_eq!(batch.num_rows(), rows.saturating_sub(sampling_rate));
    }

    /// Property: the raw index is the full cartesian product, one row
    /// per (subject, phase) pair.
    #[test]
    fn prop_index_is_cartesian_product(
        subject_count in 1usize..20,
        phase_count in 1usize..6,
    ) {
        let conditions: Vec<SubjectCondition> = (0..subject_count)
            .map(|idx| SubjectCondition {
                subject: format!("Vp{idx:02}"),
                condition: if idx % 2 == 0 { "CFT".into() } else { "Control".into() },
            })
            .collect();
        let phases: Vec<String> = (0..phase_count).map(|idx| format!("Phase{idx}")).collect();

        let index = DatasetIndex::from_condition_product(&conditions, &phases);
        prop_assert_eq!(index.len(), subject_count * phase_count);
        prop_assert_eq!(index.subjects().len(), subject_count);
        prop_assert_eq!(index.phases().len(), phase_count);
    }

    /// Property: synthesized phase names enumerate the discovered
    /// files in order.
    #[test]
    fn prop_synthesized_phase_names(file_count in 1usize..8) {
        let dir = tempfile::tempdir().unwrap();
        for idx in 0..file_count {
            write_recording(dir.path(), &format!("{idx:02}.csv"), 4, 16);
        }

        let session = load_recording_folder(dir.path(), None, None).unwrap();
        let expected: Vec<String> = (0..file_count).map(|idx| format!("Part{idx}")).collect();
        prop_assert_eq!(session.phase_names(), expected);
    }
}
