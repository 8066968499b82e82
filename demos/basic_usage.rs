//! Basic usage: build a raw dataset over a synthetic study tree,
//! narrow the index and read data through the accessors.
//!
//! Run with: `cargo run --example basic_usage`

use cft_dataset::dataset::{EcgData, PHASES};
use cft_dataset::RawDataset;
use std::io::Write;
use std::path::Path;

fn write_recordings(base: &Path, subject: &str) -> anyhow::Result<()> {
    let folder = base.join("ecg").join(subject);
    std::fs::create_dir_all(&folder)?;
    for (idx, _) in PHASES.iter().enumerate() {
        let mut file = std::fs::File::create(folder.join(format!("part{idx}.csv")))?;
        writeln!(file, "# sampling_rate_hz: 64")?;
        writeln!(file, "counter,ecg")?;
        for row in 0..256 {
            writeln!(file, "{row},{}", f64::from(row) * 0.01)?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // synthesize a small study tree
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("condition_list.csv"),
        "subject,condition\nVp01,CFT\nVp02,Control\n",
    )?;
    write_recordings(dir.path(), "Vp01")?;
    write_recordings(dir.path(), "Vp02")?;

    let dataset = RawDataset::builder(dir.path()).build()?;
    println!("index: {} rows", dataset.index().len());
    for row in dataset.index().rows().iter().take(5) {
        println!(
            "  {} / {} / {}",
            row.condition, row.subject, row.phase
        );
    }

    // ECG is only legal for a single subject
    let subject = dataset.with_subjects(&["Vp01"]);
    match subject.ecg()?.as_ref() {
        EcgData::PerPhase(session) => {
            println!(
                "loaded {} phases at {} Hz",
                session.len(),
                session.sampling_rate_hz()
            );
            for (phase, batch) in session.iter() {
                println!("  {phase}: {} samples", batch.num_rows());
            }
        }
        EcgData::SinglePhase(batch) => println!("single phase: {} samples", batch.num_rows()),
    }

    // the same read on the full dataset is rejected by the guard
    match dataset.ecg() {
        Err(err) => println!("full dataset: {err}"),
        Ok(_) => unreachable!("guard should reject multi-subject ECG access"),
    }
    Ok(())
}
