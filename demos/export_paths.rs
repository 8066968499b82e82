//! Export paths: prepare the per-subject output directory for
//! downstream result writers.
//!
//! Run with: `cargo run --example export_paths`

use cft_dataset::RawDataset;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("condition_list.csv"),
        "subject,condition\nVp01,CFT\nVp02,Control\n",
    )?;

    let dataset = RawDataset::builder(dir.path()).build()?;
    let paths = dataset.with_subjects(&["Vp01"]).setup_export_paths()?;

    println!("hr results      -> {}", paths.hr_result.display());
    println!("r-peak results  -> {}", paths.rpeaks_result.display());
    println!("continuous hrv  -> {}", paths.hrv_continuous.display());
    Ok(())
}
