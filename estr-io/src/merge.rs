//! Cohort merging.
//!
//! Concatenates two cohort tables (genotype or expression) that share a
//! header, offsetting the second cohort's patient ids past the first
//! cohort's so ids stay unique, and tagging every row with a `cohort`
//! label.

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::{detect_delimiter, require_col};

/// Merge two cohort tables into `out`.
///
/// Both inputs must carry an identical header including a `patient` column.
/// Rows from the first cohort pass through with `label_a`; rows from the
/// second get `patient += n_patients(first)` and `label_b`.
pub fn merge_cohorts<P: AsRef<Path>>(
    path_a: P,
    path_b: P,
    label_a: &str,
    label_b: &str,
    out: P,
) -> Result<()> {
    let mut rdr_a = reader(&path_a)?;
    let mut rdr_b = reader(&path_b)?;

    let headers_a = rdr_a.headers()?.clone();
    let headers_b = rdr_b.headers()?.clone();
    if headers_a != headers_b {
        return Err(anyhow!(
            "Cohort headers differ: {:?} vs {:?}",
            headers_a,
            headers_b
        ));
    }
    let patient_idx = require_col(&headers_a, "patient")?;

    let mut wtr = csv::WriterBuilder::new().delimiter(b',').from_path(&out)?;
    let mut header: Vec<String> = headers_a.iter().map(|h| h.to_string()).collect();
    header.push("cohort".to_string());
    wtr.write_record(&header)?;

    let mut patients_a: HashSet<u32> = HashSet::new();
    for (i, result) in rdr_a.records().enumerate() {
        let record = result?;
        let patient = parse_patient(&record, patient_idx, i + 2)?;
        patients_a.insert(patient);
        let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
        row.push(label_a.to_string());
        wtr.write_record(&row)?;
    }
    let offset = patients_a.len() as u32;

    for (i, result) in rdr_b.records().enumerate() {
        let record = result?;
        let patient = parse_patient(&record, patient_idx, i + 2)?;
        let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
        row[patient_idx] = (patient + offset).to_string();
        row.push(label_b.to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

fn reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<std::fs::File>> {
    let delim = detect_delimiter(&path)?;
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .from_path(&path)
        .with_context(|| format!("opening {}", path.as_ref().display()))
}

fn parse_patient(record: &csv::StringRecord, idx: usize, line: usize) -> Result<u32> {
    let raw = record
        .get(idx)
        .ok_or_else(|| anyhow!("Row {}: patient column missing", line))?;
    raw.trim()
        .parse::<u32>()
        .map_err(|e| anyhow!("Row {}: bad patient id '{}': {}", line, raw, e))
}
