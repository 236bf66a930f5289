//! estr-io: delimited-table I/O for the estr toolkit.
//!
//! Tables are the only boundary format in this pipeline. Input files may be
//! comma- or tab-delimited (auto-detected from the header line); outputs are
//! written comma-delimited. Column lookup is by header name, so extra
//! columns are ignored, but a missing required column or a value that fails
//! to parse is a fatal error, not a silently coerced default.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use estr_core::{
    AssocResult, EstrEffect, EstrMap, ExpressionRecord, ExpressionTable, GenotypeRecord,
    GenotypeTable, LocusCatalog, StrLocus,
};

pub mod merge;
pub mod regions;

/// Detect delimiter (comma or tab) from a file's first line.
pub fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let mut rdr = std::io::BufReader::new(
        std::fs::File::open(&path)
            .with_context(|| format!("opening {}", path.as_ref().display()))?,
    );
    let mut first_line = String::new();
    std::io::BufRead::read_line(&mut rdr, &mut first_line)?;
    if first_line.contains('\t') {
        Ok(b'\t')
    } else {
        Ok(b',')
    }
}

fn open_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<std::fs::File>> {
    let delim = detect_delimiter(&path)?;
    csv::ReaderBuilder::new()
        .delimiter(delim)
        .from_path(&path)
        .with_context(|| format!("opening {}", path.as_ref().display()))
}

/// Position of a required column, by header name.
pub(crate) fn require_col(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| anyhow!("Required column '{}' missing", name))
}

pub(crate) fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<&'r str> {
    record
        .get(idx)
        .ok_or_else(|| anyhow!("Row {}: column '{}' missing", line, name))
}

pub(crate) fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = field(record, idx, name, line)?;
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("Row {}: bad value '{}' for column '{}': {}", line, raw, name, e))
}

/// Load the reference STR locus catalog.
///
/// Required columns: tmp_id, chr, start, end, period, ref.
/// A `gene` column is optional; empty cells mean "no gene label".
pub fn load_locus_catalog<P: AsRef<Path>>(path: P) -> Result<LocusCatalog> {
    let mut rdr = open_reader(&path)?;
    let headers = rdr.headers()?.clone();

    let tmp_id = require_col(&headers, "tmp_id")?;
    let chr = require_col(&headers, "chr")?;
    let start = require_col(&headers, "start")?;
    let end = require_col(&headers, "end")?;
    let period = require_col(&headers, "period")?;
    let ref_len = require_col(&headers, "ref")?;
    let gene = headers.iter().position(|h| h == "gene");

    let mut loci = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = (i + 2) as u64;
        let gene_label = match gene {
            Some(idx) => {
                let raw = field(&record, idx, "gene", line)?.trim();
                if raw.is_empty() {
                    None
                } else {
                    Some(raw.to_string())
                }
            }
            None => None,
        };
        loci.push(StrLocus {
            tmp_id: field(&record, tmp_id, "tmp_id", line)?.to_string(),
            chr: field(&record, chr, "chr", line)?.to_string(),
            start: parse_field(&record, start, "start", line)?,
            end: parse_field(&record, end, "end", line)?,
            period: parse_field(&record, period, "period", line)?,
            ref_len: parse_field(&record, ref_len, "ref", line)?,
            gene: gene_label,
        });
    }

    LocusCatalog::new(loci)
}

/// Write a locus catalog. The `gene` column is emitted only when at least
/// one locus carries a label.
pub fn write_locus_catalog<P: AsRef<Path>>(path: P, catalog: &LocusCatalog) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b',').from_path(&path)?;
    let with_gene = catalog.loci().iter().any(|l| l.gene.is_some());
    if with_gene {
        wtr.write_record(["tmp_id", "chr", "start", "end", "period", "ref", "gene"])?;
    } else {
        wtr.write_record(["tmp_id", "chr", "start", "end", "period", "ref"])?;
    }
    for l in catalog.loci() {
        let mut row = vec![
            l.tmp_id.clone(),
            l.chr.clone(),
            l.start.to_string(),
            l.end.to_string(),
            l.period.to_string(),
            l.ref_len.to_string(),
        ];
        if with_gene {
            row.push(l.gene.clone().unwrap_or_default());
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Load a genotype table.
///
/// Required columns: patient, tmp_id, period, ref, and the four allele
/// tracks. The derived `mean_gt` column is recomputed from the tumor
/// alleles, so it need not be present.
pub fn load_genotypes<P: AsRef<Path>>(path: P) -> Result<GenotypeTable> {
    let mut rdr = open_reader(&path)?;
    let headers = rdr.headers()?.clone();

    let patient = require_col(&headers, "patient")?;
    let tmp_id = require_col(&headers, "tmp_id")?;
    let period = require_col(&headers, "period")?;
    let ref_len = require_col(&headers, "ref")?;
    let a_healthy = require_col(&headers, "allele_a_healthy")?;
    let b_healthy = require_col(&headers, "allele_b_healthy")?;
    let a_tumor = require_col(&headers, "allele_a_tumor")?;
    let b_tumor = require_col(&headers, "allele_b_tumor")?;

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = (i + 2) as u64;
        let rec = GenotypeRecord {
            patient: parse_field(&record, patient, "patient", line)?,
            tmp_id: field(&record, tmp_id, "tmp_id", line)?.to_string(),
            period: parse_field(&record, period, "period", line)?,
            ref_len: parse_field(&record, ref_len, "ref", line)?,
            allele_a_healthy: parse_field(&record, a_healthy, "allele_a_healthy", line)?,
            allele_b_healthy: parse_field(&record, b_healthy, "allele_b_healthy", line)?,
            allele_a_tumor: parse_field(&record, a_tumor, "allele_a_tumor", line)?,
            allele_b_tumor: parse_field(&record, b_tumor, "allele_b_tumor", line)?,
        };
        for (name, len) in [
            ("allele_a_healthy", rec.allele_a_healthy),
            ("allele_b_healthy", rec.allele_b_healthy),
            ("allele_a_tumor", rec.allele_a_tumor),
            ("allele_b_tumor", rec.allele_b_tumor),
        ] {
            if len < 1 {
                return Err(anyhow!("Row {}: {} is {} (must be >= 1)", line, name, len));
            }
        }
        records.push(rec);
    }

    Ok(GenotypeTable { records })
}

/// Write a genotype table, including the derived `mean_gt` column the
/// association tester consumes.
pub fn write_genotypes<P: AsRef<Path>>(path: P, table: &GenotypeTable) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b',').from_path(&path)?;
    wtr.write_record([
        "patient",
        "tmp_id",
        "period",
        "ref",
        "allele_a_healthy",
        "allele_b_healthy",
        "allele_a_tumor",
        "allele_b_tumor",
        "mean_gt",
    ])?;
    for r in &table.records {
        wtr.write_record([
            r.patient.to_string(),
            r.tmp_id.clone(),
            r.period.to_string(),
            r.ref_len.to_string(),
            r.allele_a_healthy.to_string(),
            r.allele_b_healthy.to_string(),
            r.allele_a_tumor.to_string(),
            r.allele_b_tumor.to_string(),
            r.mean_gt().to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Load an expression table. Required columns: patient, gene, expression.
pub fn load_expression<P: AsRef<Path>>(path: P) -> Result<ExpressionTable> {
    let mut rdr = open_reader(&path)?;
    let headers = rdr.headers()?.clone();

    let patient = require_col(&headers, "patient")?;
    let gene = require_col(&headers, "gene")?;
    let expression = require_col(&headers, "expression")?;

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = (i + 2) as u64;
        records.push(ExpressionRecord {
            patient: parse_field(&record, patient, "patient", line)?,
            gene: field(&record, gene, "gene", line)?.to_string(),
            expression: parse_field(&record, expression, "expression", line)?,
        });
    }

    Ok(ExpressionTable { records })
}

/// Write an expression table.
pub fn write_expression<P: AsRef<Path>>(path: P, table: &ExpressionTable) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b',').from_path(&path)?;
    wtr.write_record(["patient", "gene", "expression"])?;
    for r in &table.records {
        wtr.write_record([
            r.patient.to_string(),
            r.gene.clone(),
            r.expression.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Load a gene -> eSTR effect map.
///
/// Required columns: gene, tmp_id, ref_gt, coefficient. Duplicate genes are
/// rejected at load time.
pub fn load_estr_map<P: AsRef<Path>>(path: P) -> Result<EstrMap> {
    let mut rdr = open_reader(&path)?;
    let headers = rdr.headers()?.clone();

    let gene = require_col(&headers, "gene")?;
    let tmp_id = require_col(&headers, "tmp_id")?;
    let ref_gt = require_col(&headers, "ref_gt")?;
    let coefficient = require_col(&headers, "coefficient")?;

    let mut entries = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = (i + 2) as u64;
        entries.push((
            field(&record, gene, "gene", line)?.to_string(),
            EstrEffect {
                tmp_id: field(&record, tmp_id, "tmp_id", line)?.to_string(),
                ref_gt: parse_field(&record, ref_gt, "ref_gt", line)?,
                coefficient: parse_field(&record, coefficient, "coefficient", line)?,
            },
        ));
    }

    EstrMap::new(entries)
}

/// Write association results. Gated pairs contribute no rows, so the file
/// may legitimately hold only the header.
pub fn write_assoc_results<P: AsRef<Path>>(path: P, results: &[AssocResult]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b',').from_path(&path)?;
    wtr.write_record(["gene", "tmp_id", "coefficient", "pvalue_coef", "intercept"])?;
    for r in results {
        wtr.write_record([
            r.gene.clone(),
            r.tmp_id.clone(),
            r.coefficient.to_string(),
            r.pvalue_coef.to_string(),
            r.intercept.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
