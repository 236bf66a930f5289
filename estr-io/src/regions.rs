//! Region filtering and pseudo-gene binning.
//!
//! Takes a raw STR region table (with neighbour/segdup annotations) and
//! produces a clean locus catalog for the simulator: isolated, non-segdup
//! loci only, optionally truncated and partitioned into equal-count
//! pseudo-gene bins on the start coordinate.

use anyhow::{anyhow, Result};
use std::path::Path;

use estr_core::{LocusCatalog, StrLocus};

use crate::{detect_delimiter, field, parse_field, require_col};

/// Options for [`filter_regions`].
#[derive(Clone, Debug, Default)]
pub struct RegionFilterOptions {
    /// Keep at most this many loci (after filtering). `None` keeps all.
    pub n_regions: Option<usize>,
    /// Partition the kept loci into this many pseudo-genes labeled A, B, ...
    /// `None` leaves loci unlabeled. More than 26 is an error.
    pub n_genes: Option<usize>,
}

/// Filter a raw STR region table into a locus catalog.
///
/// Required columns: tmp_id, chr, start, end, period, ref, neighbour_type,
/// in_segdup. Rows are kept when `neighbour_type == "no_neighbour"` and
/// `in_segdup` is false.
pub fn filter_regions<P: AsRef<Path>>(
    path: P,
    opts: &RegionFilterOptions,
) -> Result<LocusCatalog> {
    let delim = detect_delimiter(&path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delim)
        .from_path(&path)?;
    let headers = rdr.headers()?.clone();

    let tmp_id = require_col(&headers, "tmp_id")?;
    let chr = require_col(&headers, "chr")?;
    let start = require_col(&headers, "start")?;
    let end = require_col(&headers, "end")?;
    let period = require_col(&headers, "period")?;
    let ref_len = require_col(&headers, "ref")?;
    let neighbour_type = require_col(&headers, "neighbour_type")?;
    let in_segdup = require_col(&headers, "in_segdup")?;

    let keep_max = opts.n_regions.unwrap_or(usize::MAX);
    let mut loci: Vec<StrLocus> = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        if loci.len() >= keep_max {
            break;
        }
        let record = result?;
        let line = (i + 2) as u64;

        if field(&record, neighbour_type, "neighbour_type", line)? != "no_neighbour" {
            continue;
        }
        if parse_bool(field(&record, in_segdup, "in_segdup", line)?)
            .ok_or_else(|| anyhow!("Row {}: bad boolean in 'in_segdup'", line))?
        {
            continue;
        }

        loci.push(StrLocus {
            tmp_id: field(&record, tmp_id, "tmp_id", line)?.to_string(),
            chr: field(&record, chr, "chr", line)?.to_string(),
            start: parse_field(&record, start, "start", line)?,
            end: parse_field(&record, end, "end", line)?,
            period: parse_field(&record, period, "period", line)?,
            ref_len: parse_field(&record, ref_len, "ref", line)?,
            gene: None,
        });
    }

    if let Some(n_genes) = opts.n_genes {
        assign_gene_bins(&mut loci, n_genes)?;
    }

    LocusCatalog::new(loci)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "True" | "true" | "TRUE" | "1" => Some(true),
        "False" | "false" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

/// Partition loci into `n_genes` equal-count quantile bins on the start
/// coordinate and label the bins A, B, ... Loci with equal starts always
/// share a bin.
fn assign_gene_bins(loci: &mut [StrLocus], n_genes: usize) -> Result<()> {
    if n_genes == 0 {
        return Err(anyhow!("n_genes must be > 0"));
    }
    if n_genes > 26 {
        return Err(anyhow!(
            "Cannot label {} pseudo-genes: only A..Z available",
            n_genes
        ));
    }
    let n = loci.len();
    if n == 0 {
        return Ok(());
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| (loci[i].start, i));

    let mut bins = vec![0usize; n];
    let mut prev_start: Option<u64> = None;
    let mut prev_bin = 0usize;
    for (rank, &i) in order.iter().enumerate() {
        let bin = if prev_start == Some(loci[i].start) {
            prev_bin
        } else {
            rank * n_genes / n
        };
        bins[i] = bin;
        prev_start = Some(loci[i].start);
        prev_bin = bin;
    }

    for (locus, bin) in loci.iter_mut().zip(bins) {
        let label = (b'A' + bin as u8) as char;
        locus.gene = Some(label.to_string());
    }
    Ok(())
}
