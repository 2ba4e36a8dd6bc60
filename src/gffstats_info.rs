use crate::gffstats_utils::{is_gzipped, is_url, source_from_path, source_from_url};
use crate::hierarchy::HierarchyBuilder;
use crate::interner::StringPool;
use crate::options::SummaryOptions;
use crate::reader::gff::parse_line;
use crate::report::Report;
use crate::stats::StatsAccumulator;
use anyhow::Context;
use flate2::bufread::MultiGzDecoder;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything a run tolerated, skipped, or could not place. These
/// counters are surfaced on the summary value and logged; they are never
/// part of the serialized report, whose shape is fixed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Data lines that parsed into a feature record.
    pub records: u64,
    /// Comment, directive, and blank lines.
    pub comment_lines: u64,
    /// Lines skipped for too few columns or unparsable coordinates.
    pub malformed_lines: u64,
    /// Records dropped by the skip-type table before ingestion.
    pub skipped_types: u64,
    /// Top-level genes seen, classified or not.
    pub genes_total: u64,
    /// Genes with no structural children, excluded from every category.
    pub genes_unclassified: u64,
    /// Child attachments whose parent never appeared, plus parentless
    /// non-gene records.
    pub unresolved_features: u64,
}

/// The completed statistical summary of one GFF3 source.
///
/// Built in a single pass: lines are tokenized, the gene→transcript→
/// (exon|CDS) hierarchy is reconstructed with forward references resolved
/// as parents appear, genes are categorized once the stream is fully
/// drained, and every category metric is aggregated incrementally with
/// exact medians. Only stream-level failures abort a run; malformed lines
/// and unresolved references are counted in [`Diagnostics`] and skipped.
///
/// ```no_run
/// use gffstats::GffSummary;
///
/// let summary = GffSummary::from_path("annotation.gff3.gz")?;
/// println!("{}", serde_json::to_string_pretty(&summary.report)?);
/// # anyhow::Ok(())
/// ```
#[derive(Debug)]
pub struct GffSummary {
    pub report: Report,
    pub diagnostics: Diagnostics,
}

impl GffSummary {
    /// Summarizes a local path or an `http(s)://` URL, dispatching on the
    /// protocol prefix.
    pub fn from_source(source: &str, opts: &SummaryOptions) -> anyhow::Result<GffSummary> {
        if is_url(source) {
            info!("fetching from URL: {}", source);
            GffSummary::from_reader(source_from_url(source)?, opts)
        } else {
            info!("reading local file: {}", source);
            GffSummary::from_reader(source_from_path(source)?, opts)
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<GffSummary> {
        GffSummary::from_reader(source_from_path(path)?, &SummaryOptions::default())
    }

    pub fn from_url(url: &str) -> anyhow::Result<GffSummary> {
        GffSummary::from_reader(source_from_url(url)?, &SummaryOptions::default())
    }

    /// Summarizes an arbitrary byte stream, auto-detecting gzip from the
    /// magic bytes on the unconsumed reader.
    pub fn from_reader<R: BufRead>(mut rdr: R, opts: &SummaryOptions) -> anyhow::Result<GffSummary> {
        if opts.force_gzip || is_gzipped(&mut rdr).context("cannot probe stream head")? {
            info!("auto-detected gzipped input - reading via decompression");
            GffSummary::summarize_lines(BufReader::new(MultiGzDecoder::new(rdr)), opts)
        } else {
            GffSummary::summarize_lines(rdr, opts)
        }
    }

    fn summarize_lines<R: BufRead>(
        mut rdr: R,
        opts: &SummaryOptions,
    ) -> anyhow::Result<GffSummary> {
        let mut pool = StringPool::new();
        let mut builder = HierarchyBuilder::new();
        let mut diagnostics = Diagnostics::default();

        // read_until instead of lines(): a stray non-UTF-8 byte in a free
        // text attribute must not abort the stream
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        let mut line_no = 0u64;
        loop {
            buf.clear();
            let n = rdr
                .read_until(b'\n', &mut buf)
                .with_context(|| format!("stream failed after line {}", line_no))?;
            if n == 0 {
                break;
            }
            line_no += 1;
            let line = String::from_utf8_lossy(&buf);
            // an embedded sequence section ends the annotation body
            if line.starts_with("##FASTA") {
                debug!("hit ##FASTA directive at line {}; stopping", line_no);
                break;
            }
            match parse_line(&line, &mut pool) {
                Ok(Some(rec)) => {
                    if opts.skip_types.contains(pool.resolve(rec.ty)) {
                        diagnostics.skipped_types += 1;
                        continue;
                    }
                    diagnostics.records += 1;
                    builder.ingest(&rec);
                }
                Ok(None) => diagnostics.comment_lines += 1,
                Err(e) => {
                    diagnostics.malformed_lines += 1;
                    debug!("skipping malformed line {}: {}", line_no, e);
                }
            }
        }

        if diagnostics.malformed_lines > 0 {
            warn!(
                "{} malformed lines were skipped; enable debug logging for details",
                diagnostics.malformed_lines
            );
        }

        // the stream is fully drained; only now is categorization safe
        let hierarchy = builder.finalize(&pool);
        diagnostics.unresolved_features = hierarchy.unresolved_features;
        diagnostics.genes_total = hierarchy.genes.len() as u64;

        let mut acc = StatsAccumulator::new();
        for (gene_idx, gene) in hierarchy.genes.iter().enumerate() {
            let Some(category) = gene.category else {
                diagnostics.genes_unclassified += 1;
                continue;
            };
            acc.record_gene(category, gene);
            for &tx_idx in &gene.transcripts {
                acc.record_transcript(category, gene_idx, &hierarchy.transcripts[tx_idx]);
            }
        }

        if diagnostics.genes_total == 0 {
            warn!("no gene records found; emitting an all-zero report");
        }
        info!(
            "finished parsing: {} records, {} comment lines, {} malformed, {} skipped by type",
            diagnostics.records,
            diagnostics.comment_lines,
            diagnostics.malformed_lines,
            diagnostics.skipped_types
        );
        debug!("interned {} distinct strings", pool.len());

        Ok(GffSummary {
            report: acc.finalize(&pool),
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GFF: &[u8] = b"##gff-version 3\n\
chr1\thavana\tgene\t10\t500\t.\t+\t.\tID=g1;biotype=protein_coding\n\
chr1\thavana\tmRNA\t10\t500\t.\t+\t.\tID=t1;Parent=g1\n\
chr1\thavana\texon\t10\t109\t.\t+\t.\tParent=t1\n\
chr1\thavana\tCDS\t20\t100\t.\t+\t0\tParent=t1\n";

    #[test]
    fn summarizes_a_small_stream() {
        let summary =
            GffSummary::from_reader(SMALL_GFF, &SummaryOptions::default()).unwrap();
        assert_eq!(summary.report.coding_genes.count, 1);
        assert_eq!(summary.report.coding_genes.transcripts.count, 1);
        assert_eq!(summary.diagnostics.records, 4);
        assert_eq!(summary.diagnostics.comment_lines, 1);
        assert_eq!(summary.diagnostics.malformed_lines, 0);
    }

    #[test]
    fn empty_input_yields_a_well_formed_zero_report() {
        let summary =
            GffSummary::from_reader(&b"##gff-version 3\n"[..], &SummaryOptions::default())
                .unwrap();
        assert_eq!(summary.report.coding_genes.count, 0);
        assert_eq!(summary.report.non_coding_genes.count, 0);
        assert_eq!(summary.report.pseudogenes.count, 0);
        assert!(summary.report.coding_genes.length_stats.min.is_none());
        assert_eq!(summary.diagnostics.genes_total, 0);
    }

    #[test]
    fn skip_types_are_counted_not_ingested() {
        let gff = b"chr1\tsrc\tregion\t1\t1000000\t.\t+\t.\tID=chr1\n\
chr1\tsrc\tgene\t10\t500\t.\t+\t.\tID=g1\n";
        let summary = GffSummary::from_reader(&gff[..], &SummaryOptions::default()).unwrap();
        assert_eq!(summary.diagnostics.skipped_types, 1);
        assert_eq!(summary.diagnostics.records, 1);
    }

    #[test]
    fn embedded_fasta_section_ends_the_annotation_body() {
        let gff = b"chr1\tsrc\tgene\t10\t500\t.\t+\t.\tID=g1\n\
##FASTA\n\
>chr1\n\
ACGTACGTACGT\n";
        let summary = GffSummary::from_reader(&gff[..], &SummaryOptions::default()).unwrap();
        assert_eq!(summary.diagnostics.records, 1);
        assert_eq!(summary.diagnostics.malformed_lines, 0);
    }

    #[test]
    fn invalid_utf8_does_not_abort_the_stream() {
        let mut gff = Vec::new();
        gff.extend_from_slice(b"chr1\tsrc\tgene\t10\t500\t.\t+\t.\tID=g1;note=\xff\xfe\n");
        gff.extend_from_slice(b"chr1\tsrc\tmRNA\t10\t500\t.\t+\t.\tID=t1;Parent=g1\n");
        gff.extend_from_slice(b"chr1\tsrc\texon\t10\t109\t.\t+\t.\tParent=t1\n");
        let summary =
            GffSummary::from_reader(&gff[..], &SummaryOptions::default()).unwrap();
        assert_eq!(summary.diagnostics.records, 3);
        assert_eq!(summary.report.non_coding_genes.count, 1);
    }
}
