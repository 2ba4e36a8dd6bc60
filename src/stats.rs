use crate::hierarchy::{Category, GeneNode, TranscriptNode};
use crate::interner::{StringPool, Sym};
use crate::report::{
    CategoryReport, FeatureStats, FeaturesReport, LengthStats, Report, TranscriptsReport,
    TypeReport,
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Rounds for display only; stored observations stay exact.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round2(numerator as f64 / denominator as f64)
    }
}

/// Sorts the retained observations once and computes the exact summary.
///
/// Median is the standard definition: the middle element for odd counts,
/// the mean of the two middle elements for even counts.
fn summarize<T>(values: &mut Vec<T>) -> LengthStats
where
    T: Copy + Ord + Into<u64>,
{
    if values.is_empty() {
        return LengthStats::empty();
    }
    values.sort_unstable();
    let n = values.len();
    let min: u64 = values[0].into();
    let max: u64 = values[n - 1].into();
    let sum: u64 = values.iter().map(|&v| v.into()).sum();
    let median = if n % 2 == 1 {
        let mid: u64 = values[(n - 1) / 2].into();
        mid as f64
    } else {
        let lo: u64 = values[n / 2 - 1].into();
        let hi: u64 = values[n / 2].into();
        (lo as f64 + hi as f64) / 2.0
    };
    LengthStats {
        count: n as u64,
        min: Some(min),
        max: Some(max),
        mean: Some(round2(sum as f64 / n as f64)),
        median: Some(round2(median)),
    }
}

/// Per-transcript-type accumulation bucket.
///
/// Exon and CDS lengths are held as `u32`, everything genomic-span-sized
/// as `u64`; the raw vectors are the price of exact medians and dominate
/// the memory footprint, hence the compact element types.
#[derive(Debug, Default)]
struct TypeAcc {
    /// Distinct parent genes (arena indices) owning this type.
    parent_genes: HashSet<usize>,
    lengths: Vec<u64>,
    spliced_lengths: Vec<u64>,
    exon_lengths: Vec<u32>,
    exon_total: u64,
}

#[derive(Debug, Default)]
struct CategoryAcc {
    gene_lengths: Vec<u64>,
    transcript_count: u64,
    types: HashMap<Sym, TypeAcc>,
    exon_lengths: Vec<u32>,
    intron_lengths: Vec<u64>,
    cds_lengths: Vec<u32>,
}

impl CategoryAcc {
    fn into_report(mut self, pool: &StringPool) -> CategoryReport {
        let gene_count = self.gene_lengths.len() as u64;
        let length_stats = summarize(&mut self.gene_lengths);

        let mut types = BTreeMap::new();
        for (sym, mut acc) in self.types {
            let count = acc.lengths.len() as u64;
            let report = TypeReport {
                count,
                per_gene: ratio(count, acc.parent_genes.len() as u64),
                exons_per_transcript: ratio(acc.exon_total, count),
                length_stats: summarize(&mut acc.lengths),
                spliced_length_stats: summarize(&mut acc.spliced_lengths),
                exon_length_stats: summarize(&mut acc.exon_lengths),
            };
            types.insert(pool.resolve(sym).to_string(), report);
        }

        let exon_count = self.exon_lengths.len() as u64;
        let intron_count = self.intron_lengths.len() as u64;
        let cds = if self.cds_lengths.is_empty() {
            None
        } else {
            Some(FeatureStats {
                count: self.cds_lengths.len() as u64,
                length_stats: summarize(&mut self.cds_lengths),
            })
        };

        CategoryReport {
            count: gene_count,
            length_stats,
            transcripts: TranscriptsReport {
                count: self.transcript_count,
                per_gene: ratio(self.transcript_count, gene_count),
                types,
            },
            features: FeaturesReport {
                exons: FeatureStats {
                    count: exon_count,
                    length_stats: summarize(&mut self.exon_lengths),
                },
                introns: FeatureStats {
                    count: intron_count,
                    length_stats: summarize(&mut self.intron_lengths),
                },
                cds,
            },
        }
    }
}

/// Incremental aggregation over finalized hierarchy nodes.
///
/// [`record_gene`](StatsAccumulator::record_gene) and
/// [`record_transcript`](StatsAccumulator::record_transcript) are each
/// called exactly once per finalized entity per parent; a transcript
/// shared by two genes is recorded once for each, independently, which is
/// the deliberate multi-parent counting rule. All individual observations
/// are retained until [`finalize`](StatsAccumulator::finalize) so medians
/// are exact, not approximated.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    coding: CategoryAcc,
    non_coding: CategoryAcc,
    pseudogene: CategoryAcc,
}

impl StatsAccumulator {
    pub fn new() -> StatsAccumulator {
        StatsAccumulator::default()
    }

    fn bucket_mut(&mut self, category: Category) -> &mut CategoryAcc {
        match category {
            Category::Coding => &mut self.coding,
            Category::NonCoding => &mut self.non_coding,
            Category::Pseudogene => &mut self.pseudogene,
        }
    }

    pub fn record_gene(&mut self, category: Category, gene: &GeneNode) {
        self.bucket_mut(category).gene_lengths.push(gene.length());
    }

    /// Folds one transcript into its category and type buckets.
    /// `gene_idx` identifies the parent gene this recording is for, which
    /// feeds the distinct-gene denominator of the per-type `per_gene`
    /// ratio.
    pub fn record_transcript(
        &mut self,
        category: Category,
        gene_idx: usize,
        tx: &TranscriptNode,
    ) {
        let acc = self.bucket_mut(category);
        acc.transcript_count += 1;

        let ty = acc.types.entry(tx.ty).or_default();
        ty.parent_genes.insert(gene_idx);
        ty.lengths.push(tx.length());
        ty.spliced_lengths.push(tx.spliced_length());
        ty.exon_total += tx.exon_count() as u64;
        for len in tx.exon_lengths() {
            ty.exon_lengths.push(len as u32);
            acc.exon_lengths.push(len as u32);
        }
        for gap in tx.intron_lengths() {
            acc.intron_lengths.push(gap);
        }
        acc.cds_lengths.extend_from_slice(&tx.cds_lengths);
    }

    /// Sorts every retained vector once and assembles the final report.
    pub fn finalize(self, pool: &StringPool) -> Report {
        Report {
            coding_genes: self.coding.into_report(pool),
            non_coding_genes: self.non_coding.into_report(pool),
            pseudogenes: self.pseudogene.into_report(pool),
        }
    }
}
