use serde::Serialize;
use std::collections::BTreeMap;

/// Exact summary of one metric.
///
/// `min`, `max`, `mean`, and `median` are omitted from serialized output
/// when `count` is zero. `mean` and `median` are rounded to 2 decimal
/// places for display; the underlying observations are never rounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthStats {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
}

impl LengthStats {
    pub fn empty() -> LengthStats {
        LengthStats {
            count: 0,
            min: None,
            max: None,
            mean: None,
            median: None,
        }
    }
}

/// Count plus length summary for one derived feature class (exons,
/// introns, or CDS segments) within a gene category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStats {
    pub count: u64,
    pub length_stats: LengthStats,
}

/// Per-category feature breakdown. `cds` is omitted for categories where
/// no CDS record was observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturesReport {
    pub exons: FeatureStats,
    pub introns: FeatureStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds: Option<FeatureStats>,
}

/// Statistics for one transcript type (`mRNA`, `lnc_RNA`, ...) within a
/// gene category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeReport {
    pub count: u64,
    /// Transcripts of this type per distinct gene owning at least one.
    pub per_gene: f64,
    pub exons_per_transcript: f64,
    /// Genomic span lengths.
    pub length_stats: LengthStats,
    /// Sum-of-exon lengths per transcript.
    pub spliced_length_stats: LengthStats,
    /// Individual exon lengths, flattened across transcripts of the type.
    pub exon_length_stats: LengthStats,
}

/// Transcript rollup for a gene category. `types` is ordered so repeated
/// runs serialize byte-identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptsReport {
    pub count: u64,
    /// Transcripts per gene of the category.
    pub per_gene: f64,
    pub types: BTreeMap<String, TypeReport>,
}

/// Everything reported for one gene category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub count: u64,
    pub length_stats: LengthStats,
    pub transcripts: TranscriptsReport,
    pub features: FeaturesReport,
}

/// The final nested result: one block per gene category. A run over input
/// with no genes still produces this shape with every count at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub coding_genes: CategoryReport,
    pub non_coding_genes: CategoryReport,
    pub pseudogenes: CategoryReport,
}
