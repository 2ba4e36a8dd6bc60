//! Gffstats is a streaming summarizer for [GFF3](https://github.com/The-Sequence-Ontology/Specifications/blob/master/gff3.md)
//! genome annotations. It reconstructs the gene→transcript→(exon|CDS)
//! hierarchy in a single pass over the file, resolving children that
//! appear before their parents, and aggregates per-category and
//! per-transcript-type statistics (counts, lengths, spliced lengths,
//! derived introns) with exact medians. Inputs may be local files or
//! URLs, gzip-compressed or plain; the result is a nested report that
//! serializes to stable JSON.

pub mod gffstats_info;
pub mod gffstats_utils;
pub mod hierarchy;
pub mod interner;
pub mod options;
pub mod reader;
pub mod report;
pub mod stats;
pub use gffstats_info::{Diagnostics, GffSummary};
pub use report::Report;
