use crate::interner::{StringPool, Sym};
use crate::reader::gff::{FeatureKind, FeatureRecord, Strand};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The category a finalized gene is assigned to, in the priority order of
/// [`classify`]. Genes with no structural children get no category and are
/// excluded from category statistics.
pub enum Category {
    Coding,
    NonCoding,
    Pseudogene,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Coding => "coding",
            Category::NonCoding => "non_coding",
            Category::Pseudogene => "pseudogene",
        }
    }
}

/// A top-level gene and the transcripts attached to it, by arena index.
#[derive(Debug, Clone)]
pub struct GeneNode {
    pub id: Sym,
    pub seqid: Sym,
    /// Literal type string of the opening line (`gene`, `pseudogene`, ...).
    pub ty: Sym,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub biotype: Option<Sym>,
    /// Indices into the transcript arena, in attachment order.
    pub transcripts: Vec<usize>,
    pub has_cds: bool,
    pub has_exon: bool,
    /// Assigned once, during finalize.
    pub category: Option<Category>,
}

impl GeneNode {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// A transcript-like feature (mRNA, lnc_RNA, miRNA, pseudogenic_transcript,
/// ...) with its exon intervals and CDS segment lengths.
///
/// The node is shared: a transcript listed under several parent genes is
/// stored once and indexed from each parent, so its exons are measured once
/// per parent without being stored twice. `genes` holds the parent
/// back-references (indices, not ownership).
#[derive(Debug, Clone)]
pub struct TranscriptNode {
    pub id: Sym,
    /// Literal type string; per-type statistics are keyed by this.
    pub ty: Sym,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    /// Parent gene arena indices.
    pub genes: Vec<usize>,
    /// Exon intervals kept sorted by start so introns fall out as gaps.
    exons: Vec<(u64, u64)>,
    pub exon_len_sum: u64,
    pub cds_lengths: Vec<u32>,
}

impl TranscriptNode {
    /// Genomic span, `end - start + 1`.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Sum of exon lengths, i.e. the mature transcript length.
    pub fn spliced_length(&self) -> u64 {
        self.exon_len_sum
    }

    pub fn exon_count(&self) -> usize {
        self.exons.len()
    }

    /// `exon_count - 1` floored at zero; introns are derived, never records.
    pub fn intron_count(&self) -> usize {
        self.exons.len().saturating_sub(1)
    }

    pub fn exon_lengths(&self) -> impl Iterator<Item = u64> + '_ {
        self.exons.iter().map(|&(s, e)| e - s + 1)
    }

    /// Gap lengths between consecutive start-sorted exons. Overlapping
    /// exon annotations produce zero-length gaps rather than underflowing.
    pub fn intron_lengths(&self) -> impl Iterator<Item = u64> + '_ {
        self.exons
            .windows(2)
            .map(|w| w[1].0.saturating_sub(w[0].1 + 1))
    }

    fn insert_exon_sorted(&mut self, start: u64, end: u64) {
        let pos = self.exons.partition_point(|&(s, _)| s <= start);
        self.exons.insert(pos, (start, end));
    }
}

/// Assigns a finalized gene to its category.
///
/// Priority order: a `pseudogene` type literal or a biotype containing
/// `pseudogene` wins; then any CDS among the descendants (or a
/// `protein_coding` biotype, the secondary signal) makes the gene coding;
/// then at least one exon-bearing transcript makes it non-coding. A gene
/// with no structural children gets `None` and is only counted in the
/// overall gene tally.
pub fn classify(gene: &GeneNode, pool: &StringPool) -> Option<Category> {
    let biotype = gene.biotype.map(|b| pool.resolve(b));
    if pool.resolve(gene.ty) == "pseudogene"
        || biotype.is_some_and(|b| b.contains("pseudogene"))
    {
        return Some(Category::Pseudogene);
    }
    if gene.has_cds || biotype == Some("protein_coding") {
        return Some(Category::Coding);
    }
    if gene.has_exon {
        return Some(Category::NonCoding);
    }
    None
}

/// A child record waiting for (or being attached to) a parent. Slimmed
/// from [`FeatureRecord`]: the attribute map and the parent list are not
/// needed past ingestion.
#[derive(Debug, Clone)]
struct ChildRecord {
    id: Option<Sym>,
    ty: Sym,
    kind: FeatureKind,
    start: u64,
    end: u64,
    strand: Strand,
}

impl ChildRecord {
    fn from_record(rec: &FeatureRecord) -> ChildRecord {
        ChildRecord {
            id: rec.id,
            ty: rec.ty,
            kind: rec.kind,
            start: rec.start,
            end: rec.end,
            strand: rec.strand,
        }
    }

    fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// The finished gene→transcript→feature forest plus bookkeeping counters.
#[derive(Debug)]
pub struct Hierarchy {
    pub genes: Vec<GeneNode>,
    pub transcripts: Vec<TranscriptNode>,
    /// Pending (parent, child) attachments whose parent id never appeared,
    /// plus parentless non-gene records. Diagnostic only, never fatal.
    pub unresolved_features: u64,
}

/// Single-pass builder for the gene→transcript→(exon|CDS) forest.
///
/// Records arrive in file order, but GFF3 does not promise parent-before-
/// child: a child whose `Parent` id is still unknown is queued under that
/// id and attached the moment the parent registers. Ids are registered for
/// genes and transcripts only; exon and CDS records are never referenced
/// as parents and are not indexed.
///
/// Call [`ingest`](HierarchyBuilder::ingest) once per parsed record and
/// [`finalize`](HierarchyBuilder::finalize) exactly once after the stream
/// is fully drained. Categories are resolved during finalize, never
/// earlier, so an aborted stream contributes nothing downstream.
pub struct HierarchyBuilder {
    genes: Vec<GeneNode>,
    transcripts: Vec<TranscriptNode>,
    gene_ids: HashMap<Sym, usize>,
    transcript_ids: HashMap<Sym, usize>,
    /// parent id → children awaiting that parent, in arrival order.
    pending: HashMap<Sym, Vec<ChildRecord>>,
    deferred_resolved: u64,
    dangling_top_level: u64,
}

impl HierarchyBuilder {
    pub fn new() -> HierarchyBuilder {
        HierarchyBuilder {
            genes: Vec::with_capacity(1_0000),
            transcripts: Vec::with_capacity(1_0000),
            gene_ids: HashMap::with_capacity(1_0000),
            transcript_ids: HashMap::with_capacity(1_0000),
            pending: HashMap::new(),
            deferred_resolved: 0,
            dangling_top_level: 0,
        }
    }

    /// Consumes one record in file order.
    ///
    /// A parentless gene-typed record with an id opens a new top-level
    /// gene; a parentless record of any other shape is a dangling feature
    /// counted under `unresolved_features`. A record with parents is
    /// attached under every parent that is already known and queued under
    /// every parent that is not. Attachment is per (parent, child) pair,
    /// so a shared exon ends up under each of its parents exactly once no
    /// matter how the parents are ordered in the file.
    pub fn ingest(&mut self, rec: &FeatureRecord) {
        if rec.parents.is_empty() {
            match (rec.kind, rec.id) {
                (FeatureKind::Gene, Some(id)) => self.insert_gene(id, rec),
                _ => self.dangling_top_level += 1,
            }
            return;
        }

        let child = ChildRecord::from_record(rec);
        for &parent in &rec.parents {
            self.attach_or_queue(parent, child.clone());
        }
    }

    /// Classifies every gene and returns the completed forest. Consumes
    /// the builder: no record can attach afterwards, which is what makes
    /// category assignment safe.
    pub fn finalize(mut self, pool: &StringPool) -> Hierarchy {
        for gene in &mut self.genes {
            gene.category = classify(gene, pool);
        }

        let unresolved: u64 = self
            .pending
            .values()
            .map(|children| children.len() as u64)
            .sum();
        if self.deferred_resolved > 0 {
            debug!(
                "resolved {} forward-referencing features during parsing",
                self.deferred_resolved
            );
        }
        if unresolved > 0 {
            warn!(
                "{} feature attachments reference a parent id that never appeared",
                unresolved
            );
            for (parent, children) in self.pending.iter().take(5) {
                warn!(
                    "  unresolved parent {:?} with {} waiting children",
                    pool.resolve(*parent),
                    children.len()
                );
            }
        }

        Hierarchy {
            genes: self.genes,
            transcripts: self.transcripts,
            unresolved_features: unresolved + self.dangling_top_level,
        }
    }

    fn insert_gene(&mut self, id: Sym, rec: &FeatureRecord) {
        // discontinuous duplicate: the first line for an id wins
        if self.gene_ids.contains_key(&id) {
            return;
        }
        let idx = self.genes.len();
        self.genes.push(GeneNode {
            id,
            seqid: rec.seqid,
            ty: rec.ty,
            start: rec.start,
            end: rec.end,
            strand: rec.strand,
            biotype: rec.biotype,
            transcripts: Vec::new(),
            has_cds: false,
            has_exon: false,
            category: None,
        });
        self.gene_ids.insert(id, idx);
        self.drain_pending(id);
    }

    fn attach_or_queue(&mut self, parent: Sym, child: ChildRecord) {
        if let Some(&gene_idx) = self.gene_ids.get(&parent) {
            self.attach_to_gene(gene_idx, child);
        } else if let Some(&tx_idx) = self.transcript_ids.get(&parent) {
            self.attach_to_transcript(tx_idx, child);
        } else {
            self.pending.entry(parent).or_default().push(child);
        }
    }

    /// A child under a gene is a transcript if it carries an id and is not
    /// an exon or CDS. Structural leaves parented directly by a gene
    /// attach nowhere: the hierarchy is strictly gene→transcript→feature.
    fn attach_to_gene(&mut self, gene_idx: usize, child: ChildRecord) {
        let (FeatureKind::Other, Some(id)) = (child.kind, child.id) else {
            return;
        };

        let (tx_idx, newly_registered) = match self.transcript_ids.get(&id) {
            Some(&idx) => {
                // the same transcript attaching under a further parent, or
                // a re-seen line refreshing span and type
                let tx = &mut self.transcripts[idx];
                tx.ty = child.ty;
                tx.start = child.start;
                tx.end = child.end;
                tx.strand = child.strand;
                (idx, false)
            }
            None => {
                let idx = self.transcripts.len();
                self.transcripts.push(TranscriptNode {
                    id,
                    ty: child.ty,
                    start: child.start,
                    end: child.end,
                    strand: child.strand,
                    genes: Vec::new(),
                    exons: Vec::new(),
                    exon_len_sum: 0,
                    cds_lengths: Vec::new(),
                });
                self.transcript_ids.insert(id, idx);
                (idx, true)
            }
        };

        let tx = &mut self.transcripts[tx_idx];
        if !tx.genes.contains(&gene_idx) {
            tx.genes.push(gene_idx);
            self.genes[gene_idx].transcripts.push(tx_idx);
        }
        // a parent arriving after the transcript's children still learns
        // about the structure attached so far
        let gene = &mut self.genes[gene_idx];
        if self.transcripts[tx_idx].exon_count() > 0 {
            gene.has_exon = true;
        }
        if !self.transcripts[tx_idx].cds_lengths.is_empty() {
            gene.has_cds = true;
        }

        if newly_registered {
            self.drain_pending(id);
        }
    }

    fn attach_to_transcript(&mut self, tx_idx: usize, child: ChildRecord) {
        let length = child.length();
        match child.kind {
            FeatureKind::Exon => {
                let tx = &mut self.transcripts[tx_idx];
                tx.insert_exon_sorted(child.start, child.end);
                tx.exon_len_sum += length;
                for &gene_idx in &tx.genes {
                    self.genes[gene_idx].has_exon = true;
                }
            }
            FeatureKind::Cds => {
                let tx = &mut self.transcripts[tx_idx];
                tx.cds_lengths.push(length as u32);
                for &gene_idx in &tx.genes {
                    self.genes[gene_idx].has_cds = true;
                }
            }
            // UTRs and other transcript children are valid GFF3 but carry
            // no statistic here
            _ => {}
        }
    }

    /// Attaches every child that was waiting on `id`. A drained child that
    /// registers its own id (a transcript) drains its waiters in turn;
    /// each id registers at most once, so the recursion terminates even on
    /// malformed self-referential input.
    fn drain_pending(&mut self, id: Sym) {
        if let Some(children) = self.pending.remove(&id) {
            self.deferred_resolved += children.len() as u64;
            for child in children {
                self.attach_or_queue(id, child);
            }
        }
    }
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        HierarchyBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::gff::parse_line;

    fn build(lines: &[&str]) -> (Hierarchy, StringPool) {
        let mut pool = StringPool::new();
        let mut builder = HierarchyBuilder::new();
        for line in lines {
            if let Some(rec) = parse_line(line, &mut pool).unwrap() {
                builder.ingest(&rec);
            }
        }
        let hierarchy = builder.finalize(&pool);
        (hierarchy, pool)
    }

    #[test]
    fn forward_references_resolve_through_two_levels() {
        // exon and CDS both arrive around the transcript line they cite
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t10\t500\t.\t+\t.\tID=g1",
            "chr1\tsrc\texon\t10\t109\t.\t+\t.\tParent=t1",
            "chr1\tsrc\tmRNA\t10\t500\t.\t+\t.\tID=t1;Parent=g1",
            "chr1\tsrc\tCDS\t20\t100\t.\t+\t0\tParent=t1",
        ]);
        assert_eq!(h.genes.len(), 1);
        assert_eq!(h.transcripts.len(), 1);
        let tx = &h.transcripts[0];
        assert_eq!(tx.exon_count(), 1);
        assert_eq!(tx.cds_lengths, vec![81]);
        assert_eq!(h.genes[0].category, Some(Category::Coding));
        assert_eq!(h.unresolved_features, 0);
    }

    #[test]
    fn transcript_before_gene_still_attaches() {
        let (h, _pool) = build(&[
            "chr1\tsrc\texon\t1\t50\t.\t-\t.\tParent=t1",
            "chr1\tsrc\tmiRNA\t1\t80\t.\t-\t.\tID=t1;Parent=g1",
            "chr1\tsrc\tgene\t1\t80\t.\t-\t.\tID=g1",
        ]);
        assert_eq!(h.genes[0].transcripts, vec![0]);
        assert_eq!(h.transcripts[0].exon_count(), 1);
        assert_eq!(h.genes[0].category, Some(Category::NonCoding));
    }

    #[test]
    fn pseudogene_type_wins_over_exon_children() {
        let (h, _pool) = build(&[
            "chr1\tsrc\tpseudogene\t1\t300\t.\t+\t.\tID=g1",
            "chr1\tsrc\tpseudogenic_transcript\t1\t300\t.\t+\t.\tID=t1;Parent=g1",
            "chr1\tsrc\texon\t1\t300\t.\t+\t.\tParent=t1",
        ]);
        assert_eq!(h.genes[0].category, Some(Category::Pseudogene));
    }

    #[test]
    fn pseudogene_biotype_pattern_matches() {
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t1\t300\t.\t+\t.\tID=g1;biotype=processed_pseudogene",
            "chr1\tsrc\ttranscript\t1\t300\t.\t+\t.\tID=t1;Parent=g1",
            "chr1\tsrc\texon\t1\t300\t.\t+\t.\tParent=t1",
        ]);
        assert_eq!(h.genes[0].category, Some(Category::Pseudogene));
    }

    #[test]
    fn protein_coding_biotype_is_a_coding_signal() {
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t1\t300\t.\t+\t.\tID=g1;gene_biotype=protein_coding",
            "chr1\tsrc\tmRNA\t1\t300\t.\t+\t.\tID=t1;Parent=g1",
            "chr1\tsrc\texon\t1\t300\t.\t+\t.\tParent=t1",
        ]);
        assert_eq!(h.genes[0].category, Some(Category::Coding));
    }

    #[test]
    fn bare_gene_gets_no_category() {
        let (h, _pool) = build(&["chr1\tsrc\tgene\t1\t300\t.\t+\t.\tID=g1"]);
        assert_eq!(h.genes[0].category, None);
    }

    #[test]
    fn shared_exon_attaches_under_every_parent() {
        // t2 registers after the shared exon arrived; the exon must still
        // reach it
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t1\t500\t.\t+\t.\tID=g1",
            "chr1\tsrc\tmRNA\t1\t500\t.\t+\t.\tID=t1;Parent=g1",
            "chr1\tsrc\texon\t1\t100\t.\t+\t.\tParent=t1,t2",
            "chr1\tsrc\tmRNA\t1\t400\t.\t+\t.\tID=t2;Parent=g1",
        ]);
        assert_eq!(h.transcripts[0].exon_count(), 1);
        assert_eq!(h.transcripts[1].exon_count(), 1);
        assert_eq!(h.unresolved_features, 0);
    }

    #[test]
    fn unresolved_parents_are_tallied_not_fatal() {
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t1\t500\t.\t+\t.\tID=g1",
            "chr1\tsrc\texon\t1\t100\t.\t+\t.\tParent=missing",
            "chr1\tsrc\ttRNA\t1\t100\t.\t+\t.\tID=lost", // parentless non-gene
        ]);
        assert_eq!(h.unresolved_features, 2);
        assert_eq!(h.genes.len(), 1);
    }

    #[test]
    fn exons_directly_under_a_gene_attach_nowhere() {
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t1\t500\t.\t+\t.\tID=g1",
            "chr1\tsrc\texon\t1\t100\t.\t+\t.\tParent=g1",
        ]);
        assert!(!h.genes[0].has_exon);
        assert_eq!(h.genes[0].category, None);
        assert_eq!(h.unresolved_features, 0);
    }

    #[test]
    fn exons_arrive_out_of_order_and_sort_by_start() {
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t1\t1000\t.\t+\t.\tID=g1",
            "chr1\tsrc\tmRNA\t1\t1000\t.\t+\t.\tID=t1;Parent=g1",
            "chr1\tsrc\texon\t500\t599\t.\t+\t.\tParent=t1",
            "chr1\tsrc\texon\t1\t100\t.\t+\t.\tParent=t1",
            "chr1\tsrc\texon\t200\t299\t.\t+\t.\tParent=t1",
        ]);
        let tx = &h.transcripts[0];
        assert_eq!(tx.exon_count(), 3);
        assert_eq!(tx.intron_count(), 2);
        let introns: Vec<u64> = tx.intron_lengths().collect();
        assert_eq!(introns, vec![99, 200]);
        assert_eq!(tx.spliced_length(), 300);
    }

    #[test]
    fn self_referential_records_do_not_loop() {
        let (h, _pool) = build(&[
            "chr1\tsrc\tgene\t1\t500\t.\t+\t.\tID=g1",
            "chr1\tsrc\tmRNA\t1\t500\t.\t+\t.\tID=t1;Parent=t1",
        ]);
        // t1 cites itself and never registers; it stays unresolved
        assert_eq!(h.transcripts.len(), 0);
        assert_eq!(h.unresolved_features, 1);
    }
}
