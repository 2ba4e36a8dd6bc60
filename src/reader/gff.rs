use crate::interner::{StringPool, Sym};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// A recoverable failure while tokenizing a single GFF3 line.
///
/// The driver records and skips these rather than aborting the run; only
/// stream-level failures are fatal. The two variants cover the two ways a
/// data line can be unusable: a truncated column set, or start/end fields
/// that do not parse as positive integers (or parse inverted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedLineError {
    /// Fewer than the 9 canonical tab-separated columns were present.
    TooFewColumns(usize),
    /// Column 4 or 5 did not hold a usable 1-based inclusive coordinate.
    BadCoordinate(String),
}

impl fmt::Display for MalformedLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedLineError::TooFewColumns(n) => {
                write!(f, "expected 9 tab-separated columns, found {}", n)
            }
            MalformedLineError::BadCoordinate(field) => {
                write!(f, "cannot parse coordinate field {:?}", field)
            }
        }
    }
}

impl std::error::Error for MalformedLineError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Strand of a feature as written in column 7.
pub enum Strand {
    Forward,
    Reverse,
    /// `.` in the file: the feature is not stranded.
    Unstranded,
    /// `?` in the file: stranded, but the strand is not known.
    Unknown,
}

impl Strand {
    fn parse(field: &str) -> Strand {
        match field {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            "?" => Strand::Unknown,
            _ => Strand::Unstranded,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
            Strand::Unstranded => write!(f, "."),
            Strand::Unknown => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The structural role a feature type plays in the hierarchy.
///
/// Transcript-like types (mRNA, lnc_RNA, miRNA, pseudogenic_transcript and
/// friends) are not enumerated here. They are recognized by context: a
/// non-exon, non-CDS feature whose parent is a gene is a transcript, and
/// its literal type string is what the per-type statistics are keyed by.
pub enum FeatureKind {
    /// `gene`, `pseudogene`, or an Ensembl-style `*_gene` type; opens a
    /// top-level node.
    Gene,
    Exon,
    Cds,
    Other,
}

impl FeatureKind {
    pub fn classify(ty: &str) -> FeatureKind {
        match ty {
            "exon" => FeatureKind::Exon,
            "CDS" => FeatureKind::Cds,
            "gene" | "pseudogene" => FeatureKind::Gene,
            t if t.ends_with("_gene") => FeatureKind::Gene,
            _ => FeatureKind::Other,
        }
    }
}

/// One parsed GFF3 data line, with the linkage and classification fields
/// lifted out of the attribute column.
///
/// Strings that repeat across records (seqid, type, biotype, ids) are
/// interned into the shared [`StringPool`]; the raw attribute pairs are
/// kept verbatim in `attributes` so downstream code can look up keys the
/// tokenizer does not know about.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub seqid: Sym,
    pub ty: Sym,
    pub kind: FeatureKind,
    /// 1-based inclusive start, `start <= end`.
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub id: Option<Sym>,
    /// Parent references in attribute order; possibly empty.
    pub parents: Vec<Sym>,
    /// First of `biotype`, `gene_biotype`, `transcript_biotype` seen.
    pub biotype: Option<Sym>,
    pub attributes: HashMap<String, String>,
}

impl FeatureRecord {
    /// Genomic span length, `end - start + 1`.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Tokenizes one raw line into a [`FeatureRecord`].
///
/// Returns `Ok(None)` for comment (`#...`) and blank lines. Returns a
/// [`MalformedLineError`] when the line has fewer than 9 tab-separated
/// columns or its coordinates do not parse; callers are expected to count
/// the failure, log it, and continue with the next line.
pub fn parse_line(
    line: &str,
    pool: &mut StringPool,
) -> Result<Option<FeatureRecord>, MalformedLineError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    // only 9 splits are ever needed; the attribute column may contain tabs
    // after percent-decoding and must stay intact here
    let cols: Vec<&str> = line.splitn(9, '\t').collect();
    if cols.len() < 9 {
        return Err(MalformedLineError::TooFewColumns(cols.len()));
    }

    let start: u64 = cols[3]
        .parse()
        .map_err(|_| MalformedLineError::BadCoordinate(cols[3].to_string()))?;
    let end: u64 = cols[4]
        .parse()
        .map_err(|_| MalformedLineError::BadCoordinate(cols[4].to_string()))?;
    if start == 0 || start > end {
        return Err(MalformedLineError::BadCoordinate(format!(
            "{}..{}",
            cols[3], cols[4]
        )));
    }

    let ty = cols[2];
    let mut rec = FeatureRecord {
        seqid: pool.intern(cols[0]),
        ty: pool.intern(ty),
        kind: FeatureKind::classify(ty),
        start,
        end,
        strand: Strand::parse(cols[6]),
        id: None,
        parents: Vec::new(),
        biotype: None,
        attributes: HashMap::new(),
    };

    parse_attributes(cols[8], pool, &mut rec);
    Ok(Some(rec))
}

/// Splits column 9 on `;`, each pair on the first `=`, percent-decodes the
/// value, and lifts `ID`, `Parent`, and the biotype keys. Pairs without an
/// `=` are tolerated and skipped rather than failing the line.
fn parse_attributes(field: &str, pool: &mut StringPool, rec: &mut FeatureRecord) {
    for pair in field.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((key, raw_value)) = pair.split_once('=') else {
            continue;
        };
        let value = percent_decode(raw_value);
        match key {
            "ID" => rec.id = Some(pool.intern(value.trim())),
            "Parent" => {
                for parent in value.split(',') {
                    let parent = parent.trim();
                    if !parent.is_empty() {
                        rec.parents.push(pool.intern(parent));
                    }
                }
            }
            "biotype" | "gene_biotype" | "transcript_biotype" => {
                if rec.biotype.is_none() {
                    rec.biotype = Some(pool.intern(value.trim()));
                }
            }
            _ => {}
        }
        rec.attributes.insert(key.to_string(), value.into_owned());
    }
}

/// Decodes GFF3 percent-escapes (`%3B` for `;`, `%3D` for `=`, `%09` for
/// tab, and any other `%XX` hex pair). Escapes that are not two hex digits
/// pass through unchanged. Returns the input unchanged (and unallocated)
/// when it contains no `%`.
pub fn percent_decode(s: &str) -> Cow<'_, str> {
    if !s.contains('%') {
        return Cow::Borrowed(s);
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Owned(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENE_LINE: &str = "chr1\thavana\tgene\t11869\t14409\t.\t+\t.\tID=ENSG00000290825;biotype=lncRNA;Name=DDX11L2";
    const EXON_LINE: &str = "chr1\thavana\texon\t11869\t12227\t.\t+\t.\tParent=ENST00000456328,ENST00000450305;exon_id=ENSE00002234944";

    #[test]
    fn parses_a_gene_line() {
        let mut pool = StringPool::new();
        let rec = parse_line(GENE_LINE, &mut pool).unwrap().unwrap();
        assert_eq!(pool.resolve(rec.seqid), "chr1");
        assert_eq!(pool.resolve(rec.ty), "gene");
        assert!(matches!(rec.kind, FeatureKind::Gene));
        assert_eq!(rec.start, 11869);
        assert_eq!(rec.end, 14409);
        assert_eq!(rec.length(), 2541);
        assert_eq!(rec.strand, Strand::Forward);
        assert_eq!(pool.resolve(rec.id.unwrap()), "ENSG00000290825");
        assert!(rec.parents.is_empty());
        assert_eq!(pool.resolve(rec.biotype.unwrap()), "lncRNA");
        assert_eq!(rec.attributes.get("Name").map(String::as_str), Some("DDX11L2"));
    }

    #[test]
    fn splits_multiple_parents() {
        let mut pool = StringPool::new();
        let rec = parse_line(EXON_LINE, &mut pool).unwrap().unwrap();
        assert!(matches!(rec.kind, FeatureKind::Exon));
        assert_eq!(rec.parents.len(), 2);
        assert_eq!(pool.resolve(rec.parents[0]), "ENST00000456328");
        assert_eq!(pool.resolve(rec.parents[1]), "ENST00000450305");
        assert!(rec.id.is_none());
    }

    #[test]
    fn comments_and_blanks_yield_none() {
        let mut pool = StringPool::new();
        assert!(parse_line("##gff-version 3", &mut pool).unwrap().is_none());
        assert!(parse_line("# free text", &mut pool).unwrap().is_none());
        assert!(parse_line("", &mut pool).unwrap().is_none());
        assert!(parse_line("\n", &mut pool).unwrap().is_none());
    }

    #[test]
    fn short_lines_are_malformed_not_fatal() {
        let mut pool = StringPool::new();
        let err = parse_line("chr1\tsrc\tgene\t1\t10", &mut pool).unwrap_err();
        assert_eq!(err, MalformedLineError::TooFewColumns(5));
    }

    #[test]
    fn bad_coordinates_are_malformed() {
        let mut pool = StringPool::new();
        let line = "chr1\tsrc\tgene\tabc\t10\t.\t+\t.\tID=g1";
        assert!(matches!(
            parse_line(line, &mut pool),
            Err(MalformedLineError::BadCoordinate(_))
        ));
        // inverted interval
        let line = "chr1\tsrc\tgene\t20\t10\t.\t+\t.\tID=g1";
        assert!(matches!(
            parse_line(line, &mut pool),
            Err(MalformedLineError::BadCoordinate(_))
        ));
    }

    #[test]
    fn percent_escapes_are_decoded() {
        assert_eq!(percent_decode("plain"), "plain");
        assert_eq!(percent_decode("a%3Bb"), "a;b");
        assert_eq!(percent_decode("a%3Db"), "a=b");
        assert_eq!(percent_decode("tab%09sep"), "tab\tsep");
        assert_eq!(percent_decode("100%25"), "100%");
        // broken escape passes through
        assert_eq!(percent_decode("50%ZZ"), "50%ZZ");
        assert_eq!(percent_decode("trail%2"), "trail%2");
    }

    #[test]
    fn decoded_values_land_in_the_attribute_map() {
        let mut pool = StringPool::new();
        let line = "chr1\tsrc\tgene\t1\t10\t.\t+\t.\tID=g1;note=has%3B%20semicolon";
        let rec = parse_line(line, &mut pool).unwrap().unwrap();
        assert_eq!(
            rec.attributes.get("note").map(String::as_str),
            Some("has; semicolon")
        );
    }

    #[test]
    fn attribute_pairs_without_equals_are_skipped() {
        let mut pool = StringPool::new();
        let line = "chr1\tsrc\texon\t1\t10\t.\t-\t.\tjunk;Parent=t1";
        let rec = parse_line(line, &mut pool).unwrap().unwrap();
        assert_eq!(rec.parents.len(), 1);
        assert_eq!(rec.strand, Strand::Reverse);
    }

    #[test]
    fn gene_like_types_are_recognized() {
        assert!(matches!(FeatureKind::classify("gene"), FeatureKind::Gene));
        assert!(matches!(
            FeatureKind::classify("pseudogene"),
            FeatureKind::Gene
        ));
        assert!(matches!(
            FeatureKind::classify("ncRNA_gene"),
            FeatureKind::Gene
        ));
        assert!(matches!(FeatureKind::classify("mRNA"), FeatureKind::Other));
        assert!(matches!(FeatureKind::classify("CDS"), FeatureKind::Cds));
    }
}
