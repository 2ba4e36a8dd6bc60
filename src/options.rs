use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    /// Feature types dropped before hierarchy construction. Sequence
    /// scaffolding records never participate in gene statistics and
    /// skipping them early saves hundreds of thousands of attribute
    /// parses on genome-scale files.
    pub static ref DEFAULT_SKIP_TYPES: HashSet<&'static str> =
        ["region", "chromosome", "scaffold"].iter().copied().collect();
}

/// Knobs for a summary run.
///
/// The defaults match the CLI's behavior on a plain invocation: gzip is
/// auto-detected from the stream's magic bytes and the standard
/// scaffolding feature types are skipped.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Decompress unconditionally instead of sniffing the gzip magic.
    pub force_gzip: bool,
    /// Feature types excluded before the hierarchy sees them.
    pub skip_types: HashSet<String>,
}

impl Default for SummaryOptions {
    fn default() -> SummaryOptions {
        SummaryOptions {
            force_gzip: false,
            skip_types: DEFAULT_SKIP_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}
