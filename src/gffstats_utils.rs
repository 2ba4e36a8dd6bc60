use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use tracing::trace;

/// Type alias for a boxed line reader over a byte source. It is used to
/// allow the pipeline to consume local files and HTTP responses through
/// the same entry point.
pub type ByteSource = Box<dyn BufRead>;

/// Returns `true` when `source` names a remote resource. Explicit
/// protocol prefixes avoid confusing local paths for URLs.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Tests if the stream underlying the [BufRead] `reader` is gzipped or not
/// by examining the first 2 bytes for the magic header. This function
/// *requires*, but does not check, that none of the stream has yet been
/// consumed. It will fill the buffer to examine the first two bytes, but
/// will not consume them.
pub fn is_gzipped<T: BufRead>(reader: &mut T) -> std::io::Result<bool> {
    const GZIP_MAGIC_NUMBER: [u8; 2] = [0x1f, 0x8b];

    let src = reader.fill_buf()?;
    Ok(src.get(..2) == Some(&GZIP_MAGIC_NUMBER))
}

/// Opens a local file as a raw [`ByteSource`]. Compression is not
/// resolved here; the pipeline sniffs the magic bytes on the unconsumed
/// stream so local and remote sources share one decompression path.
pub fn source_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<ByteSource> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("cannot open GFF file {}", path.display()))?;
    trace!("opened local file {}", path.display());
    Ok(Box::new(BufReader::new(file)))
}

/// Fetches `url` with a blocking client and exposes the response body as
/// a raw [`ByteSource`]. The body is streamed, not buffered whole; there
/// is no overall request deadline because annotation files routinely take
/// minutes to stream, only a connect timeout.
pub fn source_from_url(url: &str) -> anyhow::Result<ByteSource> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(120))
        .timeout(None)
        .build()
        .context("cannot build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("{} answered with an error status", url))?;
    trace!("streaming response body from {}", url);
    Ok(Box::new(BufReader::new(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection_requires_an_explicit_protocol() {
        assert!(is_url("https://ftp.example.org/genes.gff3.gz"));
        assert!(is_url("http://example.org/genes.gff3"));
        assert!(!is_url("ftp://example.org/genes.gff3"));
        assert!(!is_url("/data/genes.gff3"));
        assert!(!is_url("genes.gff3.gz"));
    }

    #[test]
    fn gzip_probe_reads_without_consuming() {
        let gzipped: &[u8] = &[0x1f, 0x8b, 0x08, 0x00];
        let mut rdr = BufReader::new(gzipped);
        assert!(is_gzipped(&mut rdr).unwrap());
        // the probe must leave the stream intact
        let mut first = [0u8; 2];
        std::io::Read::read_exact(&mut rdr, &mut first).unwrap();
        assert_eq!(first, [0x1f, 0x8b]);

        let plain: &[u8] = b"chr1\tsrc\tgene";
        let mut rdr = BufReader::new(plain);
        assert!(!is_gzipped(&mut rdr).unwrap());
    }
}
