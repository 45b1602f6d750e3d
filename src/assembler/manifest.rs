//! Text manifest standing in for content split across several backend objects.
//!
//! ```text
//! tgstate-blob
//! <original filename>
//! size<N>            (optional)
//! <chunk short id>   (one per line, in emission order)
//! ```

use thiserror::Error;

/// Tag on the first line of every manifest. Exactly [`MAGIC_LEN`] bytes.
pub const BLOB_MAGIC: &str = "tgstate-blob";

/// Number of leading bytes probed to classify an object.
pub const MAGIC_LEN: usize = BLOB_MAGIC.len();

const SIZE_PREFIX: &str = "size";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest has {0} lines, expected at least 3")]
    TooShort(usize),
    #[error("manifest does not start with the blob tag")]
    MissingTag,
    #[error("invalid declared size: {0:?}")]
    InvalidSize(String),
    #[error("manifest is not valid UTF-8")]
    NotUtf8,
    #[error("manifest exceeds {0} bytes")]
    TooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobManifest {
    pub filename: String,
    /// Total byte count of the reassembled content, when the producer declared it.
    pub size: Option<u64>,
    /// Chunk short IDs in emission order.
    pub chunks: Vec<String>,
}

impl BlobManifest {
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < 3 {
            return Err(ManifestError::TooShort(lines.len()));
        }
        // Anything after the tag on the first line is ignored
        if !lines[0].starts_with(BLOB_MAGIC) {
            return Err(ManifestError::MissingTag);
        }

        let filename = lines[1].trim_end_matches('\r').to_string();

        let (size, chunk_start) = match lines[2].trim_end_matches('\r').strip_prefix(SIZE_PREFIX) {
            // A bare `size` line declares nothing
            Some(raw) if raw.trim().is_empty() => (None, 3),
            Some(raw) => {
                let size = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ManifestError::InvalidSize(raw.to_string()))?;
                (Some(size), 3)
            }
            None => (None, 2),
        };

        let chunks = lines[chunk_start..]
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();

        Ok(Self {
            filename,
            size,
            chunks,
        })
    }

    pub fn encode(&self) -> String {
        let mut lines = vec![BLOB_MAGIC.to_string(), self.filename.clone()];
        if let Some(size) = self.size {
            lines.push(format!("{SIZE_PREFIX}{size}"));
        }
        lines.extend(self.chunks.iter().cloned());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_is_probe_sized() {
        assert_eq!(MAGIC_LEN, 12);
    }

    #[test]
    fn test_encode_then_parse() {
        let manifest = BlobManifest {
            filename: "a.txt".to_string(),
            size: Some(42),
            chunks: vec!["c1".into(), "c2".into(), "c3".into()],
        };
        let text = manifest.encode();
        assert_eq!(text, "tgstate-blob\na.txt\nsize42\nc1\nc2\nc3");

        let parsed = BlobManifest::parse(&text).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_parse_without_size() {
        let parsed = BlobManifest::parse("tgstate-blob\nbig.bin\nc1\nc2").unwrap();
        assert_eq!(parsed.filename, "big.bin");
        assert_eq!(parsed.size, None);
        assert_eq!(parsed.chunks, vec!["c1", "c2"]);
    }

    #[test]
    fn test_parse_trims_and_skips_blank_chunk_lines() {
        let parsed =
            BlobManifest::parse("tgstate-blob\r\nbig.bin\r\nsize10\r\n  c1 \r\n\r\n\n\tc2\n").unwrap();
        assert_eq!(parsed.filename, "big.bin");
        assert_eq!(parsed.size, Some(10));
        assert_eq!(parsed.chunks, vec!["c1", "c2"]);
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(
            BlobManifest::parse("tgstate-blob\nonly-name"),
            Err(ManifestError::TooShort(2))
        );
    }

    #[test]
    fn test_parse_rejects_missing_tag() {
        assert_eq!(
            BlobManifest::parse("not-a-blob!!\nname\nc1"),
            Err(ManifestError::MissingTag)
        );
    }

    #[test]
    fn test_parse_ignores_text_after_tag() {
        let parsed = BlobManifest::parse("tgstate-blob v2\nx.bin\nc1").unwrap();
        assert_eq!(parsed.filename, "x.bin");
        assert_eq!(parsed.chunks, vec!["c1"]);
    }

    #[test]
    fn test_parse_bare_size_line() {
        let parsed = BlobManifest::parse("tgstate-blob\nx.bin\nsize\nc1\nc2").unwrap();
        assert_eq!(parsed.size, None);
        assert_eq!(parsed.chunks, vec!["c1", "c2"]);
    }

    #[test]
    fn test_parse_rejects_bad_size() {
        assert_eq!(
            BlobManifest::parse("tgstate-blob\nname\nsizeXL\nc1"),
            Err(ManifestError::InvalidSize("XL".to_string()))
        );
    }

    #[test]
    fn test_manifest_with_no_chunks_is_valid() {
        let parsed = BlobManifest::parse("tgstate-blob\nempty.bin\nsize0").unwrap();
        assert_eq!(parsed.size, Some(0));
        assert!(parsed.chunks.is_empty());
    }
}
