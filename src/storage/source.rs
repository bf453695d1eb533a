//! Glob-addressed JSON input

use super::location::Storage;
use crate::decode::{decoder_for, Decoded, DecoderFormat, RecordDecoder};
use crate::error::{Error, Result};
use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use serde_json::Value;

/// Source of raw JSON records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Root of the source, for display
    fn location(&self) -> String;

    /// Files matching a glob relative to the source root, in sorted order
    async fn list_matching(&self, glob: &str) -> Result<Vec<String>>;

    /// Decode every record of every file matching a glob
    ///
    /// Fails with `SourceNotFound` when nothing matches and with the storage
    /// error when a matched file can't be fetched. Files that aren't UTF-8 and
    /// malformed lines are skipped and counted.
    async fn read_json(&self, glob: &str, format: DecoderFormat) -> Result<Decoded<Value>>;
}

/// Directory part of a glob that contains no wildcards
pub fn glob_literal_prefix(glob: &str) -> String {
    let segments: Vec<&str> = glob.split('/').filter(|s| !s.is_empty()).collect();
    let literal = segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .take_while(|s| !s.contains(['*', '?', '[', '{']))
        .copied()
        .collect::<Vec<_>>();
    literal.join("/")
}

/// Compile a glob where `*` does not cross directory boundaries
fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern.trim_start_matches('/'))
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| Error::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

impl Storage {
    /// Decode one file, counting it as skipped if it can't be read as text
    async fn read_file(&self, path: &str, decoder: &dyn RecordDecoder) -> Result<Decoded<Value>> {
        let data = self.get(path).await?;
        match std::str::from_utf8(&data) {
            Ok(body) => Ok(decoder.decode(path, body)),
            Err(e) => {
                tracing::warn!(path, error = %e, "Skipping file that is not UTF-8");
                Ok(Decoded {
                    records: Vec::new(),
                    skipped: 1,
                })
            }
        }
    }
}

#[async_trait]
impl RecordSource for Storage {
    fn location(&self) -> String {
        self.root()
    }

    async fn list_matching(&self, glob: &str) -> Result<Vec<String>> {
        let matcher = compile_glob(glob)?;
        let prefix = glob_literal_prefix(glob);
        let files = self
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|path| matcher.is_match(path))
            .collect();
        Ok(files)
    }

    async fn read_json(&self, glob: &str, format: DecoderFormat) -> Result<Decoded<Value>> {
        let files = self.list_matching(glob).await?;
        if files.is_empty() {
            return Err(Error::source_not_found(self.display_relative(glob)));
        }

        tracing::info!(
            source = %self.display_relative(glob),
            files = files.len(),
            ?format,
            "Reading source files"
        );

        let decoder = decoder_for(format);
        let mut decoded = Decoded::new();
        for path in &files {
            let file = self.read_file(path, decoder.as_ref()).await?;
            tracing::debug!(path, records = file.len(), skipped = file.skipped, "Decoded file");
            decoded.extend(file);
        }

        if decoded.skipped > 0 {
            tracing::warn!(
                source = %self.display_relative(glob),
                skipped = decoded.skipped,
                "Skipped malformed input"
            );
        }

        Ok(decoded)
    }
}
