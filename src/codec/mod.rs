//! # codec
//!
//! Encodes the difference between an original field and its processed counterpart as a
//! compact, line-safe token, and replays such a token against the original field.
//!
//! The diff itself is computed by [`similar`] with a deadline, so that pathological fields
//! still produce a valid (if less compact) edit script in bounded time.
//!
//! ```
//! use fqdelta::{DiffConfig, FieldDiffCodec};
//!
//! let codec = FieldDiffCodec::new(DiffConfig::default());
//! let token = codec.encode("ACGTNNACGT", "ACGTACGT");
//! assert_eq!(codec.decode("ACGTNNACGT", &token).unwrap(), "ACGTACGT");
//! ```

mod script;

use std::time::Instant;

use similar::{Algorithm, DiffTag};

pub use script::{Edit, EditScript, EMPTY_SCRIPT};

use crate::config::DiffConfig;
use crate::error::Result;

/// Line-level diff codec
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldDiffCodec {
    config: DiffConfig,
}
impl FieldDiffCodec {
    #[must_use]
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> DiffConfig {
        self.config
    }

    /// Computes the edit script turning `original` into `processed`
    #[must_use]
    pub fn diff(&self, original: &str, processed: &str) -> EditScript {
        let mut script = EditScript::new();
        if original == processed {
            script.push(Edit::Keep(original.chars().count()));
            return script;
        }

        let old: Vec<char> = original.chars().collect();
        let new: Vec<char> = processed.chars().collect();

        // common prefix and suffix never need searching
        let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        let old_mid = &old[prefix..old.len() - suffix];
        let new_mid = &new[prefix..new.len() - suffix];

        script.push(Edit::Keep(prefix));
        if old_mid.len() > self.config.match_window || new_mid.len() > self.config.match_window {
            script.push(Edit::Delete(old_mid.len()));
            script.push(Edit::Insert(new_mid.iter().collect()));
        } else {
            let deadline = Instant::now().checked_add(self.config.timeout);
            let ops = similar::capture_diff_slices_deadline(Algorithm::Myers, old_mid, new_mid, deadline);
            for op in &ops {
                let (tag, old_range, new_range) = op.as_tag_tuple();
                match tag {
                    DiffTag::Equal => script.push(Edit::Keep(old_range.len())),
                    DiffTag::Delete => script.push(Edit::Delete(old_range.len())),
                    DiffTag::Insert => script.push(Edit::Insert(new_mid[new_range].iter().collect())),
                    DiffTag::Replace => {
                        script.push(Edit::Delete(old_range.len()));
                        script.push(Edit::Insert(new_mid[new_range].iter().collect()));
                    }
                }
            }
        }
        script.push(Edit::Keep(suffix));
        script
    }

    /// Encodes the edit script turning `original` into `processed` as a single-line token
    #[must_use]
    pub fn encode(&self, original: &str, processed: &str) -> String {
        self.diff(original, processed).to_token()
    }

    /// Applies a token produced by [`FieldDiffCodec::encode`] to `original`
    pub fn decode(&self, original: &str, token: &str) -> Result<String> {
        EditScript::parse(token)?.apply(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiffConfigBuilder;
    use crate::error::DeltaError;

    fn roundtrip(codec: &FieldDiffCodec, original: &str, processed: &str) -> Result<String> {
        let token = codec.encode(original, processed);
        assert!(!token.is_empty());
        assert!(!token.contains('\n'));
        assert_eq!(codec.decode(original, &token)?, processed);
        Ok(token)
    }

    #[test]
    fn test_identical_fields() -> Result<()> {
        let codec = FieldDiffCodec::default();
        assert_eq!(roundtrip(&codec, "ACGT", "ACGT")?, "=4");
        assert_eq!(roundtrip(&codec, "", "")?, EMPTY_SCRIPT);
        Ok(())
    }

    #[test]
    fn test_trimmed_read() -> Result<()> {
        let codec = FieldDiffCodec::default();
        assert_eq!(roundtrip(&codec, "NNACGTACGT", "ACGTACGT")?, "-2\t=8");
        assert_eq!(roundtrip(&codec, "IIIIIIII##", "IIIIIIII")?, "=8\t-2");
        Ok(())
    }

    #[test]
    fn test_against_empty_original() -> Result<()> {
        let codec = FieldDiffCodec::default();
        assert_eq!(roundtrip(&codec, "", "@new\tread")?, "+@new%09read");
        assert_eq!(roundtrip(&codec, "+comment", "")?, "-8");
        Ok(())
    }

    #[test]
    fn test_scattered_edits() -> Result<()> {
        let codec = FieldDiffCodec::default();
        roundtrip(&codec, "ACGTACGTACGTACGT", "ACCTACGTAGGTACGA")?;
        roundtrip(&codec, "@read/1 length=150", "@read/1\tlength=148 trimmed")?;
        roundtrip(&codec, "héllo wörld", "hello world!")?;
        Ok(())
    }

    #[test]
    fn test_window_falls_back_to_replacement() -> Result<()> {
        let codec = FieldDiffCodec::new(DiffConfigBuilder::new().match_window(4).build());
        let token = roundtrip(&codec, "AAxxxxxxBB", "AAyyyyyyBB")?;
        assert_eq!(token, "=2\t-6\t+yyyyyy\t=2");
        Ok(())
    }

    #[test]
    fn test_zero_budget_still_roundtrips() -> Result<()> {
        let codec = FieldDiffCodec::new(
            DiffConfigBuilder::new()
                .timeout(std::time::Duration::ZERO)
                .build(),
        );
        let original = "ACGT".repeat(200);
        let processed = original.replace("CG", "GC");
        roundtrip(&codec, &original, &processed)?;
        Ok(())
    }

    #[test]
    fn test_decode_against_wrong_original() {
        let codec = FieldDiffCodec::default();
        let token = codec.encode("ACGTACGT", "ACGT");
        assert!(matches!(
            codec.decode("ACG", &token),
            Err(crate::Error::DeltaError(DeltaError::LengthMismatch { .. }))
        ));
    }
}
