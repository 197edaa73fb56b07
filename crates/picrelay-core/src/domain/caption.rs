//! Caption - 画像に添えるテキスト
//!
//! The caption that reaches the remote service is always the user's text plus
//! a fixed source suffix. The service rejects media captions above
//! [`CAPTION_LIMIT`] characters, so callers check [`Caption::fits`] and move
//! oversized captions into a standalone text message instead of truncating.

use std::fmt;

/// Maximum caption length accepted on a media message.
pub const CAPTION_LIMIT: usize = 1024;

/// A derived caption: `"{text}\n\nSource: Web ({label})"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption(String);

impl Caption {
    /// Build the caption for an image from the user text and its source label.
    pub fn compose(text: &str, source_label: &str) -> Self {
        Self(format!("{text}\n\nSource: Web ({source_label})"))
    }

    /// Length in Unicode scalar values.
    pub(crate) fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// Can this caption ride on the media message itself?
    pub fn fits(&self, limit: usize) -> bool {
        self.len() <= limit
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append a generation seed to a prompt, the way generated-image captions
/// carry it.
pub fn with_seed(prompt: &str, seed: Option<u64>) -> String {
    match seed {
        Some(seed) => format!("{prompt}\n\nSeed: {seed}"),
        None => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn compose_appends_source_suffix() {
        let caption = Caption::compose("a red fox", "flux-dev");
        assert_eq!(caption.as_str(), "a red fox\n\nSource: Web (flux-dev)");
    }

    // suffix "\n\nSource: Web (m)" は 17 文字
    #[rstest]
    #[case::well_below(10, true)]
    #[case::exactly_at_limit(CAPTION_LIMIT - 17, true)]
    #[case::one_over(CAPTION_LIMIT - 16, false)]
    #[case::far_over(1100, false)]
    fn fits_respects_limit(#[case] text_len: usize, #[case] expected: bool) {
        let caption = Caption::compose(&"x".repeat(text_len), "m");
        assert_eq!(caption.fits(CAPTION_LIMIT), expected);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let caption = Caption::compose(&"ж".repeat(1000), "m");
        assert_eq!(caption.len(), 1017);
        assert!(caption.fits(CAPTION_LIMIT));
        assert!(caption.as_str().len() > CAPTION_LIMIT);
    }

    #[test]
    fn with_seed_appends_only_when_present() {
        assert_eq!(with_seed("cat", Some(42)), "cat\n\nSeed: 42");
        assert_eq!(with_seed("cat", None), "cat");
    }
}
