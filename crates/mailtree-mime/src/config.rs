//! Decoder configuration.

/// Default ceiling on multipart nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default ceiling on the number of nodes in one part tree.
pub const DEFAULT_MAX_PARTS: usize = 10_000;

/// Charset used when a part declares none that is usable and its
/// octets are not valid UTF-8.
pub const DEFAULT_FALLBACK_CHARSET: &str = "windows-1252";

/// Limits and fallbacks applied while decoding one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum multipart nesting depth. Deeper input fails closed.
    pub max_depth: usize,
    /// Maximum number of MIME parts, containers included.
    pub max_parts: usize,
    /// Charset label for undeclared or unknown charsets.
    pub fallback_charset: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_parts: DEFAULT_MAX_PARTS,
            fallback_charset: DEFAULT_FALLBACK_CHARSET.to_string(),
        }
    }
}

impl ParserConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::new()
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug, Clone, Default)]
pub struct ParserConfigBuilder {
    max_depth: Option<usize>,
    max_parts: Option<usize>,
    fallback_charset: Option<String>,
}

impl ParserConfigBuilder {
    /// Creates a new builder with nothing overridden.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum multipart nesting depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the maximum number of parts.
    #[must_use]
    pub const fn max_parts(mut self, parts: usize) -> Self {
        self.max_parts = Some(parts);
        self
    }

    /// Sets the fallback charset label.
    #[must_use]
    pub fn fallback_charset(mut self, label: impl Into<String>) -> Self {
        self.fallback_charset = Some(label.into());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ParserConfig {
        ParserConfig {
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            max_parts: self.max_parts.unwrap_or(DEFAULT_MAX_PARTS),
            fallback_charset: self
                .fallback_charset
                .unwrap_or_else(|| DEFAULT_FALLBACK_CHARSET.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParserConfig::default();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.max_parts, DEFAULT_MAX_PARTS);
        assert_eq!(config.fallback_charset, "windows-1252");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ParserConfig::builder()
            .max_depth(4)
            .max_parts(16)
            .fallback_charset("iso-8859-2")
            .build();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_parts, 16);
        assert_eq!(config.fallback_charset, "iso-8859-2");
    }

    #[test]
    fn test_builder_keeps_defaults() {
        let config = ParserConfig::builder().max_depth(2).build();
        assert_eq!(config.max_parts, DEFAULT_MAX_PARTS);
        assert_eq!(config.fallback_charset, DEFAULT_FALLBACK_CHARSET);
    }
}
