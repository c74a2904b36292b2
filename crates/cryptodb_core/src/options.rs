//! Store open options.

/// Options controlling how a store is opened and maintained.
#[derive(Debug, Clone)]
pub struct Options {
    /// Whether to fsync the store file after every mutation (safer but slower).
    pub sync_on_put: bool,

    /// Garbage ratio above which the store is compacted at open time.
    ///
    /// The ratio is dead bytes over total record bytes, in `0.0..=1.0`.
    /// Set above `1.0` to disable compaction at open.
    pub compact_on_open_ratio: f64,

    /// Chunk size used when overwriting a store file during destroy.
    pub secure_destroy_chunk: usize,
}

impl Options {
    /// Built-in defaults, shared with the process-wide default registry.
    pub(crate) const BUILTIN: Self = Self {
        sync_on_put: true,
        compact_on_open_ratio: 0.5,
        secure_destroy_chunk: 64 * 1024,
    };

    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to fsync after every mutation.
    #[must_use]
    pub const fn sync_on_put(mut self, value: bool) -> Self {
        self.sync_on_put = value;
        self
    }

    /// Sets the garbage ratio that triggers compaction at open.
    #[must_use]
    pub const fn compact_on_open_ratio(mut self, ratio: f64) -> Self {
        self.compact_on_open_ratio = ratio;
        self
    }

    /// Sets the overwrite chunk size used by destroy.
    #[must_use]
    pub const fn secure_destroy_chunk(mut self, bytes: usize) -> Self {
        self.secure_destroy_chunk = bytes;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::BUILTIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = Options::default();
        assert!(options.sync_on_put);
        assert!(options.compact_on_open_ratio > 0.0);
        assert!(options.secure_destroy_chunk > 0);
    }

    #[test]
    fn builder_pattern() {
        let options = Options::new()
            .sync_on_put(false)
            .compact_on_open_ratio(0.25)
            .secure_destroy_chunk(4096);

        assert!(!options.sync_on_put);
        assert_eq!(options.compact_on_open_ratio, 0.25);
        assert_eq!(options.secure_destroy_chunk, 4096);
    }
}
