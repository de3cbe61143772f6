//! Buffer tuning.

/// Default size of reusable transfer buffers, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Default upper bound of a single line read by [`LineReader`].
///
/// [`LineReader`]: crate::io::LineReader
pub const DEFAULT_MAX_LINE_LEN: usize = 8 * 1024;

/// Buffer configuration for readers and relays.
///
/// ```
/// let config = ferry::Config::new().buffer_size(64 * 1024).max_line_len(1024);
/// assert_eq!(config.get_buffer_size(), 64 * 1024);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    buffer_size: usize,
    max_line_len: usize,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Set the reusable buffer capacity, zero is clamped to one.
    pub const fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = if size == 0 { 1 } else { size };
        self
    }

    /// Set the maximum line length accepted by `read_line`, zero is clamped to one.
    pub const fn max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = if len == 0 { 1 } else { len };
        self
    }

    pub const fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub const fn get_max_line_len(&self) -> usize {
        self.max_line_len
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp_zero() {
        let config = Config::new().buffer_size(0).max_line_len(0);
        assert_eq!(config.get_buffer_size(), 1);
        assert_eq!(config.get_max_line_len(), 1);
        assert_eq!(Config::default(), Config::new());
    }
}
