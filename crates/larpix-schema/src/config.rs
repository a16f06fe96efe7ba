/// Options for reading a packet table back into packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConfig {
    /// Drop rows that cannot become a packet instead of failing the read.
    pub skip_unparsable: bool,

    /// First row to read.
    pub start: Option<usize>,

    /// Row to stop before.
    pub end: Option<usize>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            skip_unparsable: true,
            start: None,
            end: None,
        }
    }
}

impl ParseConfig {
    pub fn with_skip_unparsable(mut self, skip: bool) -> Self {
        self.skip_unparsable = skip;
        self
    }

    pub fn with_start(mut self, start: usize) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: usize) -> Self {
        self.end = Some(end);
        self
    }

    /// Row range selected out of a table of `len` rows.
    pub fn range(&self, len: usize) -> std::ops::Range<usize> {
        let end = self.end.map_or(len, |end| end.min(len));
        let start = self.start.unwrap_or(0).min(end);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reads_everything() {
        let config = ParseConfig::default();
        assert!(config.skip_unparsable);
        assert_eq!(config.range(10), 0..10);
    }

    #[test]
    fn range_is_clamped() {
        assert_eq!(ParseConfig::default().with_start(3).with_end(7).range(10), 3..7);
        assert_eq!(ParseConfig::default().with_end(70).range(10), 0..10);
        assert_eq!(ParseConfig::default().with_start(12).range(10), 10..10);
        assert_eq!(ParseConfig::default().with_start(8).with_end(4).range(10), 4..4);
    }
}
