//! Forward-only, line-numbered cursor over a report buffer.

/// Cursor over the lines of a `gstat` report.
///
/// Lines are split on `\n` with a trailing `\r` stripped, the same way
/// `str::lines` does it. The cursor never rewinds.
#[derive(Debug, Clone)]
pub struct LineSource<'a> {
    lines: std::str::Lines<'a>,
    line_number: usize,
}

impl<'a> LineSource<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            line_number: 0,
        }
    }

    /// Returns the next line, or `None` at end of input.
    pub fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line_number += 1;
        Some(line)
    }

    /// Consumes lines until one equals `marker` exactly.
    ///
    /// Returns `false` if end of input is reached first; the cursor is then
    /// left at the end.
    pub fn forward_to(&mut self, marker: &str) -> bool {
        while let Some(line) = self.next_line() {
            if line == marker {
                return true;
            }
        }
        false
    }

    /// 1-based number of the line last returned (0 before the first read).
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<'a> Iterator for LineSource<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_line_counts_lines() {
        let mut src = LineSource::new("a\nb\r\nc");
        assert_eq!(src.line_number(), 0);
        assert_eq!(src.next_line(), Some("a"));
        assert_eq!(src.next_line(), Some("b"));
        assert_eq!(src.next_line(), Some("c"));
        assert_eq!(src.line_number(), 3);
        assert_eq!(src.next_line(), None);
        assert_eq!(src.line_number(), 3);
    }

    #[test]
    fn test_forward_to_found() {
        let mut src = LineSource::new("x\nMARK\ny\n");
        assert!(src.forward_to("MARK"));
        assert_eq!(src.line_number(), 2);
        assert_eq!(src.next_line(), Some("y"));
    }

    #[test]
    fn test_forward_to_requires_exact_match() {
        let mut src = LineSource::new("  MARK\nMARK  \n");
        assert!(!src.forward_to("MARK"));
        assert_eq!(src.next_line(), None);
    }

    #[test]
    fn test_forward_to_on_empty_input() {
        let mut src = LineSource::new("");
        assert!(!src.forward_to("MARK"));
        assert_eq!(src.line_number(), 0);
    }
}
