use crate::parser::ParseError;

/// Character cursor over one declaration text.
#[derive(Debug, Default)]
pub struct Cursor {
    pub position: usize,
    pub length: usize,
    pub text_v: Vec<char>,
    pub text: String,
}

impl Cursor {
    pub fn new(text: &str) -> Self {
        Self {
            position: 0,
            length: text.chars().count(),
            text_v: text.chars().collect(),
            text: text.to_string(),
        }
    }

    pub fn eof(&self) -> bool {
        self.position >= self.length
    }

    pub fn current(&self) -> char {
        if self.position < self.length {
            return self.text_v[self.position];
        }
        '\0'
    }

    pub fn next(&mut self) {
        self.position += 1;
    }

    pub fn next_non_whitespace(&mut self) {
        while !self.eof() && self.current().is_whitespace() {
            self.next();
        }
    }

    pub fn text_from_range(&self, start: usize, end: usize) -> String {
        let mut end = end;
        if end > self.length {
            end = self.length;
        }
        if start >= end {
            return String::new();
        }
        self.text_v[start..end].iter().collect()
    }

    /// True when the upcoming word equals `keyword` case-insensitively and
    /// ends at a word boundary. Does not advance.
    pub fn at_keyword(&self, keyword: &str) -> bool {
        let mut pos = self.position;
        for expected in keyword.chars() {
            if pos >= self.length
                || !self.text_v[pos].eq_ignore_ascii_case(&expected)
            {
                return false;
            }
            pos += 1;
        }
        pos >= self.length || !Self::is_identifier_char(self.text_v[pos])
    }

    /// Consume `keyword` (plus leading whitespace) when present.
    pub fn take_keyword(&mut self, keyword: &str) -> bool {
        self.next_non_whitespace();
        if self.at_keyword(keyword) {
            self.position += keyword.chars().count();
            true
        } else {
            false
        }
    }

    pub fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.next_non_whitespace();
        if self.current() != expected {
            return ParseError::new(
                &format!("expected '{}'", expected),
                self.position,
                self,
            )
            .err();
        }
        self.next();
        Ok(())
    }

    pub fn is_identifier_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    pub fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.next_non_whitespace();
        let pivot = self.position;
        let first = self.current();
        if !(first.is_ascii_alphabetic() || first == '_') {
            return ParseError::new("expected identifier", pivot, self).err();
        }
        while !self.eof() && Self::is_identifier_char(self.current()) {
            self.next();
        }
        Ok(self.text_from_range(pivot, self.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_allows_leading_underscore() {
        let mut cursor = Cursor::new("  _minmax_count_projection rest");
        assert_eq!(cursor.parse_identifier().unwrap(), "_minmax_count_projection");
        assert_eq!(cursor.current(), ' ');
    }

    #[test]
    fn keyword_matching_is_case_insensitive_and_bounded() {
        let mut cursor = Cursor::new("GROUP BY x");
        assert!(cursor.take_keyword("group"));
        assert!(cursor.take_keyword("by"));
        assert!(!Cursor::new("grouping").at_keyword("group"));
    }

    #[test]
    fn expect_char_reports_position() {
        let mut cursor = Cursor::new("abc");
        let err = cursor.expect_char('(').unwrap_err();
        assert!(err.message.contains("expected '('"));
        assert_eq!(err.start, 0);
    }
}
