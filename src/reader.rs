use crate::error::{ErrorCode, ParseError};

// tags that vanish with their line when they stand alone on it
static STANDALONE_SIGILS: &str = "#^/<>=!";


#[derive(Clone, Debug)]
pub(crate) struct Reader<'a> {
    input: &'a str,
    open_delimiter: &'a str,
    close_delimiter: &'a str,
    pos: usize,
    line: usize,
}


/// Text preceding the next tag.
///
/// When the tag may stand alone on its line, the spaces right before it
/// are split off as `padding`.
#[derive(Debug, PartialEq)]
pub(crate) struct TextRun<'a> {
    pub(crate) text: &'a str,
    pub(crate) padding: &'a str,
    pub(crate) may_standalone: bool,
    pub(crate) at_end: bool,
}

/// A tag body, trimmed, without its delimiters.
#[derive(Debug, PartialEq)]
pub(crate) struct TagRead<'a> {
    pub(crate) body: &'a str,
    pub(crate) standalone: bool,
    pub(crate) line: usize,
}


impl<'a> Reader<'a> {
    pub(crate) fn new(input: &'a str, open_delimiter: &'a str, close_delimiter: &'a str) -> Self {
        Reader {
            input,
            open_delimiter,
            close_delimiter,
            pos: 0,
            line: 1,
        }
    }

    pub(crate) fn line(&self) -> usize {
        self.line
    }

    pub(crate) fn delimiters(&self) -> (&'a str, &'a str) {
        (self.open_delimiter, self.close_delimiter)
    }

    pub(crate) fn set_delimiters(&mut self, od: &'a str, cd: &'a str) {
        self.open_delimiter = od;
        self.close_delimiter = cd;
    }

    /// Read up to the next open delimiter, leaving the cursor on the tag body.
    pub(crate) fn read_text(&mut self) -> TextRun<'a> {
        let start = self.pos;
        let tail = &self.input[start..];
        let Some(offset) = tail.find(self.open_delimiter) else {
            self.pos = self.input.len();
            self.line += tail.count_newlines();
            return TextRun { text: tail, padding: "", may_standalone: false, at_end: true };
        };
        let tag_start = start + offset;
        self.line += self.input[start..tag_start].count_newlines();
        self.pos = tag_start + self.open_delimiter.len();

        let bytes = self.input.as_bytes();
        let mut line_start = tag_start;
        while line_start > start && matches!(bytes[line_start - 1], b' ' | b'\t') {
            line_start -= 1;
        }
        let may_standalone = line_start == 0 || bytes[line_start - 1] == b'\n';
        if may_standalone {
            TextRun {
                text: &self.input[start..line_start],
                padding: &self.input[line_start..tag_start],
                may_standalone,
                at_end: false,
            }
        } else {
            TextRun {
                text: &self.input[start..tag_start],
                padding: "",
                may_standalone,
                at_end: false,
            }
        }
    }

    /// Read a tag body up to its close delimiter. A standalone tag also
    /// consumes the rest of its line, newline included.
    pub(crate) fn read_tag(&mut self, may_standalone: bool) -> Result<TagRead<'a>, ParseError> {
        let line = self.line;
        let tail = &self.input[self.pos..];
        let (terminator, keep) = if tail.starts_with('{') {
            (format!("}}{}", self.close_delimiter), 1)
        } else {
            (self.close_delimiter.to_owned(), 0)
        };
        let Some(end) = tail.find(&terminator) else {
            return Err(ParseError::new(line, ErrorCode::UnmatchedOpenTag));
        };
        let body = tail[..end + keep].trim();
        self.line += tail[..end].count_newlines();
        self.pos += end + terminator.len();
        if body.is_empty() {
            return Err(ParseError::new(line, ErrorCode::EmptyTag));
        }

        let mut standalone = false;
        if may_standalone && body.starts_with(|c: char| STANDALONE_SIGILS.contains(c)) {
            let rest = &self.input[self.pos..];
            let after_spaces = rest.trim_start_matches([' ', '\t']);
            let eow = self.pos + rest.len() - after_spaces.len();
            if after_spaces.is_empty() {
                standalone = true;
                self.pos = eow;
            } else if after_spaces.starts_with('\n') {
                standalone = true;
                self.pos = eow + 1;
                self.line += 1;
            } else if after_spaces.starts_with("\r\n") {
                standalone = true;
                self.pos = eow + 2;
                self.line += 1;
            }
        }
        Ok(TagRead { body, standalone, line })
    }
}


trait ReaderStringOps {
    fn count_newlines(&self) -> usize;
}

impl ReaderStringOps for str {
    fn count_newlines(&self) -> usize {
        self.bytes().filter(|b| *b == b'\n').count()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only() {
        let mut reader = Reader::new(" 123456 ", "{{", "}}");
        assert_eq!(
            reader.read_text(),
            TextRun { text: " 123456 ", padding: "", may_standalone: false, at_end: true }
        );
    }

    #[test]
    fn standalone_tag_consumes_its_line() {
        let mut reader = Reader::new("x\n   {{/a}}  \ny", "{{", "}}");
        let run = reader.read_text();
        assert_eq!(run, TextRun { text: "x\n", padding: "   ", may_standalone: true, at_end: false });
        let tag = reader.read_tag(run.may_standalone).unwrap();
        assert_eq!(tag, TagRead { body: "/a", standalone: true, line: 2 });
        assert_eq!(reader.line(), 3);
        assert_eq!(reader.read_text().text, "y");
    }

    #[test]
    fn variable_is_never_standalone() {
        let mut reader = Reader::new("  {{a}}\n", "{{", "}}");
        let run = reader.read_text();
        assert!(run.may_standalone);
        let tag = reader.read_tag(run.may_standalone).unwrap();
        assert!(!tag.standalone);
        assert_eq!(reader.read_text().text, "\n");
    }

    #[test]
    fn text_after_tag_prevents_standalone() {
        let mut reader = Reader::new("{{#a}} x\n", "{{", "}}");
        let run = reader.read_text();
        let tag = reader.read_tag(run.may_standalone).unwrap();
        assert!(!tag.standalone);
        assert_eq!(reader.read_text().text, " x\n");
    }

    #[test]
    fn tag_after_tag_on_same_line() {
        let mut reader = Reader::new("{{a}} {{#b}}\n", "{{", "}}");
        let run = reader.read_text();
        reader.read_tag(run.may_standalone).unwrap();
        let run = reader.read_text();
        assert_eq!(run, TextRun { text: " ", padding: "", may_standalone: false, at_end: false });
    }

    #[test]
    fn crlf_standalone() {
        let mut reader = Reader::new("{{!c}}\r\nx", "{{", "}}");
        let run = reader.read_text();
        let tag = reader.read_tag(run.may_standalone).unwrap();
        assert!(tag.standalone);
        assert_eq!(reader.read_text().text, "x");
    }

    #[test]
    fn triple_mustache_keeps_inner_braces() {
        let mut reader = Reader::new("{{{ v }}}", "{{", "}}");
        reader.read_text();
        assert_eq!(reader.read_tag(false).unwrap().body, "{ v }");
    }

    #[test]
    fn custom_delimiters() {
        let mut reader = Reader::new("a <%b%> c", "{{", "}}");
        reader.set_delimiters("<%", "%>");
        assert_eq!(reader.read_text().text, "a ");
        assert_eq!(reader.read_tag(false).unwrap().body, "b");
        assert_eq!(reader.read_text().text, " c");
    }

    #[test]
    fn unmatched_open_tag_reports_its_line() {
        let mut reader = Reader::new("a\nb {{x\n", "{{", "}}");
        reader.read_text();
        let err = reader.read_tag(false).unwrap_err();
        assert_eq!(err, ParseError::new(2, ErrorCode::UnmatchedOpenTag));
    }

    #[test]
    fn empty_tag() {
        let mut reader = Reader::new("{{  }}", "{{", "}}");
        reader.read_text();
        let err = reader.read_tag(true).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyTag);
    }

    #[test]
    fn multiline_tag_advances_lines() {
        let mut reader = Reader::new("{{!\n\n}}x{{y}}", "{{", "}}");
        let run = reader.read_text();
        reader.read_tag(run.may_standalone).unwrap();
        reader.read_text();
        assert_eq!(reader.read_tag(false).unwrap().line, 3);
    }
}
