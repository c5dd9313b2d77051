extern crate stache;
use stache::{ErrorCode, ParseError, Template};


fn parse_error(text: &str) -> ParseError {
    Template::compile(text).unwrap_err()
}

#[test]
fn unmatched_open_tag() {
    let err = parse_error("{{x");
    assert_eq!(err.code, ErrorCode::UnmatchedOpenTag);
    assert_eq!(err.line, 1);
}

#[test]
fn unmatched_open_tag_on_later_line() {
    let err = parse_error("one\ntwo {{ok}}\nthree {{x\nfour");
    assert_eq!(err.code, ErrorCode::UnmatchedOpenTag);
    assert_eq!(err.line, 3);
    assert_eq!(err.to_string(), "line 3: unmatched open tag");
}

#[test]
fn empty_tag() {
    let err = parse_error("a\n{{  }}");
    assert_eq!(err.code, ErrorCode::EmptyTag);
    assert_eq!(err.line, 2);
}

#[test]
fn empty_section_name() {
    let err = parse_error("{{# }}{{/}}");
    assert_eq!(err.code, ErrorCode::EmptyTag);
}

#[test]
fn section_without_closing_tag() {
    let text = r#"
    {{#list}}
      {{item}}
    "#;
    let err = parse_error(text);
    assert_eq!(err.code, ErrorCode::SectionNoClosingTag);
    assert_eq!(err.reason.as_deref(), Some("list"));
    assert_eq!(err.line, 2);
    assert_eq!(err.to_string(), "line 2: section list has no closing tag");
}

#[test]
fn inner_section_without_closing_tag() {
    let err = parse_error("{{#outer}}\n{{#inner}}\n{{/outer}}");
    assert_eq!(err.code, ErrorCode::InterleavedClosingTag);
    assert_eq!(err.reason.as_deref(), Some("outer"));
    assert_eq!(err.line, 3);
}

#[test]
fn unmatched_close_tag() {
    let err = parse_error("text\n\n{{/section}}");
    assert_eq!(err.code, ErrorCode::UnmatchedCloseTag);
    assert_eq!(err.line, 3);
}

#[test]
fn invalid_meta_tags() {
    for text in ["{{=<% %>}}", "{{=<%=}}", "{{=<% | %>=}}"] {
        let err = parse_error(text);
        assert_eq!(err.code, ErrorCode::InvalidMetaTag, "{}", text);
    }
}

#[test]
fn invalid_variable() {
    let err = parse_error("ok\n{{items[0}}");
    assert_eq!(err.code, ErrorCode::InvalidVariable);
    assert_eq!(err.reason.as_deref(), Some("items[0"));
    assert_eq!(err.line, 2);
    assert_eq!(err.code.as_str(), "invalid_variable");
}

#[test]
fn lines_count_inside_multiline_tags() {
    let err = parse_error("{{!\ncomment\n}}\n{{/x}}");
    assert_eq!(err.line, 4);
}

#[test]
fn errors_after_delimiter_change() {
    let err = parse_error("{{=<% %>=}}\n<%#a%>\n{{/a}}");
    assert_eq!(err.code, ErrorCode::SectionNoClosingTag);
    assert_eq!(err.line, 2);
}
