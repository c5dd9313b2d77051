use std::fmt::Debug;
use std::io;

use crate::context::Stack;
use crate::error::{ErrorCode, ParseError, RenderError};
use crate::eval;
use crate::options::{Delimiters, MissingVariables, Options};
use crate::reader::Reader;
use crate::value::{Callable, Value};


/// A compiled template.
///
/// Compiling builds a tree of segments once; the tree is immutable and can
/// be rendered any number of times, from any number of threads.
#[derive(Debug)]
pub struct Template {
    segments: Segments,
    delimiters: Delimiters,
    options: Options,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, ParseError> {
        Template::compile_with(source, Options::default())
    }

    pub fn compile_with(source: &str, options: Options) -> Result<Self, ParseError> {
        tracing::debug!(len = source.len(), "compiling template");
        let (open, close) = (options.delimiters.open.clone(), options.delimiters.close.clone());
        let mut reader = Reader::new(source, &open, &close);
        let segments = parse(&mut reader, None, options.force_raw)?;
        let (open, close) = reader.delimiters();
        let delimiters = Delimiters::new(open, close);
        tracing::debug!(segments = segments.len(), lines = reader.line(), "template compiled");
        Ok(Template { segments, delimiters, options })
    }

    /// Delimiters in effect at the end of the template.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The variable, section and partial tags of the template.
    pub fn tags(&self) -> Vec<Tag> {
        self.segments.tags()
    }

    /// Render against contexts given innermost first.
    pub fn render(&self, contexts: &[Value]) -> Result<String, RenderError> {
        let mut out = Vec::new();
        self.render_to(&mut out, contexts)?;
        into_string(out)
    }

    /// Render straight into `out`. Output is written as segments render, so
    /// a failing render may leave partial output behind.
    pub fn render_to<W: io::Write>(&self, out: &mut W, contexts: &[Value]) -> Result<(), RenderError> {
        let mut stack = Stack::from(contexts);
        self.render_stack(&mut stack, 0, out)
    }

    /// Render this template, then `layout` with the result exposed as
    /// `content` in an extra innermost context.
    pub fn render_in_layout(&self, layout: &Template, contexts: &[Value]) -> Result<String, RenderError> {
        let mut out = Vec::new();
        self.render_in_layout_to(&mut out, layout, contexts)?;
        into_string(out)
    }

    /// Like [Template::render_in_layout], streaming the layout into `out`.
    /// The content itself is rendered in memory first.
    pub fn render_in_layout_to<W: io::Write>(
        &self, out: &mut W, layout: &Template, contexts: &[Value]
    ) -> Result<(), RenderError> {
        let mut layout_contexts = Vec::with_capacity(contexts.len() + 1);
        layout_contexts.push(vec![("content", self.render(contexts)?)].into_iter().collect::<Value>());
        layout_contexts.extend_from_slice(contexts);
        layout.render_to(out, &layout_contexts)
    }

    pub(crate) fn render_stack(
        &self, stack: &mut Stack, depth: usize, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        let renderer = Renderer { options: &self.options, depth };
        self.segments.render(&renderer, stack, out)
    }
}

fn into_string(bytes: Vec<u8>) -> Result<String, RenderError> {
    String::from_utf8(bytes)
        .map_err(|err| RenderError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}


/// Kind of a [Tag].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    Variable,
    Section,
    InvertedSection,
    Partial,
}

/// Description of a tag found in a compiled template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    pub name: String,
    /// Tags nested in a section; empty for other kinds.
    pub children: Vec<Tag>,
}


fn parse<'a>(
    reader: &mut Reader<'a>, section: Option<(&'a str, usize)>, force_raw: bool
) -> Result<Segments, ParseError> {
    let mut segments = Segments::new();
    loop {
        let run = reader.read_text();
        push_text(&mut segments, run.text);
        if run.at_end {
            return match section {
                Some((name, line)) =>
                    Err(ParseError::with_reason(line, ErrorCode::SectionNoClosingTag, name)),
                None => Ok(segments)
            };
        }
        let tag = reader.read_tag(run.may_standalone)?;
        if !tag.standalone {
            push_text(&mut segments, run.padding);
        }

        let mut chars = tag.body.chars();
        let sigil = chars.next().unwrap_or_default();
        let rest = chars.as_str().trim();
        match sigil {
            '!' => {},
            '#' | '^' => {
                let name = checked_name(rest, tag.line)?;
                let children = parse(reader, Some((name, tag.line)), force_raw)?;
                segments.push(Box::new(
                    SectionSegment::new(name, sigil == '^', tag.line, children)
                ));
            },
            '/' => {
                return match section {
                    None => Err(ParseError::new(tag.line, ErrorCode::UnmatchedCloseTag)),
                    Some((open, _)) if open != rest =>
                        Err(ParseError::with_reason(tag.line, ErrorCode::InterleavedClosingTag, rest)),
                    Some(_) => Ok(segments)
                };
            },
            '>' => {
                if rest.is_empty() {
                    return Err(ParseError::new(tag.line, ErrorCode::EmptyTag));
                }
                let indent = if tag.standalone { run.padding } else { "" };
                segments.push(Box::new(
                    PartialSegment::new(rest, indent, tag.standalone)
                ));
            },
            '=' => {
                let (od, cd) = meta_delimiters(rest)
                    .ok_or_else(|| ParseError::new(tag.line, ErrorCode::InvalidMetaTag))?;
                tracing::debug!(open = od, close = cd, line = tag.line, "delimiters changed");
                reader.set_delimiters(od, cd);
            },
            '{' => {
                let name = rest.strip_suffix('}').unwrap_or(rest).trim();
                segments.push(Box::new(
                    ValueSegment::new(checked_name(name, tag.line)?, true)
                ));
            },
            '&' => {
                segments.push(Box::new(
                    ValueSegment::new(checked_name(rest, tag.line)?, true)
                ));
            },
            _ => {
                segments.push(Box::new(
                    ValueSegment::new(checked_name(tag.body, tag.line)?, force_raw)
                ));
            }
        }
    }
}

fn push_text(segments: &mut Segments, text: &str) {
    if !text.is_empty() {
        segments.push(Box::new(TextSegment::new(text)));
    }
}

fn checked_name(name: &str, line: usize) -> Result<&str, ParseError> {
    if name.is_empty() {
        Err(ParseError::new(line, ErrorCode::EmptyTag))
    } else if !eval::is_valid_expression(name) {
        Err(ParseError::with_reason(line, ErrorCode::InvalidVariable, name))
    } else {
        Ok(name)
    }
}

// `{{=<% %>=}}` body without its leading `=`
fn meta_delimiters(text: &str) -> Option<(&str, &str)> {
    let mut words = text.strip_suffix('=')?.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(od), Some(cd), None) => Some((od, cd)),
        _ => None
    }
}


/// Rendering settings and recursion depth shared by the segments of one
/// template render.
pub(crate) struct Renderer<'r> {
    options: &'r Options,
    depth: usize,
}

impl<'r> Renderer<'r> {
    // depth for a nested partial or lambda render
    fn nested_depth(&self, name: &str) -> Result<usize, RenderError> {
        if self.depth >= self.options.max_depth {
            Err(RenderError::RecursionLimit {
                name: name.to_owned(),
                limit: self.options.max_depth,
            })
        } else {
            Ok(self.depth + 1)
        }
    }

    // callback compiling and rendering text against a snapshot of the stack
    fn lambda_callback(&self, stack: &Stack, name: &str) -> Result<Callable, RenderError> {
        let depth = self.nested_depth(name)?;
        let options = self.options.nested();
        let stack = stack.clone();
        Ok(Callable::new(1, move |args| {
            let template = Template::compile_with(&args[0].to_string(), options.clone())?;
            let mut stack = stack.clone();
            let mut out = Vec::new();
            template.render_stack(&mut stack, depth, &mut out)?;
            Ok(Value::String(into_string(out)?))
        }))
    }
}


trait Segment: Debug + Send + Sync {
    fn render(
        &self, renderer: &Renderer, stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError>;

    /// Write the segment back as template source.
    fn write_source(&self, out: &mut String);

    fn tag(&self) -> Option<Tag> {
        None
    }
}

type Segments = Vec<Box<dyn Segment>>;

impl Segment for Segments {
    fn render(
        &self, renderer: &Renderer, stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        self.iter().try_for_each(|child| child.render(renderer, stack, out))
    }

    fn write_source(&self, out: &mut String) {
        for child in self {
            child.write_source(out);
        }
    }
}

trait Tags {
    fn tags(&self) -> Vec<Tag>;
}

impl Tags for Segments {
    fn tags(&self) -> Vec<Tag> {
        self.iter().filter_map(|child| child.tag()).collect()
    }
}


#[derive(Debug)]
struct TextSegment {
    text: String
}

impl TextSegment {
    fn new(text: &str) -> Self {
        TextSegment {
            text: text.to_owned()
        }
    }
}

impl Segment for TextSegment {
    fn render(
        &self, _renderer: &Renderer, _stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        out.write_all(self.text.as_bytes())?;
        Ok(())
    }

    fn write_source(&self, out: &mut String) {
        out.push_str(&self.text);
    }
}


#[derive(Debug)]
struct ValueSegment {
    name: String,
    is_raw: bool
}

impl ValueSegment {
    fn new(name: &str, is_raw: bool) -> Self {
        ValueSegment {
            name: name.to_owned(),
            is_raw
        }
    }
}

impl Segment for ValueSegment {
    fn render(
        &self, renderer: &Renderer, stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        let allow_missing = renderer.options.missing_variables == MissingVariables::Allow;
        let Some(value) = eval::lookup_allow_missing(stack, &self.name, allow_missing)? else {
            tracing::debug!(name = %self.name, "missing variable rendered empty");
            return Ok(());
        };
        let value = match value {
            Value::Callable(callable) if callable.arity() == 0 =>
                callable.call(&[]).map_err(RenderError::from_boxed)?,
            value => value
        };
        let text = if let Some(formatter) = &renderer.options.formatter {
            formatter(&value).map_err(RenderError::Format)?
        } else if self.is_raw {
            value.to_string()
        } else {
            (renderer.options.escape)(&value.to_string())
        };
        out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn write_source(&self, out: &mut String) {
        if self.is_raw {
            out.push_str(&format!("{{{{{{{}}}}}}}", self.name));
        } else {
            out.push_str(&format!("{{{{{}}}}}", self.name));
        }
    }

    fn tag(&self) -> Option<Tag> {
        Some(Tag {
            kind: TagKind::Variable,
            name: self.name.clone(),
            children: vec![],
        })
    }
}


#[derive(Debug)]
struct SectionSegment {
    name: String,
    inverted: bool,
    line: usize,
    children: Segments
}

impl SectionSegment {
    fn new(name: &str, inverted: bool, line: usize, children: Segments) -> Self {
        SectionSegment {
            name: name.to_owned(),
            inverted,
            line,
            children
        }
    }

    fn render_with(
        &self, frame: Value, renderer: &Renderer, stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        stack.push(frame);
        let result = self.children.render(renderer, stack, out);
        stack.pop();
        result
    }

    fn render_lambda(
        &self, lambda: &Callable, renderer: &Renderer, stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        if lambda.arity() != 2 {
            return Err(RenderError::LambdaSignature(self.name.clone()));
        }
        let mut text = String::new();
        self.children.write_source(&mut text);
        let callback = renderer.lambda_callback(stack, &self.name)?;
        tracing::debug!(name = %self.name, line = self.line, "invoking lambda");
        let result = lambda.call(&[Value::String(text), Value::Callable(callback)])
            .map_err(|source| RenderError::Lambda { name: self.name.clone(), source })?;
        write!(out, "{}", result)?;
        Ok(())
    }
}

impl Segment for SectionSegment {
    fn render(
        &self, renderer: &Renderer, stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        let value = eval::lookup_allow_missing(stack, &self.name, true)?
            .unwrap_or_default();
        let is_empty = value.is_empty();
        if self.inverted {
            return if is_empty {
                self.children.render(renderer, stack, out)
            } else {
                Ok(())
            };
        }
        if is_empty {
            return Ok(());
        }
        match value {
            Value::Sequence(items) => {
                for item in items.iter() {
                    self.render_with(item.clone(), renderer, stack, out)?;
                }
                Ok(())
            },
            Value::Callable(lambda) => self.render_lambda(&lambda, renderer, stack, out),
            value => self.render_with(value, renderer, stack, out)
        }
    }

    fn write_source(&self, out: &mut String) {
        let sigil = if self.inverted { '^' } else { '#' };
        out.push_str(&format!("{{{{{}{}}}}}", sigil, self.name));
        self.children.write_source(out);
        out.push_str(&format!("{{{{/{}}}}}", self.name));
    }

    fn tag(&self) -> Option<Tag> {
        Some(Tag {
            kind: if self.inverted { TagKind::InvertedSection } else { TagKind::Section },
            name: self.name.clone(),
            children: self.children.tags(),
        })
    }
}


#[derive(Debug)]
struct PartialSegment {
    name: String,
    indent: String,
    standalone: bool
}

impl PartialSegment {
    fn new(name: &str, indent: &str, standalone: bool) -> Self {
        PartialSegment {
            name: name.to_owned(),
            indent: indent.to_owned(),
            standalone
        }
    }
}

impl Segment for PartialSegment {
    fn render(
        &self, renderer: &Renderer, stack: &mut Stack, out: &mut dyn io::Write
    ) -> Result<(), RenderError> {
        let Some(provider) = &renderer.options.partials else {
            return Ok(());
        };
        let depth = renderer.nested_depth(&self.name)?;
        let source = provider.get(&self.name)
            .map_err(|source| RenderError::Partial { name: self.name.clone(), source })?;
        tracing::debug!(name = %self.name, depth, "expanding partial");
        let template = Template::compile_with(
            &indent_lines(&source, &self.indent),
            renderer.options.nested()
        )?;
        template.render_stack(stack, depth, out)
    }

    fn write_source(&self, out: &mut String) {
        out.push_str(&self.indent);
        out.push_str(&format!("{{{{>{}}}}}", self.name));
        if self.standalone {
            out.push('\n');
        }
    }

    fn tag(&self) -> Option<Tag> {
        Some(Tag {
            kind: TagKind::Partial,
            name: self.name.clone(),
            children: vec![],
        })
    }
}

// prefix every non-empty line with `indent`
fn indent_lines(source: &str, indent: &str) -> String {
    if indent.is_empty() {
        return source.to_owned();
    }
    let mut result = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        if line != "\n" {
            result.push_str(indent);
        }
        result.push_str(line);
    }
    result
}
