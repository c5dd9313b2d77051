use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::BoxError;
use crate::partials::PartialProvider;
use crate::value::Value;


pub type EscapeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type FormatterFn = Arc<dyn Fn(&Value) -> Result<String, BoxError> + Send + Sync>;

const DEFAULT_MAX_DEPTH: usize = 64;


/// What to do when a variable tag names nothing in the context stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingVariables {
    /// Render the tag as an empty string.
    #[default]
    Allow,
    /// Fail the render with [RenderError::MissingVariable](crate::RenderError::MissingVariable).
    Error,
}


/// Open and close tag markers.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Delimiters {
    pub fn new(open: &str, close: &str) -> Self {
        Delimiters { open: open.to_owned(), close: close.to_owned() }
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters::new("{{", "}}")
    }
}


/// Settings for compiling and rendering a template.
///
/// ```
/// use stache::{Options, MissingVariables, Template, Value};
///
/// let options = Options::new()
///     .missing_variables(MissingVariables::Error)
///     .escape(|text| text.to_uppercase());
/// let template = Template::compile_with("{{greeting}}", options).unwrap();
/// let data: Value = vec![("greeting", "hi")].into_iter().collect();
/// assert_eq!(template.render(&[data]).unwrap(), "HI");
/// ```
#[derive(Clone)]
pub struct Options {
    pub(crate) delimiters: Delimiters,
    pub(crate) force_raw: bool,
    pub(crate) missing_variables: MissingVariables,
    pub(crate) escape: EscapeFn,
    pub(crate) formatter: Option<FormatterFn>,
    pub(crate) partials: Option<Arc<dyn PartialProvider>>,
    pub(crate) max_depth: usize,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Render plain `{{name}}` tags without escaping.
    pub fn force_raw(mut self, force_raw: bool) -> Self {
        self.force_raw = force_raw;
        self
    }

    pub fn missing_variables(mut self, policy: MissingVariables) -> Self {
        self.missing_variables = policy;
        self
    }

    pub fn escape<F>(mut self, escape: F) -> Self
    where F: Fn(&str) -> String + Send + Sync + 'static {
        self.escape = Arc::new(escape);
        self
    }

    /// Format every interpolated value, bypassing both raw output and escaping.
    pub fn formatter<F>(mut self, formatter: F) -> Self
    where F: Fn(&Value) -> Result<String, BoxError> + Send + Sync + 'static {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn partials<P: PartialProvider + 'static>(mut self, provider: P) -> Self {
        self.partials = Some(Arc::new(provider));
        self
    }

    pub fn shared_partials(mut self, provider: Arc<dyn PartialProvider>) -> Self {
        self.partials = Some(provider);
        self
    }

    /// Maximum nesting of partial expansions and lambda renders.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Options for partials and lambda bodies: default syntax, same
    /// rendering behaviour.
    pub(crate) fn nested(&self) -> Self {
        Options {
            delimiters: Delimiters::default(),
            force_raw: false,
            ..self.clone()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            delimiters: Delimiters::default(),
            force_raw: false,
            missing_variables: MissingVariables::default(),
            escape: Arc::new(html_escape),
            formatter: None,
            partials: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("delimiters", &self.delimiters)
            .field("force_raw", &self.force_raw)
            .field("missing_variables", &self.missing_variables)
            .field("formatter", &self.formatter.is_some())
            .field("partials", &self.partials.is_some())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}


/// Default escaping for non-raw variables.
pub fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        assert_eq!(html_escape("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;");
    }

    #[test]
    fn settings_from_yaml() {
        #[derive(Deserialize)]
        struct Settings {
            delimiters: Delimiters,
            missing: MissingVariables,
        }
        let settings = serde_yaml::from_str::<Settings>(
            "delimiters: { open: '<%', close: '%>' }\nmissing: error\n"
        ).unwrap();
        assert_eq!(settings.delimiters, Delimiters::new("<%", "%>"));
        assert_eq!(settings.missing, MissingVariables::Error);
    }

    #[test]
    fn shared_partials_serve_many_templates() {
        use crate::{PartialMap, Template};

        let provider: Arc<dyn PartialProvider> = Arc::new(PartialMap::new().with("p", "[{{.}}]"));
        let first = Template::compile_with("{{>p}}", Options::new().shared_partials(provider.clone())).unwrap();
        let second = Template::compile_with("<{{>p}}>", Options::new().shared_partials(provider)).unwrap();
        assert_eq!(first.render(&[Value::from(1)]).unwrap(), "[1]");
        assert_eq!(second.render(&[Value::from(2)]).unwrap(), "<[2]>");
        assert!(first.options().partials.is_some());
    }

    #[test]
    fn nested_keeps_rendering_settings() {
        let options = Options::new()
            .delimiters(Delimiters::new("<%", "%>"))
            .force_raw(true)
            .missing_variables(MissingVariables::Error)
            .max_depth(3)
            .nested();
        assert_eq!(options.delimiters, Delimiters::default());
        assert!(!options.force_raw);
        assert_eq!(options.missing_variables, MissingVariables::Error);
        assert_eq!(options.max_depth, 3);
    }
}
