//! A Mustache template engine with extended path expressions.
//!
//! A [Template] compiled from source is rendered against a stack of
//! [Value] contexts, getting partials from a [PartialProvider] configured
//! in [Options].
//!
//! Besides the core Mustache tags, every tag name is a path expression:
//! dotted names, indexes, function calls and literals, see [resolve].
//! Section values that are two-argument [Callable]s act as lambdas: they
//! receive the literal section body and a callback rendering text against
//! the current context.
//!
//!
//! # Samples
//!
//! ## Hello world
//!
//! ```
//! use stache::{Template, JsonValue, Value};
//!
//! let text = "hello, {{you}}!";
//! let data = r#"{
//!     "you": "world"
//! }"#;
//!
//! let template = Template::compile(text).unwrap();
//! let context = serde_json::from_str::<JsonValue>(data).unwrap();
//!
//! let result = template.render(&[Value::from(context)]).unwrap();
//!
//! assert_eq!(result, "hello, world!")
//! ```
//!
//! ## Hello team
//!
//! ```
//! use stache::{Template, YamlValue, Value};
//! let text = r#"
//!   {{#team}}
//!   hello, {{address}} {{name}}!
//!   {{/team}}
//! "#;
//! let data = r#"
//!   team:
//!     - name: john
//!       address: little
//!     - name: 42
//!       address: citizen
//! "#;
//!
//! let template = Template::compile(text).unwrap();
//! let context = serde_yaml::from_str::<YamlValue>(data).unwrap();
//!
//! let result = template.render(&[Value::from(context)]).unwrap();
//! assert_eq!(result, r#"
//!   hello, little john!
//!   hello, citizen 42!
//! "#);
//! ```
//!
//! ## Paths and lambdas
//!
//! ```
//! use stache::{Template, Value};
//!
//! let template = Template::compile(
//!     "{{users[0].name}} has {{users.len}} friends. {{#bold}}{{greeting}}{{/bold}}"
//! ).unwrap();
//! let user: Value = vec![("name", "Ann")].into_iter().collect();
//! let data: Value = vec![
//!     ("users", Value::from(vec![user.clone(), user])),
//!     ("greeting", Value::from("hi")),
//!     ("bold", Value::lambda(|text, render| Ok(format!("<b>{}</b>", render.render(text)?)))),
//! ].into_iter().collect();
//!
//! assert_eq!(template.render(&[data]).unwrap(), "Ann has 2 friends. <b>hi</b>");
//! ```
mod context;
mod error;
mod eval;
mod json;
mod options;
mod partials;
mod reader;
mod template;
mod value;
mod yaml;

pub use self::template::{Template, Tag, TagKind};
pub use self::value::{Value, Record, Field, Callable, Complex, Lookup};
pub use self::options::{Options, Delimiters, MissingVariables, EscapeFn, FormatterFn, html_escape};
pub use self::partials::{PartialProvider, PartialMap, FileProvider};
pub use self::error::{ParseError, ErrorCode, RenderError, BoxError};
pub use self::eval::resolve;
pub use self::json::JsonValue;
pub use self::yaml::YamlValue;
