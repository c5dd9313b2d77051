use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use crate::error::BoxError;


/// Source of partial templates, looked up by name on every expansion.
pub trait PartialProvider: Send + Sync {
    fn get(&self, name: &str) -> Result<String, BoxError>;
}


/// In-memory partials. Unknown names expand to nothing.
#[derive(Clone, Debug, Default)]
pub struct PartialMap {
    partials: HashMap<String, String>
}

impl PartialMap {
    pub fn new() -> Self {
        PartialMap::default()
    }

    pub fn insert(&mut self, name: &str, source: &str) {
        self.partials.insert(name.to_owned(), source.to_owned());
    }

    pub fn with(mut self, name: &str, source: &str) -> Self {
        self.insert(name, source);
        self
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for PartialMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        PartialMap {
            partials: iter.into_iter()
                .map(|(name, source)| (name.to_owned(), source.to_owned()))
                .collect()
        }
    }
}

impl PartialProvider for PartialMap {
    fn get(&self, name: &str) -> Result<String, BoxError> {
        Ok(self.partials.get(name).cloned().unwrap_or_default())
    }
}

impl PartialProvider for HashMap<String, String> {
    fn get(&self, name: &str) -> Result<String, BoxError> {
        Ok(HashMap::get(self, name).cloned().unwrap_or_default())
    }
}


/// Partials read from disk. Each directory is searched, in order, for
/// `name`, `name.mustache` and `name.stache`; nothing found expands to
/// nothing.
#[derive(Clone, Debug, Default)]
pub struct FileProvider {
    paths: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl FileProvider {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        FileProvider {
            paths: paths.into_iter().map(Into::into).collect(),
            extensions: vec!["".to_owned(), ".mustache".to_owned(), ".stache".to_owned()],
        }
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|ext| ext.to_string()).collect();
        self
    }
}

impl PartialProvider for FileProvider {
    fn get(&self, name: &str) -> Result<String, BoxError> {
        for dir in &self.paths {
            for ext in &self.extensions {
                let path = dir.join(format!("{}{}", name, ext));
                match std::fs::read_to_string(&path) {
                    Ok(source) => {
                        tracing::debug!(path = %path.display(), "partial loaded");
                        return Ok(source);
                    },
                    Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                    Err(err) if path.is_dir() => {
                        tracing::trace!(path = %path.display(), %err, "skipping directory");
                        continue;
                    },
                    Err(err) => return Err(Box::new(err)),
                }
            }
        }
        Ok(String::new())
    }
}
