// ABOUTME: Template discovery and rendering for view endpoints and error views.
// ABOUTME: Walks a directory for templates at startup; any unreadable or malformed file is fatal.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::Environment;
use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that can occur while loading or rendering templates.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("failed to walk view directory {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    #[error("no templates ending in {ext:?} found under {path}")]
    Empty { path: PathBuf, ext: String },

    #[error("failed to render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// A compiled, immutable set of named templates. Cheap to clone.
#[derive(Clone)]
pub struct Views {
    env: Arc<Environment<'static>>,
    names: Arc<[String]>,
}

impl Views {
    /// Recursively load every file under `base` whose name ends with `ext`.
    ///
    /// Templates are named by their `/`-separated path relative to `base`,
    /// so `views/errors/404.html` is `errors/404.html`.
    pub fn load(base: impl AsRef<Path>, ext: &str) -> Result<Self, ViewError> {
        let base = base.as_ref();
        let mut env = Environment::new();
        let mut names = Vec::new();

        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry.map_err(|source| ViewError::Walk {
                path: base.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if !entry.file_name().to_string_lossy().ends_with(ext) {
                continue;
            }

            let path = entry.path();
            let source = std::fs::read_to_string(path).map_err(|source| ViewError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let name = template_name(base, path);
            env.add_template_owned(name.clone(), source)
                .map_err(|source| ViewError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;

            tracing::debug!(template = %name, "loaded view");
            names.push(name);
        }

        if names.is_empty() {
            return Err(ViewError::Empty {
                path: base.to_path_buf(),
                ext: ext.to_string(),
            });
        }

        tracing::info!(count = names.len(), dir = %base.display(), "views registered");

        Ok(Self {
            env: Arc::new(env),
            names: names.into(),
        })
    }

    /// Names of all loaded templates, in discovery order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn render(&self, name: &str, data: &Value) -> Result<String, ViewError> {
        let render_err = |source: minijinja::Error| ViewError::Render {
            name: name.to_string(),
            source,
        };
        let template = self.env.get_template(name).map_err(render_err)?;
        template.render(data).map_err(render_err)
    }
}

impl fmt::Debug for Views {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Views").field("names", &self.names).finish()
    }
}

fn template_name(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
