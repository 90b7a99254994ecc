//! Swagger file rewriting
//!
//! ```no_run
//! use nwa_common::swagger::SwaggerFile;
//!
//! let written = SwaggerFile::new("api/swagger.yaml")
//!     .set_host("api.example.org")
//!     .write(None)
//!     .unwrap();
//! println!("swagger written to {}", written.display());
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use regex::{NoExpand, Regex};

/// A swagger definition on disk together with pending substitutions
#[derive(Debug, Clone)]
pub struct SwaggerFile {
    path: PathBuf,
    substitutions: Vec<(String, String)>,
}

impl SwaggerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            substitutions: Vec::new(),
        }
    }

    /// Replace the value of the top level `host` key
    pub fn set_host(mut self, host: impl Into<String>) -> Self {
        self.substitute("host", host.into());
        self
    }

    fn substitute(&mut self, key: &str, value: String) {
        self.substitutions.retain(|(k, _)| k != key);
        self.substitutions.push((key.to_string(), value));
    }

    /// Apply the substitutions to the source text
    pub fn render(&self) -> std::io::Result<String> {
        let mut output = fs::read_to_string(&self.path)?;
        for (key, value) in &self.substitutions {
            let pattern = Regex::new(&format!(r#"{}: "[^"]*""#, regex::escape(key)))
                .map_err(std::io::Error::other)?;
            let replacement = format!(r#"{}: "{}""#, key, value);
            output = pattern
                .replace_all(&output, NoExpand(&replacement))
                .into_owned();
        }
        Ok(output)
    }

    /// Write the rewritten file to `target`, or to a persisted temporary file
    /// named `swagger-*.yaml` when no target is given. Returns the written path.
    pub fn write(&self, target: Option<&Path>) -> std::io::Result<PathBuf> {
        let output = self.render()?;

        match target {
            Some(path) => {
                fs::write(path, output)?;
                Ok(path.to_path_buf())
            }
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix("swagger-")
                    .suffix(".yaml")
                    .tempfile()?;
                file.write_all(output.as_bytes())?;
                let (_, path) = file.keep()?;
                tracing::debug!(path = %path.display(), "Swagger file written");
                Ok(path)
            }
        }
    }
}
