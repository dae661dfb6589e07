//! Document selector: which files a session is responsible for.
//!
//! One filter per (supported language, project directory) pair. A document is
//! in scope when its language is supported and its path is below one of the
//! session's projects.

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;

use biome_monorepo_types::{ProjectDirectory, SUPPORTED_LANGUAGES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFilter {
    pub language: String,
    pub scheme: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct DocumentSelector {
    filters: Vec<DocumentFilter>,
    /// Parallel to `filters`.
    matchers: Vec<GlobMatcher>,
}

impl DocumentSelector {
    pub fn for_projects(projects: &[ProjectDirectory]) -> Result<Self, globset::Error> {
        let mut filters = Vec::with_capacity(SUPPORTED_LANGUAGES.len() * projects.len());
        let mut matchers = Vec::with_capacity(filters.capacity());

        for language in SUPPORTED_LANGUAGES {
            for project in projects {
                let dir = forward_slashes(project.path());
                let matcher = GlobBuilder::new(&format!("{}/**/*", globset::escape(&dir)))
                    .literal_separator(true)
                    .build()?
                    .compile_matcher();
                filters.push(DocumentFilter {
                    language: language.to_string(),
                    scheme: "file".to_string(),
                    pattern: format!("{dir}/**/*"),
                });
                matchers.push(matcher);
            }
        }

        Ok(Self { filters, matchers })
    }

    #[must_use]
    pub fn filters(&self) -> &[DocumentFilter] {
        &self.filters
    }

    /// Whether a `file:` document with this language and path is in scope.
    #[must_use]
    pub fn matches(&self, language: &str, path: &Path) -> bool {
        let candidate = forward_slashes(path);
        self.filters
            .iter()
            .zip(&self.matchers)
            .any(|(filter, matcher)| filter.language == language && matcher.is_match(&candidate))
    }
}

fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
