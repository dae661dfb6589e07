use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Directory of a manifest that declares the Biome dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectDirectory(PathBuf);

impl ProjectDirectory {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Project directory of the given `package.json`.
    ///
    /// Returns `None` for a bare file name with no parent.
    #[must_use]
    pub fn from_manifest(manifest: &Path) -> Option<Self> {
        manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Self::new)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    #[must_use]
    pub fn manifest(&self) -> PathBuf {
        self.0.join("package.json")
    }

    /// Last path component, used as the advertised workspace-folder name.
    #[must_use]
    pub fn name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.to_string_lossy().into_owned())
    }

    /// Whether `path` lies inside this project directory.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.0) && path != self.0
    }
}

impl fmt::Display for ProjectDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolved location of an installed `@biomejs/biome/package.json`.
///
/// Several projects share one installation when the dependency is hoisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationPath(PathBuf);

impl InstallationPath {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Path of the installation's `package.json`.
    #[must_use]
    pub fn manifest(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for InstallationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Location of a platform-specific Biome executable that existed at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryLocation(PathBuf);

impl BinaryLocation {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for BinaryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Version declared by an installation's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolVersion(String);

impl ToolVersion {
    /// Sentinel used when the manifest can't be read or has no version.
    pub const UNKNOWN: &'static str = "unknown";

    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ToolVersion {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One physical copy of the Biome package plus everything discovery learned about it.
///
/// An installation without a binary is reported and dropped; it never gets a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    path: InstallationPath,
    binary: Option<BinaryLocation>,
    version: ToolVersion,
    projects: Vec<ProjectDirectory>,
}

impl Installation {
    #[must_use]
    pub fn new(
        path: InstallationPath,
        binary: Option<BinaryLocation>,
        version: ToolVersion,
        projects: Vec<ProjectDirectory>,
    ) -> Self {
        Self {
            path,
            binary,
            version,
            projects,
        }
    }

    #[must_use]
    pub fn path(&self) -> &InstallationPath {
        &self.path
    }

    #[must_use]
    pub fn binary(&self) -> Option<&BinaryLocation> {
        self.binary.as_ref()
    }

    #[must_use]
    pub fn version(&self) -> &ToolVersion {
        &self.version
    }

    #[must_use]
    pub fn projects(&self) -> &[ProjectDirectory] {
        &self.projects
    }

    /// Split into the parts a session needs. `None` when no binary was found.
    #[must_use]
    pub fn into_session_parts(self) -> Option<(ToolVersion, BinaryLocation, Vec<ProjectDirectory>)> {
        let binary = self.binary?;
        Some((self.version, binary, self.projects))
    }
}
