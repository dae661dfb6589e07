use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("Biome ships no binary for {os}/{arch}")]
pub struct UnsupportedPlatform {
    os: String,
    arch: String,
}

/// Platform-specific companion package and executable name.
///
/// `@biomejs/biome` depends on one `@biomejs/cli-<os>-<arch>` package per
/// platform; that package carries the native binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformTarget {
    os: &'static str,
    arch: &'static str,
    musl: bool,
}

impl PlatformTarget {
    /// Target of the running process.
    pub fn current() -> Result<Self, UnsupportedPlatform> {
        Self::from_parts(
            std::env::consts::OS,
            std::env::consts::ARCH,
            cfg!(target_env = "musl"),
        )
    }

    /// Map Rust's OS/arch names onto the names npm packages use.
    pub fn from_parts(os: &str, arch: &str, musl: bool) -> Result<Self, UnsupportedPlatform> {
        let npm_os = match os {
            "macos" => "darwin",
            "linux" => "linux",
            "windows" => "win32",
            _ => {
                return Err(UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                });
            }
        };
        let npm_arch = match arch {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            _ => {
                return Err(UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                });
            }
        };
        Ok(Self {
            os: npm_os,
            arch: npm_arch,
            musl: musl && npm_os == "linux",
        })
    }

    /// npm name of the companion package, e.g. `@biomejs/cli-linux-x64-musl`.
    #[must_use]
    pub fn package_name(&self) -> String {
        let suffix = if self.musl { "-musl" } else { "" };
        format!("@biomejs/cli-{}-{}{suffix}", self.os, self.arch)
    }

    /// File name of the executable inside the companion package.
    #[must_use]
    pub fn binary_name(&self) -> &'static str {
        if self.os == "win32" {
            "biome.exe"
        } else {
            "biome"
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)?;
        if self.musl {
            f.write_str("-musl")?;
        }
        Ok(())
    }
}
