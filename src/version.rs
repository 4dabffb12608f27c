//! Version and build information
//!
//! Values are embedded by `build.rs` at compile time.

use std::fmt;

use serde::Serialize;

/// Build information embedded at compile time
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    /// Short commit hash, "unknown" outside a git checkout
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub git_dirty: bool,
    pub build_timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("PATROL_GIT_HASH"),
            git_branch: env!("PATROL_GIT_BRANCH"),
            git_dirty: env!("PATROL_GIT_DIRTY") == "true",
            build_timestamp: env!("PATROL_BUILD_TIMESTAMP"),
            target: env!("PATROL_TARGET"),
            profile: env!("PATROL_PROFILE"),
            rustc_version: env!("PATROL_RUSTC_VERSION"),
        }
    }

    /// Version with commit suffix (e.g., "0.1.0-abc1234")
    pub fn full_version(&self) -> String {
        let dirty = if self.git_dirty { "-dirty" } else { "" };
        format!("{}-{}{}", self.version, self.git_hash, dirty)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "  Commit:   {} ({})", self.git_hash, self.git_branch)?;
        writeln!(f, "  Built:    {} [{}]", self.build_timestamp, self.profile)?;
        writeln!(f, "  Target:   {}", self.target)?;
        writeln!(f, "  Compiler: {}", self.rustc_version)
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

/// Print version information to stdout, as text or JSON
pub fn print_version(json: bool) {
    let info = build_info();
    if json {
        match serde_json::to_string_pretty(&info) {
            Ok(s) => println!("{}", s),
            Err(_) => print!("{}", info),
        }
    } else {
        print!("{}", info);
    }
}
