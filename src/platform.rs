//! Host OS detection and the set of target architectures.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::BuildError;

/// Host operating systems the pipeline can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HostOs {
    Windows,
    Linux,
}

impl HostOs {
    /// Map a `std::env::consts::OS` style name onto a supported host.
    pub fn from_name(name: &str) -> Result<Self, BuildError> {
        match name {
            "windows" => Ok(HostOs::Windows),
            "linux" => Ok(HostOs::Linux),
            other => Err(BuildError::precondition(format!(
                "Platform '{other}' not supported"
            ))),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            HostOs::Windows => "Windows",
            HostOs::Linux => "Linux",
        }
    }

    /// Architectures that can be built on this host, in canonical order.
    pub const fn supported_archs(&self) -> &'static [TargetArch] {
        match self {
            HostOs::Windows => &[TargetArch::Windows32, TargetArch::Windows64],
            HostOs::Linux => &[TargetArch::X86_64, TargetArch::Armhf, TargetArch::Aarch64],
        }
    }

    /// Parse an architecture argument, accepting only values supported on this host.
    pub fn parse_arch(&self, value: &str) -> Result<TargetArch, BuildError> {
        let supported = self.supported_archs();
        match value.parse::<TargetArch>() {
            Ok(arch) if supported.contains(&arch) => Ok(arch),
            _ => Err(BuildError::precondition(format!(
                "Architecture '{}' not supported (supported values: {})",
                value,
                supported
                    .iter()
                    .map(TargetArch::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target CPU architecture, named the way the build scripts accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TargetArch {
    #[serde(rename = "windows32")]
    Windows32,
    #[serde(rename = "windows64")]
    Windows64,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "armhf")]
    Armhf,
    #[serde(rename = "aarch64")]
    Aarch64,
}

impl TargetArch {
    pub const ALL: [TargetArch; 5] = [
        TargetArch::Windows32,
        TargetArch::Windows64,
        TargetArch::X86_64,
        TargetArch::Armhf,
        TargetArch::Aarch64,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TargetArch::Windows32 => "windows32",
            TargetArch::Windows64 => "windows64",
            TargetArch::X86_64 => "x86_64",
            TargetArch::Armhf => "armhf",
            TargetArch::Aarch64 => "aarch64",
        }
    }

    pub const fn is_windows(&self) -> bool {
        matches!(self, TargetArch::Windows32 | TargetArch::Windows64)
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetArch {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetArch::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| BuildError::precondition(format!("Invalid arch '{s}'")))
    }
}
