//! Machine attributes
//!
//! Non-identifying system information attached to every report sent by a
//! client. Never includes hostname or username.

use faultline_core::domain::{AttributeValue, Attributes};

/// Non-identifying operating system information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    pub os: String,
    pub kernel: String,
    pub desktop: String,
    pub arch: String,
}

impl OsInfo {
    /// Collect OS information from the current system.
    pub fn collect() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            kernel: read_kernel_version(),
            desktop: std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Attribute form; empty values are left out.
    pub fn to_attributes(&self) -> Attributes {
        [
            ("system.os", &self.os),
            ("system.kernel", &self.kernel),
            ("system.desktop", &self.desktop),
            ("system.arch", &self.arch),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.to_string(), AttributeValue::from(value.as_str())))
        .collect()
    }
}

fn read_kernel_version() -> String {
    std::fs::read_to_string("/proc/version")
        .ok()
        .and_then(|v| v.split_whitespace().nth(2).map(String::from))
        .unwrap_or_default()
}
