//! Environment probe
//!
//! Works out which operating system family the app runs on and whether it
//! is running inside the managed preview runtime or as a standalone build.
//! Everything here is read from host constants and environment variables;
//! nothing can fail.

use std::fmt;
use std::fs;

/// Environment variable that overrides the detected platform
pub const PLATFORM_ENV: &str = "FIRSTWORDS_PLATFORM";

/// Environment variable naming the runtime the app was launched under
pub const RUNTIME_ENV: &str = "FIRSTWORDS_RUNTIME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    Web,
    Desktop,
}

impl Platform {
    /// Map a host OS identifier (as in `std::env::consts::OS`) to a platform
    pub fn from_os(os: &str) -> Self {
        match os.to_ascii_lowercase().as_str() {
            "ios" => Platform::Ios,
            "android" => Platform::Android,
            "web" | "wasm" | "emscripten" | "unknown" => Platform::Web,
            _ => Platform::Desktop,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
            Platform::Desktop => "desktop",
        };
        f.write_str(name)
    }
}

/// Runtime the app is executing under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    /// Preview host app: no custom native modules are linked in
    ManagedPreview,
    /// Compiled build with every native capability available
    Standalone,
}

impl RuntimeMode {
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "preview" || m == "managed" || m == "expo" => RuntimeMode::ManagedPreview,
            _ => RuntimeMode::Standalone,
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::ManagedPreview => f.write_str("managed-preview"),
            RuntimeMode::Standalone => f.write_str("standalone"),
        }
    }
}

/// Result of probing the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub platform: Platform,
    pub runtime: RuntimeMode,
    /// Linux under Windows Subsystem for Linux
    pub wsl: bool,
}

/// Source of the environment description
///
/// The facade owns one of these so tests can pin the environment.
pub trait EnvironmentProbe: Send {
    fn detect(&self) -> Environment;
}

/// Probe backed by the real host constants
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl EnvironmentProbe for HostProbe {
    fn detect(&self) -> Environment {
        detect()
    }
}

/// Probe that always reports the same environment
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub Environment);

impl EnvironmentProbe for FixedProbe {
    fn detect(&self) -> Environment {
        self.0
    }
}

/// Detect the current environment
pub fn detect() -> Environment {
    let platform = match std::env::var(PLATFORM_ENV) {
        Ok(value) if !value.trim().is_empty() => Platform::from_os(value.trim()),
        _ => Platform::from_os(std::env::consts::OS),
    };
    let runtime = RuntimeMode::from_marker(std::env::var(RUNTIME_ENV).ok().as_deref());
    let wsl = std::env::consts::OS == "linux" && is_wsl();

    Environment {
        platform,
        runtime,
        wsl,
    }
}

/// Detect if running in WSL (Windows Subsystem for Linux)
///
/// Checks for WSL-specific indicators in /proc/version and environment variables.
pub fn is_wsl() -> bool {
    if let Ok(contents) = fs::read_to_string("/proc/version") {
        let lower = contents.to_lowercase();
        if lower.contains("microsoft") || lower.contains("wsl") {
            return true;
        }
    }

    std::env::var("WSL_DISTRO_NAME").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_os() {
        assert_eq!(Platform::from_os("ios"), Platform::Ios);
        assert_eq!(Platform::from_os("Android"), Platform::Android);
        assert_eq!(Platform::from_os("web"), Platform::Web);
        assert_eq!(Platform::from_os("linux"), Platform::Desktop);
        assert_eq!(Platform::from_os("macos"), Platform::Desktop);
    }

    #[test]
    fn test_runtime_marker() {
        assert_eq!(RuntimeMode::from_marker(Some("expo")), RuntimeMode::ManagedPreview);
        assert_eq!(RuntimeMode::from_marker(Some(" Preview ")), RuntimeMode::ManagedPreview);
        assert_eq!(RuntimeMode::from_marker(Some("standalone")), RuntimeMode::Standalone);
        assert_eq!(RuntimeMode::from_marker(None), RuntimeMode::Standalone);
    }

    #[test]
    fn test_detect_is_stable() {
        // No side effects: two probes in a row agree
        assert_eq!(detect(), detect());
    }

    #[test]
    fn test_fixed_probe() {
        let env = Environment {
            platform: Platform::Android,
            runtime: RuntimeMode::ManagedPreview,
            wsl: false,
        };
        assert_eq!(FixedProbe(env).detect(), env);
    }
}
