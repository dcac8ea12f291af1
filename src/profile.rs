//! Static description of the host: OS, kernel, architecture and the
//! versions of a few key system components.
//!
//! Every probe runs with a short timeout; a probe that fails or times out
//! reports `"Unknown"` rather than an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::collector::command_output;
use crate::model::UNKNOWN;
use crate::platform::Platform;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemProfile {
    pub os_name: String,
    pub os_version: String,
    pub architecture: String,
    pub kernel_version: String,
    pub hostname: String,
    pub components: BTreeMap<String, String>,
}

/// A component version probe: display name, program, arguments.
type Probe = (&'static str, &'static str, &'static [&'static str]);

const LINUX_PROBES: &[Probe] = &[
    ("systemd", "systemctl", &["--version"]),
    ("OpenSSL", "openssl", &["version"]),
    ("glibc", "ldd", &["--version"]),
    ("Python", "python3", &["--version"]),
];

const MACOS_PROBES: &[Probe] = &[
    ("Xcode Command Line Tools", "xcode-select", &["--version"]),
    ("OpenSSL", "openssl", &["version"]),
    ("Python", "python3", &["--version"]),
];

const WINDOWS_PROBES: &[Probe] = &[
    (
        "PowerShell",
        "powershell",
        &["-NoProfile", "-Command", "$PSVersionTable.PSVersion.ToString()"],
    ),
    (
        "Windows Defender",
        "powershell",
        &["-NoProfile", "-Command", "(Get-MpComputerStatus).AMProductVersion"],
    ),
    (
        "Windows Update Agent",
        "powershell",
        &[
            "-NoProfile",
            "-Command",
            "(New-Object -ComObject Microsoft.Update.AutoUpdate).Version",
        ],
    ),
];

/// Collects the profile of the current host.
pub async fn collect() -> SystemProfile {
    let platform = Platform::current();

    let (os_name, os_version) = os_identity(platform).await;
    let kernel_version = kernel_version(platform).await;

    let probes = match platform {
        Platform::Linux => LINUX_PROBES,
        Platform::MacOS => MACOS_PROBES,
        Platform::Windows => WINDOWS_PROBES,
    };

    let mut components = BTreeMap::new();
    for (name, program, args) in probes {
        components.insert(name.to_string(), probe(program, args).await);
    }

    SystemProfile {
        os_name,
        os_version,
        architecture: std::env::consts::ARCH.to_string(),
        kernel_version,
        hostname: hostname().await,
        components,
    }
}

/// Runs a probe and returns the first non-empty output line.
async fn probe(program: &str, args: &[&str]) -> String {
    match command_output(program, args, PROBE_TIMEOUT).await {
        Ok(Some(stdout)) => first_line(&stdout).unwrap_or_else(|| UNKNOWN.to_string()),
        _ => UNKNOWN.to_string(),
    }
}

fn first_line(s: &str) -> Option<String> {
    s.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

async fn os_identity(platform: Platform) -> (String, String) {
    match platform {
        Platform::Linux => {
            let release = tokio::fs::read_to_string("/etc/os-release")
                .await
                .unwrap_or_default();
            let fields = parse_os_release(&release);
            let name = fields
                .get("NAME")
                .cloned()
                .unwrap_or_else(|| platform.display_name().to_string());
            let version = fields
                .get("VERSION")
                .or_else(|| fields.get("VERSION_ID"))
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_string());
            (name, version)
        }
        Platform::MacOS => (
            probe("sw_vers", &["-productName"]).await,
            probe("sw_vers", &["-productVersion"]).await,
        ),
        Platform::Windows => (
            platform.display_name().to_string(),
            probe(
                "powershell",
                &["-NoProfile", "-Command", "[Environment]::OSVersion.Version.ToString()"],
            )
            .await,
        ),
    }
}

async fn kernel_version(platform: Platform) -> String {
    match platform {
        Platform::Windows => probe("cmd", &["/C", "ver"]).await,
        _ => probe("uname", &["-r"]).await,
    }
}

async fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME").or_else(|_| std::env::var("COMPUTERNAME")) {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    probe("hostname", &[]).await
}

/// Parses `KEY=value` / `KEY="value"` lines from `/etc/os-release`.
fn parse_os_release(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}
