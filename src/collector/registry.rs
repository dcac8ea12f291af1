use crate::collector::{command_output, COMMAND_TIMEOUT};
use crate::model::InventoryItem;
use crate::platform::Platform;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Uninstall keys for 64-bit, 32-bit and per-user installs.
const UNINSTALL_KEYS: [&str; 3] = [
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKLM\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
];

pub struct RegistrySource;

#[async_trait]
impl super::Source for RegistrySource {
    fn name(&self) -> &'static str {
        "Windows Uninstall Registry"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Windows]
    }

    async fn collect(&self) -> Result<Vec<InventoryItem>> {
        let mut items = Vec::new();

        for key in UNINSTALL_KEYS {
            // A missing WOW6432Node key on 32-bit systems is expected.
            if let Some(stdout) = command_output("reg", &["query", key, "/s"], COMMAND_TIMEOUT).await? {
                items.extend(parse_reg_query(&stdout));
            }
        }

        Ok(items)
    }
}

/// Parses `reg query <key> /s` output into one item per subkey that has a
/// `DisplayName`.
fn parse_reg_query(stdout: &str) -> Vec<InventoryItem> {
    let mut items = Vec::new();
    let mut values: HashMap<String, String> = HashMap::new();

    for line in stdout.lines() {
        if line.starts_with("HKEY_") {
            items.extend(item_from_values(&values));
            values.clear();
            continue;
        }

        if let Some((name, data)) = parse_value_line(line) {
            values.insert(name, data);
        }
    }
    items.extend(item_from_values(&values));

    items
}

/// Splits `    Name    REG_SZ    Data` into `(Name, Data)`.
fn parse_value_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_start();
    let type_start = line.find("    REG_")?;
    let name = line[..type_start].trim();
    let rest = line[type_start..].trim_start();
    let data = rest.split_once("    ").map(|(_, d)| d.trim()).unwrap_or("");

    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), data.to_string()))
}

fn item_from_values(values: &HashMap<String, String>) -> Option<InventoryItem> {
    let get = |key: &str| values.get(key).filter(|v| !v.is_empty()).cloned();

    let install_path = get("InstallLocation")
        .or_else(|| get("UninstallString").and_then(|s| parent_dir(&s)))
        .or_else(|| get("DisplayIcon").and_then(|s| parent_dir(&s)));

    InventoryItem::from_parts(
        get("DisplayName"),
        get("DisplayVersion"),
        install_path,
        get("InstallDate").map(|d| format_install_date(&d)),
    )
}

/// Returns the directory part of a command line or icon reference such as
/// `"C:\Program Files\Foo\uninst.exe" /S` or `C:\Foo\foo.exe,0`.
fn parent_dir(value: &str) -> Option<String> {
    let value = value.trim();
    let path = if let Some(stripped) = value.strip_prefix('"') {
        stripped.split('"').next()?
    } else {
        value.split(',').next()?
    };

    let (dir, _) = path.rsplit_once('\\')?;
    if dir.is_empty() {
        None
    } else {
        Some(dir.to_string())
    }
}

/// Converts registry `YYYYMMDD` dates to `YYYY-MM-DD`; other values pass through.
fn format_install_date(raw: &str) -> String {
    chrono::NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN;

    const SAMPLE: &str = r#"
HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\7-Zip
    DisplayName    REG_SZ    7-Zip 23.01 (x64)
    DisplayVersion    REG_SZ    23.01
    InstallLocation    REG_SZ    C:\Program Files\7-Zip\
    InstallDate    REG_SZ    20240102

HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Git_is1
    DisplayName    REG_SZ    Git
    DisplayVersion    REG_SZ    2.45.1
    UninstallString    REG_SZ    "C:\Program Files\Git\unins000.exe"

HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\KB123
    SystemComponent    REG_DWORD    0x1
"#;

    #[test]
    fn test_parse_reg_query() {
        let items = parse_reg_query(SAMPLE);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].name, "7-Zip 23.01 (x64)");
        assert_eq!(items[0].install_path, r"C:\Program Files\7-Zip\");
        assert_eq!(items[0].install_date, "2024-01-02");

        assert_eq!(items[1].name, "Git");
        assert_eq!(items[1].install_path, r"C:\Program Files\Git");
        assert_eq!(items[1].install_date, UNKNOWN);
    }

    #[test]
    fn test_parent_dir_variants() {
        assert_eq!(
            parent_dir(r#""C:\Apps\Foo\uninstall.exe" /S"#).as_deref(),
            Some(r"C:\Apps\Foo")
        );
        assert_eq!(parent_dir(r"C:\Apps\Bar\bar.exe,0").as_deref(), Some(r"C:\Apps\Bar"));
        assert_eq!(parent_dir("msiexec.exe"), None);
    }

    #[test]
    fn test_format_install_date() {
        assert_eq!(format_install_date("20231231"), "2023-12-31");
        assert_eq!(format_install_date("12/31/2023"), "12/31/2023");
    }
}
