use crate::model::{Application, ScanRecord, UNKNOWN};
use crate::profile::SystemProfile;
use crate::status::Status;
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ApplicationRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Installed")]
    install_date: String,
    #[tabled(rename = "Path")]
    install_path: String,
}

#[derive(Tabled)]
struct ScanRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Type")]
    scan_type: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Details")]
    details: String,
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn print_inventory_table(apps: &[Application]) -> Result<()> {
    if apps.is_empty() {
        println!("No applications in inventory. Run `appcursor scan` first.");
        return Ok(());
    }

    println!("{} applications:", apps.len());
    println!();

    let rows: Vec<ApplicationRow> = apps
        .iter()
        .map(|app| ApplicationRow {
            id: app.id,
            name: truncate(&app.name, 40),
            version: format_version(&app.version),
            install_date: format_version(&app.install_date),
            install_path: truncate(&app.install_path, 50),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    let unknown = apps.iter().filter(|a| a.version == UNKNOWN).count();
    if unknown > 0 {
        println!();
        println!("  {} with unknown version", unknown);
    }

    Ok(())
}

pub fn print_history_table(records: &[ScanRecord]) -> Result<()> {
    if records.is_empty() {
        println!("No scans recorded.");
        return Ok(());
    }

    let rows: Vec<ScanRow> = records
        .iter()
        .map(|r| ScanRow {
            id: r.id,
            scan_type: r.scan_type.clone(),
            timestamp: r.scan_timestamp.clone(),
            status: format_scan_status(r),
            details: truncate(&r.details, 50),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    let failed = records.iter().filter(|r| !r.is_success()).count();
    println!();
    println!("Summary:");
    println!("  Total scans: {} ({} failed)", records.len(), failed);

    Ok(())
}

pub fn print_profile_table(profile: &SystemProfile) -> Result<()> {
    let mut rows = vec![
        property("OS", &profile.os_name),
        property("Version", &profile.os_version),
        property("Architecture", &profile.architecture),
        property("Kernel", &profile.kernel_version),
        property("Hostname", &profile.hostname),
    ];
    rows.extend(
        profile
            .components
            .iter()
            .map(|(name, version)| property(name, version)),
    );

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
    Ok(())
}

pub fn print_status(status: &Status) {
    println!("State:        {}", status.state.as_str());
    println!(
        "Last scan:    {}",
        status.last_scan.as_deref().unwrap_or("never")
    );
    println!("Progress:     {}%", status.progress);
    println!("Version:      {}", status.version);
    println!("Database:     {}", status.db_freshness);
}

fn property(key: &str, value: &str) -> PropertyRow {
    PropertyRow {
        key: key.to_string(),
        value: truncate(value, 60),
    }
}

fn format_scan_status(record: &ScanRecord) -> String {
    if record.is_success() {
        "\x1b[32msuccess\x1b[0m".to_string()
    } else {
        format!("\x1b[31m{}\x1b[0m", record.status)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

fn format_version(version: &str) -> String {
    if version == UNKNOWN {
        "-".to_string()
    } else {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("ééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(UNKNOWN), "-");
        assert_eq!(format_version("1.2.3"), "1.2.3");
    }
}
