use crate::collector::{command_output, epoch_date, COMMAND_TIMEOUT};
use crate::model::InventoryItem;
use crate::platform::Platform;
use anyhow::Result;
use async_trait::async_trait;

pub struct RpmSource;

#[async_trait]
impl super::Source for RpmSource {
    fn name(&self) -> &'static str {
        "RPM Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Linux]
    }

    async fn collect(&self) -> Result<Vec<InventoryItem>> {
        let Some(stdout) = command_output(
            "rpm",
            &["-qa", "--queryformat", "%{NAME}\t%{VERSION}-%{RELEASE}\t%{INSTALLTIME}\n"],
            COMMAND_TIMEOUT,
        )
        .await?
        else {
            return Ok(Vec::new());
        };

        Ok(parse_rpm_output(&stdout))
    }
}

fn parse_rpm_output(stdout: &str) -> Vec<InventoryItem> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let name = parts.next().map(str::to_string);
            let version = parts.next().map(str::to_string);
            let install_date = parts
                .next()
                .and_then(|t| t.trim().parse::<i64>().ok())
                .and_then(epoch_date);

            InventoryItem::from_parts(name, version, None, install_date)
        })
        // gpg-pubkey entries are signing keys, not software
        .filter(|item| item.name != "gpg-pubkey")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNKNOWN;

    #[test]
    fn test_parse_rpm_output() {
        let stdout = "bash\t5.2.26-3.fc40\t1704067200\n\
                      gpg-pubkey\ta15b79cc-63d04c2c\t1704067200\n\
                      openssl\t3.2.1-2.fc40\t(none)\n";

        let items = parse_rpm_output(stdout);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "bash");
        assert_eq!(items[0].install_date, "2024-01-01");
        assert_eq!(items[1].version, "3.2.1-2.fc40");
        assert_eq!(items[1].install_date, UNKNOWN);
        assert_eq!(items[1].install_path, UNKNOWN);
    }
}
