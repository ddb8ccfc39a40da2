use adbhost::adb::FileStat;

use crate::output::TableFormat;

impl TableFormat for FileStat {
    fn headers() -> Vec<&'static str> {
        vec!["MODE", "SIZE", "MODIFIED", "NAME"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.permissions_string(),
            self.size.to_string(),
            self.mtime
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.path.clone(),
        ]
    }
}
