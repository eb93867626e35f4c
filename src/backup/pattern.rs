//! Backup file naming
//!
//! Backups of `app.db` are named `app_backup_YYYYMMDD_HHMMSS.db`. When two
//! backups land in the same second the later one gets a sequence suffix:
//! `app_backup_YYYYMMDD_HHMMSS_1.db`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const MARKER: &str = "_backup_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Naming scheme for the backups of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPattern {
    /// Source file name without extension
    stem: String,
    /// Source extension including the dot, or empty
    extension: String,
}

impl BackupPattern {
    /// Derive the pattern from the file being backed up
    pub fn from_source(source: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { stem, extension }
    }

    fn prefix(&self) -> String {
        format!("{}{}", self.stem, MARKER)
    }

    /// File name for a backup taken at `timestamp`
    pub fn file_name(&self, timestamp: &DateTime<Utc>) -> String {
        format!(
            "{}{}{}",
            self.prefix(),
            timestamp.format(TIMESTAMP_FORMAT),
            self.extension
        )
    }

    /// Pick a destination in `dir` that does not exist yet
    pub fn unique_destination(&self, dir: &Path, timestamp: &DateTime<Utc>) -> PathBuf {
        let candidate = dir.join(self.file_name(timestamp));
        if !candidate.exists() {
            return candidate;
        }

        let base = format!("{}{}", self.prefix(), timestamp.format(TIMESTAMP_FORMAT));
        (1u32..)
            .map(|seq| dir.join(format!("{}_{}{}", base, seq, self.extension)))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }

    /// Whether `file_name` is a backup produced by this pattern
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix())
            && file_name.ends_with(&self.extension)
            && file_name.len() > self.prefix().len() + self.extension.len()
    }

    /// Recover the timestamp embedded in a backup file name
    pub fn parse_timestamp(&self, file_name: &str) -> Option<DateTime<Utc>> {
        if !self.matches(file_name) {
            return None;
        }
        let middle = file_name
            .strip_prefix(&self.prefix())?
            .strip_suffix(&self.extension)?;
        parse_backup_timestamp(middle)
    }
}

/// Parse `YYYYMMDD_HHMMSS` with an optional `_N` sequence suffix
fn parse_backup_timestamp(date_str: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = date_str.split('_').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let date_part = parts[0];
    let time_part = parts[1];
    if parts.len() == 3 && parts[2].parse::<u32>().is_err() {
        return None;
    }

    if date_part.len() != 8 || time_part.len() != 6 {
        return None;
    }

    let year: i32 = date_part.get(0..4)?.parse().ok()?;
    let month: u32 = date_part.get(4..6)?.parse().ok()?;
    let day: u32 = date_part.get(6..8)?.parse().ok()?;
    let hour: u32 = time_part.get(0..2)?.parse().ok()?;
    let minute: u32 = time_part.get(2..4)?.parse().ok()?;
    let second: u32 = time_part.get(4..6)?.parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;

    Some(DateTime::from_naive_utc_and_offset(
        NaiveDateTime::new(date, time),
        Utc,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_file_name() {
        let pattern = BackupPattern::from_source(Path::new("/data/app.db"));
        assert_eq!(pattern.file_name(&new_year()), "app_backup_20240101_000000.db");
    }

    #[test]
    fn test_file_name_without_extension() {
        let pattern = BackupPattern::from_source(Path::new("/data/ledger"));
        assert_eq!(pattern.file_name(&new_year()), "ledger_backup_20240101_000000");
    }

    #[test]
    fn test_matches() {
        let pattern = BackupPattern::from_source(Path::new("app.db"));
        assert!(pattern.matches("app_backup_20240101_000000.db"));
        assert!(pattern.matches("app_backup_20240101_000000_2.db"));
        assert!(!pattern.matches("app_backup_20240101_000000.json"));
        assert!(!pattern.matches("other_backup_20240101_000000.db"));
        assert!(!pattern.matches("app.db"));
        assert!(!pattern.matches("app_backup_.db"));
    }

    #[test]
    fn test_parse_timestamp() {
        let pattern = BackupPattern::from_source(Path::new("app.db"));
        assert_eq!(
            pattern.parse_timestamp("app_backup_20240101_000000.db"),
            Some(new_year())
        );
        assert_eq!(
            pattern.parse_timestamp("app_backup_20240101_000000_7.db"),
            Some(new_year())
        );
        assert_eq!(pattern.parse_timestamp("app_backup_20241301_000000.db"), None);
        assert_eq!(pattern.parse_timestamp("app_backup_junk.db"), None);
    }

    #[test]
    fn test_unique_destination_adds_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let pattern = BackupPattern::from_source(Path::new("app.db"));

        let first = pattern.unique_destination(temp_dir.path(), &new_year());
        assert_eq!(first, temp_dir.path().join("app_backup_20240101_000000.db"));
        std::fs::write(&first, b"x").unwrap();

        let second = pattern.unique_destination(temp_dir.path(), &new_year());
        assert_eq!(second, temp_dir.path().join("app_backup_20240101_000000_1.db"));
        std::fs::write(&second, b"x").unwrap();

        let third = pattern.unique_destination(temp_dir.path(), &new_year());
        assert_eq!(third, temp_dir.path().join("app_backup_20240101_000000_2.db"));
    }
}
