use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Parses an RCS delta date: `YYYY.MM.DD.hh.mm.ss`, or `YY.MM.DD.hh.mm.ss` for
/// years before 2000. RCS always records UTC.
pub fn parse_rcs_date(date: &str) -> Result<DateTime<Utc>> {
    let parts = date
        .split('.')
        .map(|p| p.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid RCS date: {}", date))?;

    let [year, month, day, hour, minute, second] = parts[..] else {
        bail!("Invalid RCS date (expected 6 fields): {}", date);
    };
    let year = if year < 100 { 1900 + year } else { year };

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|dt| dt.and_utc())
        .with_context(|| format!("RCS date out of range: {}", date))
}

/// Parses the epoch-seconds `date` attribute of topic metadata.
pub fn parse_epoch(date: &str) -> Result<DateTime<Utc>> {
    let secs: i64 = date
        .trim()
        .parse()
        .with_context(|| format!("Invalid epoch timestamp: {:?}", date))?;
    DateTime::from_timestamp(secs, 0)
        .with_context(|| format!("Epoch timestamp out of range: {}", secs))
}

/// ISO-8601 UTC with a `Z` suffix, second precision.
pub fn format_iso(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_digit_year() {
        let ts = parse_rcs_date("2005.01.02.03.04.05").unwrap();
        assert_eq!(format_iso(&ts), "2005-01-02T03:04:05Z");
    }

    #[test]
    fn two_digit_year_is_last_century() {
        let ts = parse_rcs_date("99.12.31.23.59.59").unwrap();
        assert_eq!(format_iso(&ts), "1999-12-31T23:59:59Z");
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(parse_rcs_date("2005.01.02").is_err());
        assert!(parse_rcs_date("2005.01.02.03.04.05.06").is_err());
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(parse_rcs_date("2005.02.30.00.00.00").is_err());
        assert!(parse_rcs_date("2005.01.02.25.00.00").is_err());
        assert!(parse_rcs_date("2005.xx.02.03.04.05").is_err());
    }

    #[test]
    fn epoch_seconds() {
        let ts = parse_epoch("1100000000").unwrap();
        assert_eq!(format_iso(&ts), "2004-11-09T11:33:20Z");
    }

    #[test]
    fn epoch_rejects_garbage() {
        assert!(parse_epoch("yesterday").is_err());
        assert!(parse_epoch("").is_err());
    }
}
