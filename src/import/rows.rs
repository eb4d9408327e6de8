//! Typed access to CSV fields
//!
//! Source exports are loose: numeric columns may arrive as `12.0`, optional
//! columns may be blank or absent. Field errors are plain strings that end up
//! as row failure reasons.

use csv::StringRecord;
use std::collections::HashMap;

pub(crate) type FieldResult<T> = std::result::Result<T, String>;

/// Column name to index
pub(crate) struct Columns(HashMap<String, usize>);

impl Columns {
    pub fn new(headers: &StringRecord) -> Self {
        Self(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        )
    }

    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|c| !self.0.contains_key(*c))
            .collect()
    }

    pub fn row<'a>(&'a self, record: &'a StringRecord) -> CsvRow<'a> {
        CsvRow {
            columns: self,
            record,
        }
    }
}

pub(crate) struct CsvRow<'a> {
    columns: &'a Columns,
    record: &'a StringRecord,
}

impl CsvRow<'_> {
    fn raw(&self, column: &str) -> Option<&str> {
        self.columns
            .0
            .get(column)
            .and_then(|&i| self.record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
    }

    pub fn text(&self, column: &str) -> FieldResult<String> {
        self.raw(column)
            .map(str::to_string)
            .ok_or_else(|| format!("{} is required", column))
    }

    pub fn opt_text(&self, column: &str) -> String {
        self.raw(column).map(str::to_string).unwrap_or_default()
    }

    pub fn int(&self, column: &str) -> FieldResult<i64> {
        let raw = self.raw(column).ok_or_else(|| format!("{} is required", column))?;
        parse_int(raw).ok_or_else(|| format!("{} is not an integer: '{}'", column, raw))
    }

    pub fn opt_int(&self, column: &str) -> FieldResult<Option<i64>> {
        match self.raw(column) {
            None => Ok(None),
            Some(raw) => parse_int(raw)
                .map(Some)
                .ok_or_else(|| format!("{} is not an integer: '{}'", column, raw)),
        }
    }

    pub fn float(&self, column: &str) -> FieldResult<f64> {
        self.opt_float(column)?
            .ok_or_else(|| format!("{} is required", column))
    }

    pub fn opt_float(&self, column: &str) -> FieldResult<Option<f64>> {
        match self.raw(column) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("{} is not a number: '{}'", column, raw)),
        }
    }

    /// A numeric identifier kept as text (phone numbers, passcodes)
    pub fn code(&self, column: &str) -> FieldResult<String> {
        let raw = self.text(column)?;
        Ok(match parse_int(&raw) {
            Some(n) => n.to_string(),
            None => raw,
        })
    }
}

/// Accepts `12` and `12.0`, rejects `12.5`
fn parse_int(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.fract() == 0.0 && f.is_finite() && f.abs() < i64::MAX as f64).then_some(f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_parse_int_accepts_float_exports() {
        assert_eq!(parse_int("12"), Some(12));
        assert_eq!(parse_int("12.0"), Some(12));
        assert_eq!(parse_int("-1"), Some(-1));
        assert_eq!(parse_int("12.5"), None);
        assert_eq!(parse_int("abc"), None);
    }

    #[test]
    fn test_blank_and_missing_columns() {
        let columns = Columns::new(&record(&["student_id", "ssc_marks", "phone_no"]));
        let values = record(&["7", "NaN", "9876543210.0"]);
        let row = columns.row(&values);

        assert_eq!(row.int("student_id").unwrap(), 7);
        assert_eq!(row.opt_float("ssc_marks").unwrap(), None);
        assert_eq!(row.opt_float("inter_marks").unwrap(), None);
        assert_eq!(row.code("phone_no").unwrap(), "9876543210");
        assert!(row.int("roll_no").unwrap_err().contains("required"));
    }

    #[test]
    fn test_missing_headers() {
        let columns = Columns::new(&record(&["a", " b "]));
        assert!(columns.missing(&["a", "b"]).is_empty());
        assert_eq!(columns.missing(&["a", "c"]), vec!["c"]);
    }
}
