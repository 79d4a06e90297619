//! Appends a column of random dates to a CSV table.

use crate::error::{ColloquyError, ColloquyResult};
use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{Read, Write};
use tracing::info;

/// Header of the appended column
pub const DATE_COLUMN: &str = "Date";

/// Output format of generated dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Half-open range of days to draw dates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range covering `start` up to, but excluding, `end`
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error unless `start` is before `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> ColloquyResult<Self> {
        if start >= end {
            return Err(ColloquyError::invalid_input(format!(
                "Date range start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from `YYYY-MM-DD`
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error for malformed dates or an empty range.
    pub fn parse(start: &str, end: &str) -> ColloquyResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map_err(|e| ColloquyError::invalid_input(format!("Invalid date '{s}': {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// First day of the range
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Day after the last day of the range
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range
    #[must_use]
    pub fn days(&self) -> u64 {
        (self.end - self.start).num_days().unsigned_abs()
    }

    /// Draw a uniformly distributed day
    pub fn sample<R: Rng>(&self, rng: &mut R) -> NaiveDate {
        let offset = rng.gen_range(0..self.days());
        self.start + Days::new(offset)
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2023, 9, 25).unwrap_or_default(),
        }
    }
}

/// Copy a CSV table from `reader` to `writer`, appending a `Date` column.
///
/// Returns the number of data rows written.
///
/// # Errors
///
/// Returns a script error if the CSV cannot be read or written.
pub fn add_random_dates<R: Read, W: Write>(
    reader: R,
    writer: W,
    range: DateRange,
    seed: u64,
) -> ColloquyResult<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    let mut headers = reader.headers()?.clone();
    headers.push_field(DATE_COLUMN);
    writer.write_record(&headers)?;

    let mut rows = 0;
    for record in reader.records() {
        let mut record = record?;
        let date = range.sample(&mut rng).format(DATE_FORMAT).to_string();
        record.push_field(&date);
        writer.write_record(&record)?;
        rows += 1;
    }
    writer.flush()?;

    info!(
        "Added random dates between {} and {} to {} rows",
        range.start(),
        range.end(),
        rows
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_validation() {
        assert!(DateRange::new(date(2023, 6, 1), date(2023, 6, 1)).is_err());
        assert!(DateRange::new(date(2023, 6, 2), date(2023, 6, 1)).is_err());
        assert_eq!(DateRange::new(date(2023, 6, 1), date(2023, 6, 11)).unwrap().days(), 10);
    }

    #[test]
    fn test_range_parse() {
        let range = DateRange::parse("2023-06-01", "2023-09-25").unwrap();
        assert_eq!(range, DateRange::default());
        assert!(DateRange::parse("June 1", "2023-09-25").is_err());
    }

    #[test]
    fn test_samples_stay_in_range() {
        let range = DateRange::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let day = range.sample(&mut rng);
            assert!(day >= range.start() && day < range.end());
        }
    }

    #[test]
    fn test_add_random_dates() {
        let input = "id,text\n1,hello\n2,\"hi, there\"\n";
        let mut output = Vec::new();
        let rows = add_random_dates(input.as_bytes(), &mut output, DateRange::default(), 42).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,text,Date");
        assert!(lines[2].starts_with("2,\"hi, there\",2023-"));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        for record in reader.records() {
            let record = record.unwrap();
            let day = NaiveDate::parse_from_str(&record[2], DATE_FORMAT).unwrap();
            assert!(day >= date(2023, 6, 1) && day < date(2023, 9, 25));
        }
    }

    #[test]
    fn test_add_random_dates_is_seeded() {
        let input = "a\n1\n2\n3\n4\n";
        let run = |seed| {
            let mut out = Vec::new();
            add_random_dates(input.as_bytes(), &mut out, DateRange::default(), seed).unwrap();
            out
        };
        assert_eq!(run(9), run(9));
    }
}
