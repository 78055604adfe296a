//! Splitting of long date ranges into submission windows the service accepts.
use crate::error::DateRangeError;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest submission window the service handles well.
pub const MAX_CHUNK_MONTHS: u32 = 6;

pub const DEFAULT_CHUNK_MONTHS: u32 = MAX_CHUNK_MONTHS;

/// An inclusive range of calendar dates with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = DateRangeError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

/// A window produced by [`chunk_range`]; never longer than the chunk ceiling.
pub type DateChunk = DateRange;

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Folder name used for the files of this window, e.g. `2018-07-01_to_2018-12-31`.
    pub fn period_label(&self) -> String {
        format!("{}_to_{}", self.start, self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Splits `range` into consecutive windows of at most `months` calendar months.
///
/// Each window ends the day before `start + months`; month addition clamps to
/// the last day of the target month, so 2018-08-31 plus six months is
/// 2019-02-28. The last window is clipped to the end of `range`. `months` is
/// clamped to `1..=MAX_CHUNK_MONTHS`.
pub fn chunk_range(range: &DateRange, months: u32) -> Vec<DateChunk> {
    let span = Months::new(months.clamp(1, MAX_CHUNK_MONTHS));
    let mut chunks = vec![];
    let mut cursor = range.start;

    loop {
        let end = cursor
            .checked_add_months(span)
            .and_then(|next| next.checked_sub_days(Days::new(1)))
            .map_or(range.end, |end| end.min(range.end));

        chunks.push(DateRange { start: cursor, end });

        match end.succ_opt() {
            Some(next) if next <= range.end => cursor = next,
            _ => break,
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(date(start), date(end)).unwrap()
    }

    #[test]
    fn test_full_year_yields_two_halves() {
        let chunks = chunk_range(&range("2018-01-01", "2018-12-31"), 6);
        assert_eq!(
            chunks,
            vec![
                range("2018-01-01", "2018-06-30"),
                range("2018-07-01", "2018-12-31")
            ]
        );
    }

    #[test]
    fn test_single_day() {
        let chunks = chunk_range(&range("2020-02-29", "2020-02-29"), 6);
        assert_eq!(chunks, vec![range("2020-02-29", "2020-02-29")]);
    }

    #[test]
    fn test_month_end_clamps() {
        let chunks = chunk_range(&range("2018-08-31", "2019-03-31"), 6);
        assert_eq!(
            chunks,
            vec![
                range("2018-08-31", "2019-02-27"),
                range("2019-02-28", "2019-03-31")
            ]
        );
    }

    #[test]
    fn test_last_chunk_is_clipped() {
        let chunks = chunk_range(&range("2018-01-01", "2019-02-15"), 6);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], range("2019-01-01", "2019-02-15"));
    }

    #[test]
    fn test_chunks_cover_range_without_gaps() {
        let starts = ["2017-01-31", "2018-03-15", "2019-12-31", "2020-02-29"];
        let lengths = [0_u64, 1, 30, 181, 182, 365, 1000, 2500];

        for start in starts {
            for len in lengths {
                let start = date(start);
                let end = start + Days::new(len);
                let input = DateRange::new(start, end).unwrap();
                let chunks = chunk_range(&input, 6);

                assert_eq!(chunks.first().unwrap().start(), start);
                assert_eq!(chunks.last().unwrap().end(), end);
                for chunk in &chunks {
                    assert!(chunk.start() <= chunk.end());
                    assert!(chunk.end() < chunk.start() + Months::new(6));
                }
                for pair in chunks.windows(2) {
                    assert_eq!(pair[0].end().succ_opt().unwrap(), pair[1].start());
                }
            }
        }
    }

    #[test]
    fn test_months_above_ceiling_are_clamped() {
        let input = range("2018-01-01", "2018-12-31");
        assert_eq!(chunk_range(&input, 12), chunk_range(&input, 6));
        assert_eq!(chunk_range(&input, 0), chunk_range(&input, 1));
        assert_eq!(chunk_range(&input, 1).len(), 12);
    }

    #[test]
    fn test_deserialize_checks_order() {
        let ok: DateRange =
            serde_json::from_str(r#"{"start": "2018-01-01", "end": "2018-06-30"}"#).unwrap();
        assert_eq!(ok, range("2018-01-01", "2018-06-30"));

        let inverted =
            serde_json::from_str::<DateRange>(r#"{"start": "2019-01-01", "end": "2018-01-01"}"#);
        assert!(inverted.is_err());
    }

    #[test]
    fn test_deterministic() {
        let input = range("2018-01-01", "2023-05-17");
        assert_eq!(chunk_range(&input, 6), chunk_range(&input, 6));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = DateRange::new(date("2018-02-01"), date("2018-01-01")).unwrap_err();
        assert_eq!(
            err,
            DateRangeError::Inverted {
                start: date("2018-02-01"),
                end: date("2018-01-01")
            }
        );
    }

    #[test]
    fn test_period_label() {
        assert_eq!(
            range("2018-07-01", "2018-12-31").period_label(),
            "2018-07-01_to_2018-12-31"
        );
    }
}
