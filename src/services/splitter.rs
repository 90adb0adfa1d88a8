//! Splitting a time range into query batches.

use chrono::TimeDelta;

use crate::error::{AppError, Result};
use crate::models::{QuerySpec, TimeRange};

/// Split `range` into `n` contiguous buckets of whole hours.
///
/// Buckets are `ceil(hours / n)` hours long, with a partial hour counted as a
/// whole one. Each bucket ends one second before the next starts and the last
/// bucket ends exactly at `range.end()`. Fails when the first `n - 1` buckets
/// would already cover the range, i.e. `(n - 1) * ceil(hours / n) >= hours`.
pub fn split(range: &TimeRange, n: usize) -> Result<Vec<TimeRange>> {
    if n == 0 {
        return Err(AppError::invalid_range("bucket count must be at least 1"));
    }
    if n == 1 {
        return Ok(vec![*range]);
    }

    let seconds = range.duration().num_seconds();
    let hours = seconds.div_euclid(3600) + i64::from(seconds.rem_euclid(3600) > 0);
    let buckets = i64::try_from(n)
        .map_err(|_| AppError::invalid_range(format!("{n} buckets is too many")))?;
    let bucket_hours = hours.div_euclid(buckets) + i64::from(hours % buckets > 0);
    if (buckets - 1) * bucket_hours >= hours {
        return Err(AppError::invalid_range(format!(
            "{range} spans {hours} hours, too short for {n} buckets of {bucket_hours} hours"
        )));
    }
    let size = TimeDelta::hours(bucket_hours);
    let second = TimeDelta::seconds(1);

    let mut out = Vec::with_capacity(n);
    let mut start = range.start();
    for _ in 0..n - 1 {
        let end = start + size - second;
        out.push(TimeRange::new(start, end)?);
        start = end + second;
    }
    out.push(TimeRange::new(start, range.end())?);

    Ok(out)
}

/// One query per bucket of the query's `datetime` interval.
pub fn split_query(query: &QuerySpec, n: usize) -> Result<Vec<QuerySpec>> {
    let interval = query
        .datetime()
        .ok_or_else(|| AppError::invalid_range("query has no datetime to split"))?;
    let range = TimeRange::parse(interval)?;
    Ok(split(&range, n)?
        .iter()
        .map(|bucket| query.clone().with_range(bucket))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::range::parse_timestamp;

    fn range(s: &str) -> TimeRange {
        TimeRange::parse(s).unwrap()
    }

    #[test]
    fn test_split_day_in_two() {
        let buckets = split(&range("2024-01-01T00:00:00/2024-01-02T00:00:00"), 2).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(
            buckets[0].to_string(),
            "2024-01-01T00:00:00/2024-01-01T11:59:59"
        );
        assert_eq!(
            buckets[1].to_string(),
            "2024-01-01T12:00:00/2024-01-02T00:00:00"
        );
    }

    #[test]
    fn test_buckets_cover_range_without_gaps() {
        let cases = [
            ("2024-01-01T00:00:00/2024-01-02T00:00:00", 2),
            ("2024-01-01T00:00:00/2024-01-02T00:00:00", 5),
            ("2024-01-01T00:00:00/2024-01-02T00:00:00", 24),
            ("2023-02-10T06:30:00/2023-03-01T00:00:00", 7),
            ("2020-01-01/2024-01-01", 12),
            ("2024-05-01T00:00:00/2024-05-01T10:15:00", 3),
        ];

        for (interval, n) in cases {
            let whole = range(interval);
            let buckets = split(&whole, n).unwrap();

            assert_eq!(buckets.len(), n, "{interval} / {n}");
            assert_eq!(buckets[0].start(), whole.start());
            assert_eq!(buckets[n - 1].end(), whole.end());
            for pair in buckets.windows(2) {
                assert_eq!(
                    pair[1].start() - pair[0].end(),
                    TimeDelta::seconds(1),
                    "{interval} / {n}"
                );
                assert!(pair[0].start() <= pair[0].end());
            }
        }
    }

    #[test]
    fn test_single_bucket_is_identity() {
        let whole = range("2024-01-01T00:00:00/2024-01-01T00:30:00");
        assert_eq!(split(&whole, 1).unwrap(), vec![whole]);
    }

    #[test]
    fn test_rejects_too_many_buckets() {
        let whole = range("2024-01-01T00:00:00/2024-01-01T03:00:00");
        assert!(matches!(split(&whole, 4), Err(AppError::InvalidRange(_))));
        assert!(matches!(split(&whole, 0), Err(AppError::InvalidRange(_))));
        assert_eq!(split(&whole, 3).unwrap().len(), 3);

        // Two-hour buckets: three of them already reach past five hours.
        let five = range("2024-01-01T00:00:00/2024-01-01T05:00:00");
        assert!(matches!(split(&five, 4), Err(AppError::InvalidRange(_))));
        let three = split(&five, 3).unwrap();
        assert_eq!(three[2].to_string(), "2024-01-01T04:00:00/2024-01-01T05:00:00");
    }

    #[test]
    fn test_split_query_keeps_other_params() {
        let query = QuerySpec::new(50)
            .with_param("collections", "C1")
            .with_datetime("2024-01-01T00:00:00/2024-01-02T00:00:00");

        let queries = split_query(&query, 2).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(
            queries[1].datetime(),
            Some("2024-01-01T12:00:00/2024-01-02T00:00:00")
        );
        assert!(queries.iter().all(|q| q.limit() == 50));
        assert!(
            queries
                .iter()
                .all(|q| q.to_pairs().contains(&("collections".into(), "C1".into())))
        );

        assert!(matches!(
            split_query(&QuerySpec::new(50), 2),
            Err(AppError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_now_end_resolves() {
        let query = QuerySpec::new(10).with_datetime("2000-01-01/now");
        let queries = split_query(&query, 4).unwrap();
        let last_end = TimeRange::parse(queries[3].datetime().unwrap()).unwrap().end();
        assert!(last_end > parse_timestamp("2020-01-01").unwrap());
    }
}
