use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use time::Month;

use super::records::PhotoRecord;

/// Photos grouped by creation month, iterated in ascending key order.
pub type MonthBuckets = BTreeMap<MonthKey, Vec<PhotoRecord>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonthKeyError {
    #[error("{0:?} does not start with YYYY-MM")]
    Malformed(String),
    #[error("month {month} in {value:?} is out of range")]
    MonthOutOfRange { value: String, month: u8 },
}

/// The `YYYY-MM` prefix of a creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonthKey {
    key: String,
    month: Month,
}

// `Month` has no ordering; the key string alone orders chronologically.
impl Ord for MonthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl PartialOrd for MonthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl MonthKey {
    pub fn parse(created_time: &str) -> Result<Self, MonthKeyError> {
        let malformed = || MonthKeyError::Malformed(created_time.to_string());
        let key = created_time.get(..7).ok_or_else(malformed)?;
        let bytes = key.as_bytes();
        let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
        if !digits(0..4) || bytes[4] != b'-' || !digits(5..7) {
            return Err(malformed());
        }

        let month_number: u8 = key[5..7].parse().map_err(|_| malformed())?;
        let month = Month::try_from(month_number).map_err(|_| MonthKeyError::MonthOutOfRange {
            value: created_time.to_string(),
            month: month_number,
        })?;
        Ok(Self {
            key: key.to_string(),
            month,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Name of the year folder, e.g. `2020`.
    pub fn year_folder_name(&self) -> &str {
        &self.key[..4]
    }

    /// English month name, independent of the process locale.
    pub fn month_folder_name(&self) -> String {
        self.month.to_string()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Groups photos by creation month, keeping input order within a bucket.
pub fn bucket_by_month<I>(photos: I) -> MonthBuckets
where
    I: IntoIterator<Item = PhotoRecord>,
{
    let mut buckets = MonthBuckets::new();
    for photo in photos {
        buckets
            .entry(photo.month_key().clone())
            .or_default()
            .push(photo);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(id: &str, created_time: &str) -> PhotoRecord {
        PhotoRecord::new(id, format!("{id}.jpg"), created_time).unwrap()
    }

    fn ids(photos: &[PhotoRecord]) -> Vec<&str> {
        photos.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn parses_year_and_month_names() {
        let key = MonthKey::parse("2020-03-05T10:11:12.000Z").unwrap();
        assert_eq!(key.as_str(), "2020-03");
        assert_eq!(key.year_folder_name(), "2020");
        assert_eq!(key.month_folder_name(), "March");
    }

    #[test]
    fn month_table_covers_every_month() {
        let names: Vec<String> = (1..=12)
            .map(|m| {
                MonthKey::parse(&format!("2021-{m:02}"))
                    .unwrap()
                    .month_folder_name()
            })
            .collect();
        assert_eq!(
            names,
            [
                "January", "February", "March", "April", "May", "June", "July", "August",
                "September", "October", "November", "December",
            ]
        );
    }

    #[test]
    fn rejects_malformed_created_times() {
        for bad in ["", "2020", "2020/03/05", "20-03-2020", "2020-3-05", "２０２０-03"] {
            assert!(
                matches!(MonthKey::parse(bad), Err(MonthKeyError::Malformed(_))),
                "{bad:?} should be malformed"
            );
        }
        assert_eq!(
            MonthKey::parse("2020-13-01"),
            Err(MonthKeyError::MonthOutOfRange {
                value: "2020-13-01".into(),
                month: 13
            })
        );
        assert!(matches!(
            MonthKey::parse("2020-00-01"),
            Err(MonthKeyError::MonthOutOfRange { month: 0, .. })
        ));
    }

    #[test]
    fn buckets_scenario_by_month() {
        let buckets = bucket_by_month(vec![
            photo("a", "2020-03-05T08:00:00Z"),
            photo("b", "2020-03-20T08:00:00Z"),
            photo("c", "2020-04-01T08:00:00Z"),
        ]);

        let keys: Vec<&str> = buckets.keys().map(MonthKey::as_str).collect();
        assert_eq!(keys, ["2020-03", "2020-04"]);
        let march = MonthKey::parse("2020-03").unwrap();
        let april = MonthKey::parse("2020-04").unwrap();
        assert_eq!(ids(&buckets[&march]), ["a", "b"]);
        assert_eq!(ids(&buckets[&april]), ["c"]);
    }

    #[test]
    fn bucketing_partitions_input_exactly() {
        let created = [
            "2019-12-31T23:59:59Z",
            "2020-01-01T00:00:00Z",
            "2019-12-01T00:00:00Z",
            "2020-01-15T00:00:00Z",
            "2018-07-04T12:00:00Z",
            "2020-01-31T00:00:00Z",
        ];
        let photos: Vec<PhotoRecord> = created
            .iter()
            .enumerate()
            .map(|(i, ts)| photo(&format!("p{i}"), ts))
            .collect();

        let buckets = bucket_by_month(photos.clone());

        let total: usize = buckets.values().map(Vec::len).sum();
        assert_eq!(total, photos.len());
        for (key, bucket) in &buckets {
            assert!(bucket.iter().all(|p| &p.created_time[..7] == key.as_str()));
        }
        let mut seen: Vec<&str> = buckets.values().flatten().map(|p| p.id.as_str()).collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);

        let january = MonthKey::parse("2020-01").unwrap();
        assert_eq!(ids(&buckets[&january]), ["p1", "p3", "p5"]);
        let first_key = buckets.keys().next().unwrap();
        assert_eq!(first_key.as_str(), "2018-07");
    }

    #[test]
    fn empty_input_gives_no_buckets() {
        assert!(bucket_by_month(Vec::<PhotoRecord>::new()).is_empty());
    }
}
