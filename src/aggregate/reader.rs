//! `Reader`: decodes an Aggregate-Store image and computes per-test rolling
//! metrics over its retention window.

use std::collections::HashSet;

use crate::constants::SECONDS_PER_DAY;
use crate::error::Error;

use super::format::{self, read_commits_at, read_string_at};
use super::Aggregate;

struct RawBucket {
    day_index: u32,
    pass_count: u32,
    fail_count: u32,
    flaky_fail_count: u32,
    skip_count: u32,
    fail_commits_off: u32,
    fail_commits_len: u32,
    fail_commits: Vec<String>,
}

struct RawRecord {
    test_id: [u8; 16],
    name: String,
    testsuite: String,
    flags: Vec<String>,
    updated_at: i64,
    avg_duration: f64,
    last_duration: f64,
    buckets: Vec<RawBucket>,
}

/// A decoded, read-only view of an Aggregate-Store image.
pub struct Reader {
    window_days: u8,
    now_day: i64,
    records: Vec<RawRecord>,
}

impl Reader {
    /// Validates magic, version, and internal framing, then decodes every
    /// record eagerly.
    pub fn new(bytes: &[u8], now_timestamp: i64) -> Result<Self, Error> {
        let header = format::read_header(bytes)?;
        let strings_off = header.strings_off as usize;
        if strings_off > bytes.len() {
            return Err(Error::CorruptAggregate("strings_off out of bounds".into()));
        }
        if strings_off < format::HEADER_LEN {
            return Err(Error::CorruptAggregate("strings_off precedes header".into()));
        }

        let records_region = &bytes[format::HEADER_LEN..];
        let strings_table = &bytes[strings_off..];

        // `num_records` comes straight off the untrusted header; bound it
        // against what the records region could actually hold before using
        // it as an allocation hint, so a corrupt huge count can't force an
        // unbounded (and uncatchable, on allocation failure) allocation.
        let max_possible_records = records_region.len() / format::MIN_RECORD_LEN;
        if header.num_records as usize > max_possible_records {
            return Err(Error::CorruptAggregate(
                "num_records exceeds what the records region could hold".into(),
            ));
        }

        let mut records = Vec::with_capacity(header.num_records as usize);
        let mut cursor = 0usize;

        for _ in 0..header.num_records {
            let (record, consumed) = decode_record(records_region, cursor, strings_table)?;
            records.push(record);
            cursor += consumed;
        }

        // Everything after the records is the commits table, up to
        // strings_off.
        let commits_table_end = strings_off - format::HEADER_LEN;
        if cursor > commits_table_end {
            return Err(Error::CorruptAggregate("records overrun commits table".into()));
        }
        let commits_table = &records_region[cursor..commits_table_end];

        for record in &mut records {
            for bucket in &mut record.buckets {
                bucket.fail_commits =
                    read_commits_at(commits_table, bucket.fail_commits_off, bucket.fail_commits_len)?;
            }
        }

        Ok(Self {
            window_days: header.window_days,
            now_day: now_timestamp.div_euclid(SECONDS_PER_DAY),
            records,
        })
    }

    fn window_start(&self) -> i64 {
        self.now_day - self.window_days as i64 + 1
    }

    /// Returns at most `count` aggregates, skipping the first `offset`,
    /// sorted by `updated_at` descending (ties by `test_id` ascending).
    pub fn get_test_aggregates(&self, offset: usize, count: usize) -> Vec<Aggregate> {
        let window_start = self.window_start();
        let now_day = self.now_day;

        let mut aggregates: Vec<Aggregate> = self
            .records
            .iter()
            .filter_map(|record| build_aggregate(record, window_start, now_day))
            .collect();

        aggregates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.test_id.cmp(&b.test_id)));

        aggregates.into_iter().skip(offset).take(count).collect()
    }
}

fn build_aggregate(record: &RawRecord, window_start: i64, now_day: i64) -> Option<Aggregate> {
    let in_window: Vec<&RawBucket> = record
        .buckets
        .iter()
        .filter(|b| {
            let day = b.day_index as i64;
            day >= window_start && day <= now_day
        })
        .collect();

    if in_window.is_empty() {
        return None;
    }

    let mut total_pass_count = 0u64;
    let mut total_fail_count = 0u64;
    let mut total_flaky_fail_count = 0u64;
    let mut total_skip_count = 0u64;
    let mut fail_commits: HashSet<&str> = HashSet::new();

    for bucket in &in_window {
        total_pass_count += bucket.pass_count as u64;
        total_fail_count += bucket.fail_count as u64;
        total_flaky_fail_count += bucket.flaky_fail_count as u64;
        total_skip_count += bucket.skip_count as u64;
        fail_commits.extend(bucket.fail_commits.iter().map(String::as_str));
    }

    let failure_rate =
        total_fail_count as f64 / (total_fail_count + total_pass_count).max(1) as f64;
    let flake_rate =
        total_flaky_fail_count as f64 / (total_flaky_fail_count + total_pass_count).max(1) as f64;

    Some(Aggregate {
        name: record.name.clone(),
        test_id: record.test_id,
        testsuite: record.testsuite.clone(),
        flags: record.flags.clone(),
        failure_rate,
        flake_rate,
        updated_at: record.updated_at,
        avg_duration: record.avg_duration,
        last_duration: record.last_duration,
        total_fail_count,
        total_flaky_fail_count,
        total_pass_count,
        total_skip_count,
        commits_where_fail: fail_commits.len() as u64,
    })
}

/// Decodes one `RecordEntry`, returning it along with the number of bytes
/// it consumed from `region[start..]`.
fn decode_record(
    region: &[u8],
    start: usize,
    strings_table: &[u8],
) -> Result<(RawRecord, usize), Error> {
    let mut cursor = start;
    let need = |cursor: usize, n: usize| -> Result<(), Error> {
        if cursor + n > region.len() {
            Err(Error::CorruptAggregate("truncated record".into()))
        } else {
            Ok(())
        }
    };

    need(cursor, 16)?;
    let test_id: [u8; 16] = region[cursor..cursor + 16].try_into().unwrap();
    cursor += 16;

    need(cursor, 4)?;
    let name_ref = u32::from_le_bytes(region[cursor..cursor + 4].try_into().unwrap());
    cursor += 4;

    need(cursor, 4)?;
    let testsuite_ref = u32::from_le_bytes(region[cursor..cursor + 4].try_into().unwrap());
    cursor += 4;

    need(cursor, 2)?;
    let flags_count = u16::from_le_bytes(region[cursor..cursor + 2].try_into().unwrap()) as usize;
    cursor += 2;

    let mut flag_refs = Vec::with_capacity(flags_count);
    for _ in 0..flags_count {
        need(cursor, 4)?;
        flag_refs.push(u32::from_le_bytes(region[cursor..cursor + 4].try_into().unwrap()));
        cursor += 4;
    }

    need(cursor, 8)?;
    let updated_at = i64::from_le_bytes(region[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;

    need(cursor, 8)?;
    let avg_duration = f64::from_le_bytes(region[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;

    need(cursor, 8)?;
    let last_duration = f64::from_le_bytes(region[cursor..cursor + 8].try_into().unwrap());
    cursor += 8;

    need(cursor, 2)?;
    let buckets_count = u16::from_le_bytes(region[cursor..cursor + 2].try_into().unwrap()) as usize;
    cursor += 2;

    let mut buckets = Vec::with_capacity(buckets_count);
    for _ in 0..buckets_count {
        need(cursor, format::BUCKET_LEN)?;
        let day_index = u32::from_le_bytes(region[cursor..cursor + 4].try_into().unwrap());
        let pass_count = u32::from_le_bytes(region[cursor + 4..cursor + 8].try_into().unwrap());
        let fail_count = u32::from_le_bytes(region[cursor + 8..cursor + 12].try_into().unwrap());
        let flaky_fail_count = u32::from_le_bytes(region[cursor + 12..cursor + 16].try_into().unwrap());
        let skip_count = u32::from_le_bytes(region[cursor + 16..cursor + 20].try_into().unwrap());
        let fail_commits_off = u32::from_le_bytes(region[cursor + 20..cursor + 24].try_into().unwrap());
        let fail_commits_len = u32::from_le_bytes(region[cursor + 24..cursor + 28].try_into().unwrap());
        cursor += format::BUCKET_LEN;

        buckets.push(RawBucket {
            day_index,
            pass_count,
            fail_count,
            flaky_fail_count,
            skip_count,
            fail_commits_off,
            fail_commits_len,
            fail_commits: Vec::new(),
        });
    }

    let name = read_string_at(strings_table, name_ref)?;
    let testsuite = read_string_at(strings_table, testsuite_ref)?;
    let flags = flag_refs
        .into_iter()
        .map(|r| read_string_at(strings_table, r))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((
        RawRecord {
            test_id,
            name,
            testsuite,
            flags,
            updated_at,
            avg_duration,
            last_duration,
            buckets,
        },
        cursor - start,
    ))
}

#[cfg(test)]
mod tests {
    use crate::model::{Outcome, Testrun};

    use super::super::writer::Writer;
    use super::*;

    fn testrun(name: &str, outcome: Outcome, duration: f64) -> Testrun {
        Testrun {
            name: name.to_string(),
            classname: String::new(),
            testsuite: "suite".to_string(),
            duration,
            outcome,
            failure_message: None,
            filename: None,
            build_url: None,
            computed_name: None,
        }
    }

    #[test]
    fn round_trip_counts_match_ingested_testruns() {
        let mut writer = Writer::new(30);
        let day0 = 1_700_000_000i64;
        writer.add_testruns(
            day0,
            "commit1",
            &["upload".into(), "flags".into()],
            &[testrun("t", Outcome::Pass, 0.2)],
        );
        let bytes = writer.serialize();

        let reader = Reader::new(&bytes, day0 + 10).unwrap();
        let aggregates = reader.get_test_aggregates(0, 10);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].total_pass_count, 1);
        assert_eq!(aggregates[0].total_fail_count, 0);
    }

    #[test]
    fn flake_detection_within_one_bucket() {
        let mut writer = Writer::new(30);
        let day0 = 1_700_000_000i64;
        writer.add_testruns(
            day0,
            "commitA",
            &["upload".into(), "flags".into()],
            &[testrun("t", Outcome::Failure, 0.1)],
        );
        writer.add_testruns(
            day0 + 60,
            "commitA",
            &["upload".into(), "flags".into()],
            &[testrun("t", Outcome::Pass, 0.1)],
        );
        let bytes = writer.serialize();

        let reader = Reader::new(&bytes, day0 + 120).unwrap();
        let aggregates = reader.get_test_aggregates(0, 10);
        assert_eq!(aggregates.len(), 1);
        let agg = &aggregates[0];
        assert_eq!(agg.total_pass_count, 1);
        assert_eq!(agg.total_fail_count, 1);
        assert_eq!(agg.total_flaky_fail_count, 1);
        assert_eq!(agg.flake_rate, 0.5);
        assert_eq!(agg.failure_rate, 0.5);
        assert_eq!(agg.commits_where_fail, 1);
    }

    #[test]
    fn records_with_no_buckets_in_window_age_out() {
        let mut writer = Writer::new(30);
        let old_day = 0i64;
        writer.add_testruns(old_day, "commit1", &[], &[testrun("t", Outcome::Pass, 0.1)]);
        let bytes = writer.serialize();

        let now = old_day + 31 * SECONDS_PER_DAY;
        let reader = Reader::new(&bytes, now).unwrap();
        assert!(reader.get_test_aggregates(0, 10).is_empty());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = Reader::new(b"nope", 0).unwrap_err();
        assert!(matches!(err, Error::CorruptAggregate(_)));
    }

    #[test]
    fn strings_off_before_header_is_rejected_not_a_panic() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"TRAG");
        bytes.push(1); // version
        bytes.push(30); // window_days
        bytes.extend_from_slice(&[0u8; 2]); // reserved
        bytes.extend_from_slice(&0u32.to_le_bytes()); // num_records
        bytes.extend_from_slice(&0u32.to_le_bytes()); // strings_off < HEADER_LEN
        assert_eq!(bytes.len(), format::HEADER_LEN);

        let err = Reader::new(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::CorruptAggregate(_)));
    }

    #[test]
    fn implausible_num_records_is_rejected_not_an_allocation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"TRAG");
        bytes.push(1); // version
        bytes.push(30); // window_days
        bytes.extend_from_slice(&[0u8; 2]); // reserved
        bytes.extend_from_slice(&u32::MAX.to_le_bytes()); // num_records
        bytes.extend_from_slice(&(format::HEADER_LEN as u32).to_le_bytes()); // strings_off
        assert_eq!(bytes.len(), format::HEADER_LEN);

        let err = Reader::new(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::CorruptAggregate(_)));
    }
}
