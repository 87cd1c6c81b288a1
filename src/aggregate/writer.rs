//! `Writer`: ingests batches of [`Testrun`]s tagged by commit/flags and
//! produces the serialized Aggregate-Store image.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::constants::TEST_ID_NAMESPACE;
use crate::model::Testrun;

use super::format::{self, Header};

const IDENTITY_SEP: u8 = 0x1F;

#[derive(Debug, Default, Clone)]
struct BucketState {
    pass_count: u32,
    fail_count: u32,
    skip_count: u32,
    /// Commit hashes that had at least one failing testrun in this bucket.
    /// Not deduplicated here — the Reader dedupes across the whole window.
    fail_commits: Vec<String>,
}

#[derive(Debug, Clone)]
struct RecordState {
    name: String,
    testsuite: String,
    flags: Vec<String>,
    updated_at: i64,
    duration_sum: f64,
    duration_count: u64,
    last_duration: f64,
    buckets: BTreeMap<u32, BucketState>,
}

/// Appends new test runs into a time-bucketed per-test statistics image.
#[derive(Debug)]
pub struct Writer {
    window_days: u8,
    records: BTreeMap<[u8; 16], RecordState>,
}

impl Writer {
    pub fn new(window_days: u8) -> Self {
        Self {
            window_days,
            records: BTreeMap::new(),
        }
    }

    /// Computes the stable content-hash `test_id` for an identity triple.
    pub fn test_id(identity_name: &str, testsuite: &str, flags: &[String]) -> [u8; 16] {
        let mut buf = Vec::with_capacity(identity_name.len() + testsuite.len() + 16);
        buf.extend_from_slice(identity_name.as_bytes());
        buf.push(IDENTITY_SEP);
        buf.extend_from_slice(testsuite.as_bytes());
        for flag in flags {
            buf.push(IDENTITY_SEP);
            buf.extend_from_slice(flag.as_bytes());
        }
        *Uuid::new_v5(&TEST_ID_NAMESPACE, &buf).as_bytes()
    }

    /// Ingests one upload's worth of testruns, all sharing one timestamp,
    /// commit, and flag set.
    pub fn add_testruns(
        &mut self,
        timestamp: i64,
        commit_hash: &str,
        flags: &[String],
        testruns: &[Testrun],
    ) {
        let mut flags: Vec<String> = flags.to_vec();
        flags.sort();
        flags.dedup();

        let day = timestamp.div_euclid(crate::constants::SECONDS_PER_DAY) as u32;

        for testrun in testruns {
            let identity_name = testrun.identity_name().to_string();
            let test_id = Self::test_id(&identity_name, &testrun.testsuite, &flags);

            let record = self.records.entry(test_id).or_insert_with(|| RecordState {
                name: identity_name.clone(),
                testsuite: testrun.testsuite.clone(),
                flags: flags.clone(),
                updated_at: timestamp,
                duration_sum: 0.0,
                duration_count: 0,
                last_duration: 0.0,
                buckets: BTreeMap::new(),
            });

            record.updated_at = record.updated_at.max(timestamp);
            record.duration_sum += testrun.duration;
            record.duration_count += 1;
            record.last_duration = testrun.duration;

            let bucket = record.buckets.entry(day).or_default();
            match testrun.outcome {
                crate::model::Outcome::Pass => bucket.pass_count += 1,
                crate::model::Outcome::Skip => bucket.skip_count += 1,
                crate::model::Outcome::Failure | crate::model::Outcome::Error => {
                    bucket.fail_count += 1;
                    bucket.fail_commits.push(commit_hash.to_string());
                }
            }
        }
    }

    /// Produces the binary image: header, records, commits table, strings
    /// table.
    pub fn serialize(&self) -> Vec<u8> {
        let mut strings = Vec::new();
        let mut commits = Vec::new();
        let mut records_bytes = Vec::new();

        for record in self.records.values() {
            let test_id = Self::test_id(&record.name, &record.testsuite, &record.flags);

            let name_ref = format::intern_string(&mut strings, &record.name);
            let testsuite_ref = format::intern_string(&mut strings, &record.testsuite);
            let flag_refs: Vec<u32> = record
                .flags
                .iter()
                .map(|f| format::intern_string(&mut strings, f))
                .collect();

            let avg_duration = if record.duration_count > 0 {
                record.duration_sum / record.duration_count as f64
            } else {
                0.0
            };

            records_bytes.extend_from_slice(&test_id);
            records_bytes.extend_from_slice(&name_ref.to_le_bytes());
            records_bytes.extend_from_slice(&testsuite_ref.to_le_bytes());
            records_bytes.extend_from_slice(&(flag_refs.len() as u16).to_le_bytes());
            for flag_ref in &flag_refs {
                records_bytes.extend_from_slice(&flag_ref.to_le_bytes());
            }
            records_bytes.extend_from_slice(&record.updated_at.to_le_bytes());
            records_bytes.extend_from_slice(&avg_duration.to_le_bytes());
            records_bytes.extend_from_slice(&record.last_duration.to_le_bytes());
            records_bytes.extend_from_slice(&(record.buckets.len() as u16).to_le_bytes());

            for (day_index, bucket) in &record.buckets {
                let flaky_fail_count = if bucket.pass_count > 0 { bucket.fail_count } else { 0 };
                let (fail_commits_off, fail_commits_len) = {
                    let start = commits.len() as u32;
                    for commit in &bucket.fail_commits {
                        format::append_commit(&mut commits, commit);
                    }
                    (start, commits.len() as u32 - start)
                };

                records_bytes.extend_from_slice(&day_index.to_le_bytes());
                records_bytes.extend_from_slice(&bucket.pass_count.to_le_bytes());
                records_bytes.extend_from_slice(&bucket.fail_count.to_le_bytes());
                records_bytes.extend_from_slice(&flaky_fail_count.to_le_bytes());
                records_bytes.extend_from_slice(&bucket.skip_count.to_le_bytes());
                records_bytes.extend_from_slice(&fail_commits_off.to_le_bytes());
                records_bytes.extend_from_slice(&fail_commits_len.to_le_bytes());
            }
        }

        let mut out = Vec::with_capacity(format::HEADER_LEN + records_bytes.len() + commits.len() + strings.len());
        let strings_off = (format::HEADER_LEN + records_bytes.len() + commits.len()) as u32;
        format::write_header(
            &mut out,
            &Header {
                window_days: self.window_days,
                num_records: self.records.len() as u32,
                strings_off,
            },
        );
        out.extend_from_slice(&records_bytes);
        out.extend_from_slice(&commits);
        out.extend_from_slice(&strings);
        out
    }
}
