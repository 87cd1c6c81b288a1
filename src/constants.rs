//! Fixed numeric constants referenced by more than one module.

/// Default retention window for the Aggregate-Store, in days.
pub const DEFAULT_WINDOW_DAYS: u8 = 30;

/// Seconds in a day, used to derive day-bucket indices from unix timestamps.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Binary container magic bytes (`"TRAG"`).
pub const AGGREGATE_MAGIC: [u8; 4] = *b"TRAG";

/// Current on-disk format version.
pub const AGGREGATE_VERSION: u8 = 1;

/// Namespace used to derive the deterministic `test_id` content hash.
/// Arbitrary but fixed: changing it would change every existing `test_id`.
pub const TEST_ID_NAMESPACE: uuid::Uuid =
    uuid::Uuid::from_bytes([
        0x6f, 0x8f, 0x3c, 0x2a, 0x9b, 0x11, 0x4d, 0x8e, 0xae, 0x2f, 0x6b, 0x1a, 0xd4, 0x55, 0x9a,
        0x03,
    ]);
