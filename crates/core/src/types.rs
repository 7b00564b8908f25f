/// Widget identifiers are opaque strings (UUID v4 when created locally).
pub type WidgetId = String;

/// All runtime timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Creation timestamps are persisted as epoch milliseconds.
pub type EpochMillis = i64;
