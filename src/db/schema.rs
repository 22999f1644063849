//! Database schema definitions

pub const CREATE_DATAPOINTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS datapoints (
    admin0 TEXT NOT NULL DEFAULT '',
    admin1 TEXT NOT NULL DEFAULT '',
    admin2 TEXT NOT NULL DEFAULT '',
    entry_date TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    total INTEGER NOT NULL DEFAULT 0,
    deaths INTEGER NOT NULL DEFAULT 0,
    recovered INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 0,
    is_first_day INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (admin0, admin1, admin2, entry_date)
)
"#;

// For date listings and per-date map queries
pub const CREATE_INDEX_ENTRY_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_datapoints_entry_date ON datapoints(entry_date)";

// For the spread-history query
pub const CREATE_INDEX_FIRST_DAY: &str =
    "CREATE INDEX IF NOT EXISTS idx_datapoints_first_day ON datapoints(entry_date) WHERE is_first_day = 1";
