//! SQLite schema for classification decisions.

/// One row per classified run. `seq` orders writes so signature lookups can pick the
/// latest decision.
pub const CLASSIFICATION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS classifications (
    run_id         TEXT PRIMARY KEY,
    test_name      TEXT NOT NULL,
    signature      TEXT,
    category       TEXT NOT NULL,
    source         TEXT NOT NULL,
    details_json   TEXT NOT NULL,
    classified_at  TEXT NOT NULL,
    seq            INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_classifications_signature
    ON classifications(signature, seq);
"#;
