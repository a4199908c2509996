//! DuckDB schema definitions
//!
//! One append-only fact table of placement trace events, joined to two
//! dimension tables. This crate only reads these tables; the DDL exists to
//! create an empty database (`tracequery system init`) and for tests.

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- ═══════════════════════════════════════════════════════════════════════════════
-- TRACE_LOG: one row per component placement event (fact table, append-only)
-- ═══════════════════════════════════════════════════════════════════════════════
CREATE TABLE IF NOT EXISTS TRACE_LOG (
    "TIMESTAMP"         TIMESTAMP NOT NULL, -- Placement time
    KITID               VARCHAR(30),        -- Work order
    PCBID               VARCHAR,            -- Board serial
    RID                 VARCHAR,            -- Reel placed from
    TRACE_STATION       VARCHAR,            -- SMT station
    FCODE               VARCHAR,            -- Feeder id
    LOC                 VARCHAR,            -- Machine slot
    MPROG               VARCHAR             -- Placement program
);

-- ═══════════════════════════════════════════════════════════════════════════════
-- REEL: reel identity and part provenance (dimension)
-- ═══════════════════════════════════════════════════════════════════════════════
CREATE TABLE IF NOT EXISTS REEL (
    RID                 VARCHAR NOT NULL,
    SPN                 VARCHAR,            -- Internal part key
    LOT                 VARCHAR,
    DATECODE            VARCHAR,
    SUPPLIER            VARCHAR
);

-- ═══════════════════════════════════════════════════════════════════════════════
-- PN: part numbers (dimension)
-- ═══════════════════════════════════════════════════════════════════════════════
CREATE TABLE IF NOT EXISTS PN (
    SPN                 VARCHAR NOT NULL,
    PN                  VARCHAR             -- Business key, may be blank
);

CREATE INDEX IF NOT EXISTS idx_trace_log_timestamp ON TRACE_LOG ("TIMESTAMP");
CREATE INDEX IF NOT EXISTS idx_trace_log_rid ON TRACE_LOG (RID);
"#;
