//! Database schema definitions
//!
//! Four tables back the derived index: the page rows (with their outbound
//! link sets), the per-URL inbound records, and the per-domain aggregates.
//! `UriInfo` and `DomainStats` rows exist only while their counts are
//! positive; zero-valued rows are deleted, never stored.

/// SQL schema for the index database
pub const SCHEMA_SQL: &str = r#"
-- One row per present page
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    outcount INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_domain ON pages(domain);

-- Outbound edges; at most one edge per (page, target)
CREATE TABLE IF NOT EXISTS page_links (
    page_url TEXT NOT NULL,
    target_url TEXT NOT NULL,
    anchor TEXT NOT NULL,
    PRIMARY KEY (page_url, target_url)
);

CREATE INDEX IF NOT EXISTS idx_page_links_target ON page_links(target_url);

-- Derived per-URL inbound counts (URIInfo)
CREATE TABLE IF NOT EXISTS uri_info (
    url TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    inbound_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_uri_info_domain ON uri_info(domain);

-- Derived per-domain aggregates (DomainStats)
CREATE TABLE IF NOT EXISTS domain_stats (
    domain TEXT PRIMARY KEY,
    inbound_count INTEGER NOT NULL
);
"#;

/// Initializes the database schema. Safe to call on an already-initialized
/// database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
