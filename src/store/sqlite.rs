//! SQLite-backed index store
//!
//! The store treats SQLite as the transactional substrate: every page
//! mutation runs inside one [`IndexTx`] so the page row, the link-set diff,
//! and every derived-record delta commit together or not at all. Busy/locked
//! failures surface as [`StoreError::Conflict`] and are retried by the
//! caller; the store itself never retries.

use crate::model::{Link, Page};
use crate::store::schema::initialize_schema;
use crate::store::traits::{IndexStore, StoreError, StoreResult};
use crate::store::{
    DomainStats, IndexEntry, UriInfo, COL_DOMAIN_INCOUNT, COL_IN, COL_OUT, COL_PAGE_OUTCOUNT,
    COL_STAT_INCOUNT, ROW_DOMAIN, ROW_PAGE,
};
use crate::url::domain_of;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

/// Maps substrate failures into store errors, distinguishing retryable
/// write conflicts from everything else.
fn map_sql(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            StoreError::Conflict(err.to_string())
        }
        _ => StoreError::Database(err),
    }
}

/// SQLite index store
pub struct SqliteIndexStore {
    conn: Connection,
}

impl SqliteIndexStore {
    /// Opens (or creates) an index database at the given path.
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(map_sql)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(map_sql)?;
        initialize_schema(&conn).map_err(map_sql)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory index database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sql)?;
        initialize_schema(&conn).map_err(map_sql)?;
        Ok(Self { conn })
    }

    /// Begins a transaction. All mutation-path operations go through the
    /// returned handle; dropping it without [`IndexTx::commit`] rolls back.
    pub fn begin(&mut self) -> StoreResult<IndexTx<'_>> {
        let tx = self.conn.transaction().map_err(map_sql)?;
        Ok(IndexTx { tx })
    }
}

impl IndexStore for SqliteIndexStore {
    fn scan_all(&self) -> StoreResult<Vec<IndexEntry>> {
        let mut entries: Vec<IndexEntry> = Vec::new();

        let mut stmt = self
            .conn
            .prepare("SELECT url, outcount FROM pages")
            .map_err(map_sql)?;
        let pages = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(map_sql)?;
        for page in pages {
            let (url, outcount) = page.map_err(map_sql)?;
            entries.push(IndexEntry::page_outcount(&url, outcount as usize));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT page_url, target_url, anchor FROM page_links")
            .map_err(map_sql)?;
        let links = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(map_sql)?;
        for link in links {
            let (page, target, anchor) = link.map_err(map_sql)?;
            entries.push(IndexEntry::outbound(&page, &target, &anchor));
            entries.push(IndexEntry::inbound(&target, &page, &anchor));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT url, inbound_count FROM uri_info")
            .map_err(map_sql)?;
        let infos = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(map_sql)?;
        for info in infos {
            let (url, count) = info.map_err(map_sql)?;
            entries.push(IndexEntry::uri_incount(&url, count));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT domain, inbound_count FROM domain_stats")
            .map_err(map_sql)?;
        let stats = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(map_sql)?;
        for stat in stats {
            let (domain, count) = stat.map_err(map_sql)?;
            entries.push(IndexEntry::domain_incount(&domain, count));
        }

        entries.sort();
        Ok(entries)
    }

    fn bulk_load(&mut self, entries: &[IndexEntry]) -> StoreResult<()> {
        let rows = self.row_count()?;
        if rows > 0 {
            return Err(StoreError::NotEmpty(rows));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().map_err(map_sql)?;

        // in: entries are the inbound view of edges stored via out:; they are
        // collected here and checked after every edge row is in place
        let mut inbound_edges: Vec<(&str, &str, &str)> = Vec::new();
        for entry in entries {
            if let (Some(target), Some(source)) = (
                entry.row.strip_prefix(ROW_PAGE),
                entry.column.strip_prefix(COL_IN),
            ) {
                inbound_edges.push((source, target, entry.value.as_str()));
                continue;
            }
            load_entry(&tx, entry, &now)?;
        }
        for (source, target, anchor) in inbound_edges {
            let stored: Option<String> = tx
                .query_row(
                    "SELECT anchor FROM page_links WHERE page_url = ?1 AND target_url = ?2",
                    params![source, target],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql)?;
            match stored {
                Some(a) if a == anchor => {}
                Some(_) => {
                    return Err(StoreError::Corrupt(format!(
                        "inbound anchor for {} -> {} disagrees with its outbound edge",
                        source, target
                    )))
                }
                None => {
                    return Err(StoreError::Corrupt(format!(
                        "inbound edge {} -> {} has no outbound counterpart",
                        source, target
                    )))
                }
            }
        }

        tx.commit().map_err(map_sql)?;
        tracing::info!("Bulk-loaded {} index entries", entries.len());
        Ok(())
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.row_count()? == 0)
    }
}

impl SqliteIndexStore {
    fn row_count(&self) -> StoreResult<u64> {
        self.conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM pages)
                      + (SELECT COUNT(*) FROM page_links)
                      + (SELECT COUNT(*) FROM uri_info)
                      + (SELECT COUNT(*) FROM domain_stats)",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
            .map_err(map_sql)
    }
}

/// Applies one snapshot entry during bulk load. `in:` entries never reach
/// this function; `bulk_load` checks them against the stored edges instead
/// of storing them twice.
fn load_entry(tx: &Transaction<'_>, entry: &IndexEntry, now: &str) -> StoreResult<()> {
    if let Some(url) = entry.row.strip_prefix(ROW_PAGE) {
        if entry.column == COL_PAGE_OUTCOUNT {
            let count = parse_count(entry)?;
            let domain = domain_of(url)
                .map_err(|e| StoreError::Corrupt(format!("bad page URL {}: {}", url, e)))?;
            tx.execute(
                "INSERT INTO pages (url, domain, outcount, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![url, domain, count, now],
            )
            .map_err(map_sql)?;
        } else if entry.column == COL_STAT_INCOUNT {
            let count = parse_count(entry)?;
            let domain = domain_of(url)
                .map_err(|e| StoreError::Corrupt(format!("bad target URL {}: {}", url, e)))?;
            tx.execute(
                "INSERT INTO uri_info (url, domain, inbound_count) VALUES (?1, ?2, ?3)",
                params![url, domain, count],
            )
            .map_err(map_sql)?;
        } else if let Some(target) = entry.column.strip_prefix(COL_OUT) {
            tx.execute(
                "INSERT INTO page_links (page_url, target_url, anchor) VALUES (?1, ?2, ?3)",
                params![url, target, entry.value],
            )
            .map_err(map_sql)?;
        } else {
            return Err(StoreError::Corrupt(format!(
                "unknown column {} in row {}",
                entry.column, entry.row
            )));
        }
    } else if let Some(domain) = entry.row.strip_prefix(ROW_DOMAIN) {
        if entry.column != COL_DOMAIN_INCOUNT {
            return Err(StoreError::Corrupt(format!(
                "unknown column {} in row {}",
                entry.column, entry.row
            )));
        }
        let count = parse_count(entry)?;
        tx.execute(
            "INSERT INTO domain_stats (domain, inbound_count) VALUES (?1, ?2)",
            params![domain, count],
        )
        .map_err(map_sql)?;
    } else {
        return Err(StoreError::Corrupt(format!("unknown row {}", entry.row)));
    }
    Ok(())
}

fn parse_count(entry: &IndexEntry) -> StoreResult<i64> {
    entry.value.parse().map_err(|_| {
        StoreError::Corrupt(format!(
            "non-numeric count '{}' at {} / {}",
            entry.value, entry.row, entry.column
        ))
    })
}

/// One transaction against the index store.
///
/// Exposes the derived-index operations the mutation applier and delta
/// propagator need. The handle commits explicitly; dropping it rolls the
/// whole transaction back, so a failed mutation leaves no partial state.
pub struct IndexTx<'a> {
    tx: Transaction<'a>,
}

impl IndexTx<'_> {
    /// Returns the stored outbound link set for a page, or `None` if the
    /// page is absent. Links come back ordered by target URL.
    pub fn stored_links(&self, url: &str) -> StoreResult<Option<Vec<Link>>> {
        let present: Option<i64> = self
            .tx
            .query_row("SELECT outcount FROM pages WHERE url = ?1", [url], |row| {
                row.get(0)
            })
            .optional()
            .map_err(map_sql)?;

        if present.is_none() {
            return Ok(None);
        }

        let mut stmt = self
            .tx
            .prepare(
                "SELECT target_url, anchor FROM page_links
                 WHERE page_url = ?1 ORDER BY target_url",
            )
            .map_err(map_sql)?;
        let rows = stmt
            .query_map([url], |row| {
                Ok(Link::from_stored(row.get(0)?, row.get(1)?))
            })
            .map_err(map_sql)?;

        let mut links = Vec::new();
        for link in rows {
            links.push(link.map_err(map_sql)?);
        }
        Ok(Some(links))
    }

    /// Writes a page's row and replaces its stored outbound link set.
    pub fn upsert_page_row(&self, page: &Page) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        self.tx
            .execute(
                "INSERT INTO pages (url, domain, outcount, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(url) DO UPDATE SET
                     domain = excluded.domain,
                     outcount = excluded.outcount,
                     updated_at = excluded.updated_at",
                params![page.url(), page.domain(), page.outbound().len() as i64, now],
            )
            .map_err(map_sql)?;

        self.tx
            .execute("DELETE FROM page_links WHERE page_url = ?1", [page.url()])
            .map_err(map_sql)?;
        for link in page.outbound() {
            self.tx
                .execute(
                    "INSERT INTO page_links (page_url, target_url, anchor) VALUES (?1, ?2, ?3)",
                    params![page.url(), link.target(), link.anchor()],
                )
                .map_err(map_sql)?;
        }
        Ok(())
    }

    /// Removes a page's row and its stored outbound link set.
    pub fn remove_page_row(&self, url: &str) -> StoreResult<()> {
        self.tx
            .execute("DELETE FROM page_links WHERE page_url = ?1", [url])
            .map_err(map_sql)?;
        self.tx
            .execute("DELETE FROM pages WHERE url = ?1", [url])
            .map_err(map_sql)?;
        Ok(())
    }

    pub fn get_uri_info(&self, url: &str) -> StoreResult<Option<UriInfo>> {
        self.tx
            .query_row(
                "SELECT url, domain, inbound_count FROM uri_info WHERE url = ?1",
                [url],
                |row| {
                    Ok(UriInfo {
                        url: row.get(0)?,
                        domain: row.get(1)?,
                        inbound_count: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(map_sql)
    }

    pub fn upsert_uri_info(&self, info: &UriInfo) -> StoreResult<()> {
        self.tx
            .execute(
                "INSERT INTO uri_info (url, domain, inbound_count) VALUES (?1, ?2, ?3)
                 ON CONFLICT(url) DO UPDATE SET
                     domain = excluded.domain,
                     inbound_count = excluded.inbound_count",
                params![info.url, info.domain, info.inbound_count],
            )
            .map_err(map_sql)?;
        Ok(())
    }

    pub fn remove_uri_info(&self, url: &str) -> StoreResult<()> {
        self.tx
            .execute("DELETE FROM uri_info WHERE url = ?1", [url])
            .map_err(map_sql)?;
        Ok(())
    }

    pub fn get_domain_stats(&self, domain: &str) -> StoreResult<Option<DomainStats>> {
        self.tx
            .query_row(
                "SELECT domain, inbound_count FROM domain_stats WHERE domain = ?1",
                [domain],
                |row| {
                    Ok(DomainStats {
                        domain: row.get(0)?,
                        inbound_count: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(map_sql)
    }

    pub fn upsert_domain_stats(&self, stats: &DomainStats) -> StoreResult<()> {
        self.tx
            .execute(
                "INSERT INTO domain_stats (domain, inbound_count) VALUES (?1, ?2)
                 ON CONFLICT(domain) DO UPDATE SET
                     inbound_count = excluded.inbound_count",
                params![stats.domain, stats.inbound_count],
            )
            .map_err(map_sql)?;
        Ok(())
    }

    pub fn remove_domain_stats(&self, domain: &str) -> StoreResult<()> {
        self.tx
            .execute("DELETE FROM domain_stats WHERE domain = ?1", [domain])
            .map_err(map_sql)?;
        Ok(())
    }

    /// Commits the transaction. Without this call the transaction rolls
    /// back on drop.
    pub fn commit(self) -> StoreResult<()> {
        self.tx.commit().map_err(map_sql)
    }
}
