//! Durable invoice table backed by SQLite.
//!
//! The table is append-only: rows are inserted once at batch time and
//! never updated or deleted here. The store is the only component that
//! knows the last issued invoice number; [`InvoiceStore::assign_batch`]
//! reads it, runs the reconciler, and inserts the whole batch inside one
//! transaction so overlapping runs cannot compute overlapping numbers.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::error::BillingError;
use crate::normalize::MarketVariants;
use crate::reconcile::assign_invoice_numbers;
use crate::types::{BatchId, InvoiceRecord, LineItem};
use crate::vendor::Vendor;

pub struct InvoiceStore {
    conn: Connection,
}

impl InvoiceStore {
    /// Open (creating if needed) an invoice store at the given path.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, BillingError> {
        let conn = Connection::open(db_path)?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    /// An in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, BillingError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS invoices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id TEXT NOT NULL,
                invoice_no TEXT NOT NULL,
                vendor TEXT NOT NULL,
                amount TEXT NOT NULL,
                date TEXT NOT NULL,
                market TEXT NOT NULL,
                service_period TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                docx_file_path TEXT,
                job_number TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_invoices_batch_id ON invoices(batch_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_invoices_invoice_no ON invoices(invoice_no)",
            [],
        )?;
        info!("invoice store initialized");
        Ok(())
    }

    /// Append one record, returning its row id.
    pub fn insert(&self, record: &InvoiceRecord) -> Result<i64, BillingError> {
        let id = insert_row(&self.conn, record)?;
        Ok(id)
    }

    /// The most recently inserted invoice number, by insertion order.
    pub fn last_invoice_no(&self) -> Result<Option<String>, BillingError> {
        Ok(last_invoice_no_on(&self.conn)?)
    }

    /// The invoice number already issued to the vendor's continuity
    /// market within `batch_id`, if any row exists. Matches every
    /// registered spelling of the market via `LIKE`, because rows written
    /// before normalization was applied upstream may carry variant
    /// spellings.
    pub fn continuity_invoice_no(
        &self,
        vendor: &Vendor,
        batch_id: &BatchId,
        variants: &MarketVariants,
    ) -> Result<Option<String>, BillingError> {
        Ok(continuity_invoice_no_on(
            &self.conn, vendor, batch_id, variants,
        )?)
    }

    /// All records of a batch, in insertion order.
    pub fn records_for_batch(&self, batch_id: &BatchId) -> Result<Vec<InvoiceRecord>, BillingError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, batch_id, invoice_no, vendor, amount, date, market,
                    service_period, description, docx_file_path, job_number
             FROM invoices WHERE batch_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![batch_id.as_str()], row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// One vendor's records within a batch, in insertion order.
    pub fn records_for_vendor_batch(
        &self,
        vendor: &Vendor,
        batch_id: &BatchId,
    ) -> Result<Vec<InvoiceRecord>, BillingError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, batch_id, invoice_no, vendor, amount, date, market,
                    service_period, description, docx_file_path, job_number
             FROM invoices WHERE vendor = ?1 AND batch_id = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![vendor.name(), batch_id.as_str()], row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Which batch each of the given invoice numbers belongs to.
    pub fn batches_for_invoice_nos(
        &self,
        invoice_nos: &[&str],
    ) -> Result<Vec<(String, String)>, BillingError> {
        if invoice_nos.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; invoice_nos.len()].join(",");
        let sql = format!(
            "SELECT invoice_no, batch_id FROM invoices
             WHERE invoice_no IN ({placeholders})
             GROUP BY invoice_no, batch_id
             ORDER BY invoice_no, batch_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(invoice_nos.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Records from batches whose embedded timestamp is at or after
    /// `cutoff`. Rows with malformed batch ids are skipped with a logged
    /// warning.
    pub fn recent_batch_records(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<InvoiceRecord>, BillingError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, batch_id, invoice_no, vendor, amount, date, market,
                    service_period, description, docx_file_path, job_number
             FROM invoices ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut recent = Vec::new();
        for row in rows {
            let record = row?;
            match BatchId::new(record.batch_id.clone()).timestamp() {
                Ok(ts) if ts >= cutoff => recent.push(record),
                Ok(_) => {}
                Err(_) => {
                    warn!(batch_id = %record.batch_id, "malformed batch id, row skipped");
                }
            }
        }
        Ok(recent)
    }

    /// Assign invoice numbers to a batch and persist every resulting row,
    /// using the built-in market variant registry.
    pub fn assign_batch(
        &mut self,
        items: &[LineItem],
        vendor: &Vendor,
        batch_id: &BatchId,
        date: NaiveDate,
        docx_path: Option<&str>,
    ) -> Result<Vec<InvoiceRecord>, BillingError> {
        self.assign_batch_with(
            items,
            vendor,
            batch_id,
            date,
            docx_path,
            MarketVariants::builtin(),
        )
    }

    /// [`assign_batch`](Self::assign_batch) against a custom variant
    /// registry.
    ///
    /// The read of the last invoice number, the continuity lookup, the
    /// whole-batch assignment, and all inserts happen inside a single
    /// transaction — the critical section that keeps two overlapping runs
    /// from computing overlapping invoice numbers. Store failure is the
    /// only hard failure here; per-item defects were already skipped by
    /// the reconciler.
    pub fn assign_batch_with(
        &mut self,
        items: &[LineItem],
        vendor: &Vendor,
        batch_id: &BatchId,
        date: NaiveDate,
        docx_path: Option<&str>,
        variants: &MarketVariants,
    ) -> Result<Vec<InvoiceRecord>, BillingError> {
        let tx = self.conn.transaction()?;

        let last = last_invoice_no_on(&tx)?;
        let continuity = if vendor.profile().continuity_market.is_some() {
            let found = continuity_invoice_no_on(&tx, vendor, batch_id, variants)?;
            if let Some(no) = &found {
                info!(invoice_no = %no, batch_id = %batch_id, "found existing continuity invoice");
            }
            found
        } else {
            None
        };

        let mut records = assign_invoice_numbers(
            items,
            vendor,
            batch_id,
            date,
            last.as_deref(),
            continuity.as_deref(),
            variants,
        );

        for record in &mut records {
            record.docx_path = docx_path.map(str::to_string);
            record.id = Some(insert_row(&tx, record)?);
        }
        tx.commit()?;

        info!(
            batch_id = %batch_id,
            vendor = %vendor,
            inserted = records.len(),
            "batch assigned and persisted"
        );
        Ok(records)
    }
}

fn insert_row(conn: &Connection, record: &InvoiceRecord) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO invoices
            (batch_id, invoice_no, vendor, amount, date, market,
             service_period, description, docx_file_path, job_number)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.batch_id,
            record.invoice_no,
            record.vendor,
            record.amount,
            record.date,
            record.market,
            record.service_period,
            record.description,
            record.docx_path,
            record.job_number,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn last_invoice_no_on(conn: &Connection) -> rusqlite::Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT invoice_no FROM invoices ORDER BY id DESC LIMIT 1")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn continuity_invoice_no_on(
    conn: &Connection,
    vendor: &Vendor,
    batch_id: &BatchId,
    variants: &MarketVariants,
) -> rusqlite::Result<Option<String>> {
    let Some(market) = vendor.profile().continuity_market else {
        return Ok(None);
    };
    let Some(set) = variants.set_for_canonical(market) else {
        return Ok(None);
    };

    let spellings: Vec<String> = set.spellings().map(|s| format!("%{s}%")).collect();
    let likes = vec!["market LIKE ?"; spellings.len()].join(" OR ");
    let sql = format!(
        "SELECT invoice_no FROM invoices
         WHERE ({likes}) AND vendor = ? AND batch_id = ?
         ORDER BY id LIMIT 1"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(spellings.len() + 2);
    for spelling in &spellings {
        values.push(spelling);
    }
    let vendor_name = vendor.name();
    let batch_str = batch_id.as_str();
    values.push(&vendor_name);
    values.push(&batch_str);

    let mut rows = stmt.query(&values[..])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<InvoiceRecord> {
    Ok(InvoiceRecord {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        invoice_no: row.get(2)?,
        vendor: row.get(3)?,
        amount: row.get(4)?,
        date: row.get(5)?,
        market: row.get(6)?,
        service_period: row.get(7)?,
        description: row.get(8)?,
        docx_path: row.get(9)?,
        job_number: row.get(10)?,
    })
}
