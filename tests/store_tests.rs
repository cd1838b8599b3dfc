use billmatch::{BatchId, InvoiceStore, LineItem, Vendor};
use chrono::NaiveDate;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, 25).unwrap()
}

fn store() -> InvoiceStore {
    init_logging();
    InvoiceStore::open_in_memory().unwrap()
}

/// Route log output through the test harness so fallback warnings from the
/// reconciler show up in failing-test output (`RUST_LOG=billmatch=debug`).
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// --- Batch assignment ---

#[test]
fn assign_batch_persists_and_returns_rows() {
    let mut store = store();
    let batch = BatchId::new("20241125_090000");
    let items = vec![
        LineItem::new("Dothan", "1003.00"),
        LineItem::new("Conyers", "250.00"),
    ];

    let records = store
        .assign_batch(&items, &Vendor::MatrixMedia, &batch, date(), None)
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.id.is_some()));
    assert_eq!(records[0].market, "Conyers");
    assert_eq!(records[0].invoice_no, "112524-M");
    assert_eq!(records[1].market, "Dothan");
    assert_eq!(records[1].invoice_no, "112525-M");

    let fetched = store.records_for_batch(&batch).unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].invoice_no, "112524-M");
    assert_eq!(fetched[0].date, "2024-11-25");
}

#[test]
fn sequence_continues_across_batches_and_vendors() {
    let mut store = store();

    let first = store
        .assign_batch(
            &[LineItem::new("Dothan", "100.00")],
            &Vendor::MatrixMedia,
            &BatchId::new("20241125_090000"),
            date(),
            None,
        )
        .unwrap();
    assert_eq!(first[0].invoice_no, "112524-M");

    // The numeric stream is global; only the suffix is per vendor family.
    let second = store
        .assign_batch(
            &[LineItem::new("Auburn", "200.00")],
            &Vendor::Rsh,
            &BatchId::new("20241125_091000"),
            date(),
            None,
        )
        .unwrap();
    assert_eq!(second[0].invoice_no, "112525-P");

    assert_eq!(store.last_invoice_no().unwrap().as_deref(), Some("112525-P"));
}

#[test]
fn continuity_number_found_across_assign_calls_in_one_batch() {
    let mut store = store();
    let batch = BatchId::new("20241125_090000");

    let first = store
        .assign_batch(
            &[LineItem::new("Ft Payne", "500.00")],
            &Vendor::MatrixMedia,
            &batch,
            date(),
            None,
        )
        .unwrap();
    let fort_payne_no = first[0].invoice_no.clone();
    assert_eq!(first[0].market, "Fort Payne");

    // A later insert pass for the same batch (the original processed PDFs
    // one file at a time) must reuse the established number.
    let second = store
        .assign_batch(
            &[
                LineItem::new("FORT PAYNE", "700.00"),
                LineItem::new("Dothan", "1003.00"),
            ],
            &Vendor::MatrixMedia,
            &batch,
            date(),
            None,
        )
        .unwrap();

    let fp: Vec<_> = second.iter().filter(|r| r.market == "Fort Payne").collect();
    assert_eq!(fp.len(), 1);
    assert_eq!(fp[0].invoice_no, fort_payne_no);

    let dothan: Vec<_> = second.iter().filter(|r| r.market == "Dothan").collect();
    assert_ne!(dothan[0].invoice_no, fort_payne_no);
}

#[test]
fn continuity_is_scoped_to_vendor_and_batch() {
    let mut store = store();
    let batch_a = BatchId::new("20241125_090000");
    let batch_b = BatchId::new("20241126_090000");

    let a = store
        .assign_batch(
            &[LineItem::new("Fort Payne", "500.00")],
            &Vendor::MatrixMedia,
            &batch_a,
            date(),
            None,
        )
        .unwrap();

    // A different batch starts a fresh Fort Payne number.
    let b = store
        .assign_batch(
            &[LineItem::new("Fort Payne", "500.00")],
            &Vendor::MatrixMedia,
            &batch_b,
            date(),
            None,
        )
        .unwrap();

    assert_ne!(a[0].invoice_no, b[0].invoice_no);
}

#[test]
fn docx_path_is_stamped_onto_every_row() {
    let mut store = store();
    let records = store
        .assign_batch(
            &[LineItem::new("Troy", "90.00")],
            &Vendor::MatrixMedia,
            &BatchId::new("20241125_090000"),
            date(),
            Some("output/invoice_lawler.docx"),
        )
        .unwrap();
    assert_eq!(
        records[0].docx_path.as_deref(),
        Some("output/invoice_lawler.docx")
    );
}

// --- Queries ---

#[test]
fn batches_for_invoice_nos_groups_by_number() {
    let mut store = store();
    let batch = BatchId::new("20241125_090000");
    store
        .assign_batch(
            &[
                LineItem::new("Dothan", "100.00"),
                LineItem::new("Troy", "200.00"),
            ],
            &Vendor::MatrixMedia,
            &batch,
            date(),
            None,
        )
        .unwrap();

    let found = store
        .batches_for_invoice_nos(&["112524-M", "112525-M", "999999-M"])
        .unwrap();
    assert_eq!(
        found,
        vec![
            ("112524-M".to_string(), "20241125_090000".to_string()),
            ("112525-M".to_string(), "20241125_090000".to_string()),
        ]
    );

    assert!(store.batches_for_invoice_nos(&[]).unwrap().is_empty());
}

#[test]
fn recent_batch_records_filters_by_embedded_timestamp() {
    let mut store = store();
    store
        .assign_batch(
            &[LineItem::new("Old Town", "10.00")],
            &Vendor::FeeInvoice,
            &BatchId::new("20200101_000000"),
            date(),
            None,
        )
        .unwrap();
    store
        .assign_batch(
            &[LineItem::new("New Town", "20.00")],
            &Vendor::FeeInvoice,
            &BatchId::new("20241125_120000"),
            date(),
            None,
        )
        .unwrap();

    let cutoff = NaiveDate::from_ymd_opt(2024, 11, 25)
        .unwrap()
        .and_hms_opt(11, 58, 0)
        .unwrap();
    let recent = store.recent_batch_records(cutoff).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].market, "New Town");
}

#[test]
fn records_for_vendor_batch_keeps_insertion_order() {
    let mut store = store();
    let batch = BatchId::new("20241125_090000");
    store
        .assign_batch(
            &[
                LineItem::new("Troy", "10.00"),
                LineItem::new("Conyers", "20.00"),
                LineItem::new("Dothan", "30.00"),
            ],
            &Vendor::SmartPost,
            &batch,
            date(),
            None,
        )
        .unwrap();

    let records = store
        .records_for_vendor_batch(&Vendor::SmartPost, &batch)
        .unwrap();
    let markets: Vec<_> = records.iter().map(|r| r.market.as_str()).collect();
    // Insertion order is the reconciler's sort order.
    assert_eq!(markets, ["Conyers", "Dothan", "Troy"]);
    assert!(records.iter().all(|r| r.invoice_no.ends_with("-P")));
}
