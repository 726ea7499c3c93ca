//! Contract tests exercised against every backend.
//!
//! These validate the behavior all four backends must share:
//! - JSON document and table round trips,
//! - existence/overwrite semantics,
//! - not-found classification on missing artifacts,
//! - header subset validation and header optionality.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde_json::json;
use tempfile::TempDir;

use tabstore_core::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

// =============================================================================
// Test Helpers
// =============================================================================

/// One instance of every backend, rooted inside `tmp`.
fn all_backends(tmp: &TempDir) -> Vec<(&'static str, Box<dyn Storage>)> {
    vec![
        (
            "ipc",
            Box::new(IpcStorage::new(tmp.path().join("ipc"))) as Box<dyn Storage>,
        ),
        (
            "csv",
            Box::new(CsvStorage::new(tmp.path().join("csv"))) as Box<dyn Storage>,
        ),
        (
            "container",
            Box::new(ContainerStorage::new(tmp.path().join("store.tabstor"))) as Box<dyn Storage>,
        ),
        (
            "memory",
            Box::new(MemoryStorage::with_store(MemoryStore::new(), "contract")) as Box<dyn Storage>,
        ),
    ]
}

/// The three-row star table from the round-trip scenario: one string
/// column and two float columns carrying degrees.
fn star_table() -> Table {
    Table::new(vec![
        Column::utf8("name", ["star1", "star2", "star3"]),
        Column::float64("ra", vec![10.5, 20.3, 30.1])
            .with_unit("deg")
            .with_description("Right ascension"),
        Column::float64("dec", vec![-5.2, 15.7, -25.8])
            .with_unit("deg")
            .with_description("Declination"),
    ])
    .expect("valid table")
}

/// Header documenting only `ra` and `dec`; `name` stays undescribed.
fn star_header(table: &Table) -> TableHeader {
    let mut header = TableHeader::new();
    for col in ["ra", "dec"] {
        header.insert(col, table.column(col).unwrap().header_entry());
    }
    header
}

// =============================================================================
// JSON documents
// =============================================================================

#[test]
fn json_roundtrip_on_every_backend() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let data = json!({
            "name": "test_dataset",
            "version": "1.0",
            "metadata": {"created_by": "test", "items": [1, 2, 3, 4, 5]},
        });

        storage.write_json(&data, "test_config", false)?;
        let read = storage.read_json("test_config")?;

        assert_eq!(read, data, "backend {label}");
        assert_eq!(read["metadata"]["items"], json!([1, 2, 3, 4, 5]), "backend {label}");
    }
    Ok(())
}

#[test]
fn json_double_write_requires_overwrite() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let initial = json!({"value": "first"});
        storage.write_json(&initial, "duplicate_name", false)?;

        let err = storage
            .write_json(&json!({"value": "second"}), "duplicate_name", false)
            .expect_err("expected AlreadyExists");
        assert!(
            matches!(err, StorageError::AlreadyExists { .. }),
            "backend {label}: {err:?}"
        );
        let message = err.to_string();
        assert!(message.contains("already exists"), "backend {label}: {message}");
        assert!(message.contains("duplicate_name"), "backend {label}: {message}");

        // Original data survived the refused write.
        assert_eq!(storage.read_json("duplicate_name")?, initial, "backend {label}");
    }
    Ok(())
}

#[test]
fn json_overwrite_replaces_document() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        storage.write_json(&json!({"value": "first"}), "override_test", false)?;
        let new_data = json!({"value": "second", "extra": "field"});
        storage.write_json(&new_data, "override_test", true)?;

        assert_eq!(storage.read_json("override_test")?, new_data, "backend {label}");
    }
    Ok(())
}

#[test]
fn missing_artifacts_fail_with_not_found() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let err = storage.read_json("nope").expect_err("expected NotFound");
        assert!(
            matches!(err, StorageError::NotFound { .. }),
            "backend {label}: {err:?}"
        );
        assert!(err.to_string().contains("does not exist"), "backend {label}");
        assert!(err.to_string().contains("nope"), "backend {label}");

        let err = storage.read_table("nope").expect_err("expected NotFound");
        assert!(
            matches!(err, StorageError::NotFound { .. }),
            "backend {label}: {err:?}"
        );
    }
    Ok(())
}

// =============================================================================
// Tables
// =============================================================================

#[test]
fn star_table_roundtrip_reattaches_units() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let table = star_table();
        let header = star_header(&table);

        storage.write_table(&table, &header, "test_stars", false)?;
        let back = storage.read_table("test_stars")?;

        assert_eq!(back, table, "backend {label}");
        assert_eq!(back.column("ra").unwrap().unit(), Some("deg"), "backend {label}");
        assert_eq!(back.column("dec").unwrap().unit(), Some("deg"), "backend {label}");
        assert_eq!(
            back.column("ra").unwrap().description(),
            Some("Right ascension"),
            "backend {label}"
        );

        let read_header = storage.read_table_header("test_stars")?.expect("header stored");
        assert_eq!(read_header, header, "backend {label}");
    }
    Ok(())
}

#[test]
fn table_double_write_requires_overwrite() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let table = star_table();
        let header = star_header(&table);

        storage.write_table(&table, &header, "duplicate_table", false)?;
        let err = storage
            .write_table(&table, &header, "duplicate_table", false)
            .expect_err("expected AlreadyExists");

        assert!(
            matches!(err, StorageError::AlreadyExists { .. }),
            "backend {label}: {err:?}"
        );
        assert!(err.to_string().contains("already exists"), "backend {label}");
    }
    Ok(())
}

#[test]
fn table_overwrite_fully_replaces_previous_contents() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let initial = Table::new(vec![
            Column::int64("a", vec![1, 2, 3]),
            Column::int64("b", vec![4, 5, 6]),
        ])?;
        storage.write_table(&initial, &TableHeader::from_table(&initial), "override_table", false)?;

        let replacement = Table::new(vec![
            Column::int64("a", vec![10, 20, 30]),
            Column::int64("c", vec![40, 50, 60]),
        ])?;
        storage.write_table(
            &replacement,
            &TableHeader::from_table(&replacement),
            "override_table",
            true,
        )?;

        let back = storage.read_table("override_table")?;
        assert!(back.column("b").is_none(), "backend {label}: old column lingered");
        assert!(back.column("c").is_some(), "backend {label}");
        assert_eq!(back, replacement, "backend {label}");
    }
    Ok(())
}

#[test]
fn empty_header_roundtrips_values_and_reads_back_as_none() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let table = Table::new(vec![
            Column::int64("a", vec![1, 2, 3]),
            Column::utf8("b", ["x", "y", "z"]),
        ])?;

        storage.write_table(&table, &TableHeader::new(), "bare", false)?;

        let back = storage.read_table("bare")?;
        assert_eq!(back, table, "backend {label}");
        assert!(
            storage.read_table_header("bare")?.is_none(),
            "backend {label}: expected no stored header"
        );
    }
    Ok(())
}

#[test]
fn header_describing_unknown_columns_is_rejected() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let table = Table::new(vec![Column::float64("ra", vec![1.0])])?;
        let mut header = TableHeader::new();
        header.insert("not_a_column", ColumnHeader::default());

        let err = storage
            .write_table(&table, &header, "mismatched", false)
            .expect_err("expected Schema error");
        assert!(
            matches!(err, StorageError::Schema { .. }),
            "backend {label}: {err:?}"
        );

        // Nothing was written.
        assert!(
            matches!(
                storage.read_table("mismatched"),
                Err(StorageError::NotFound { .. })
            ),
            "backend {label}"
        );
    }
    Ok(())
}

#[test]
fn time_columns_roundtrip_their_representation() -> TestResult {
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        let table = Table::new(vec![
            Column::utf8("target", ["a", "b"]),
            Column::time("obs_time", vec![2459000.5, 2459001.5], TimeInfo::new("jd", "tdb"))
                .with_unit("day"),
        ])?;
        let header = TableHeader::from_table(&table);

        storage.write_table(&table, &header, "observations", false)?;
        let back = storage.read_table("observations")?;

        let obs = back.column("obs_time").expect("time column");
        assert_eq!(obs.time_info(), Some(&TimeInfo::new("jd", "tdb")), "backend {label}");
        assert_eq!(obs.unit(), Some("day"), "backend {label}");
        assert_eq!(back, table, "backend {label}");
    }
    Ok(())
}

#[test]
fn masked_floats_survive_directory_and_memory_backends() -> TestResult {
    // The container backend degrades masks to NaN values; the other three
    // preserve the mask itself.
    let tmp = TempDir::new()?;
    for (label, storage) in all_backends(&tmp) {
        if label == "container" {
            continue;
        }
        let table = Table::new(vec![Column::float64_opt(
            "flux",
            vec![Some(1.5), None, Some(3.5)],
        )])?;
        storage.write_table(&table, &TableHeader::new(), "masked", false)?;

        let back = storage.read_table("masked")?;
        let flux = back.column("flux").unwrap();
        assert_eq!(flux.data().null_count(), 1, "backend {label}");
        assert!(flux.data().is_null(1), "backend {label}");
    }
    Ok(())
}

#[test]
fn root_path_reports_the_configured_location() -> TestResult {
    let tmp = TempDir::new()?;

    let ipc = IpcStorage::new(tmp.path().join("ipc"));
    assert_eq!(ipc.root_path(), tmp.path().join("ipc"));

    let container = ContainerStorage::new(tmp.path().join("store.tabstor"));
    assert_eq!(container.root_path(), tmp.path().join("store.tabstor"));

    let memory = MemoryStorage::with_store(MemoryStore::new(), "diag");
    assert_eq!(memory.root_path().to_string_lossy(), "memory://diag");
    Ok(())
}
