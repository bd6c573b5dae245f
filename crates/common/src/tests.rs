use super::*;
use proptest::prelude::*;
use std::io;
use types::{DataType, Value};

fn sample_schema() -> Schema {
    Schema::new(
        vec![
            Attribute::new("id", DataType::Int),
            Attribute::new("name", DataType::Text(8)),
            Attribute::new("score", DataType::Float),
            Attribute::new("active", DataType::Bool),
        ],
        vec![0],
    )
}

#[test]
fn config_defaults_are_sane() {
    let cfg = DbConfig::default();
    assert_eq!(cfg.page_file, std::path::PathBuf::from("DATA.bin"));
    assert_eq!(cfg.pool_frames, 16);
    assert_eq!(cfg.strategy, ReplacementStrategy::Lru);
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::ReadNonExistingPage(7);
    assert!(format!("{err}").contains('7'));
    let err = DbError::TableNotFound("users".into());
    assert!(format!("{err}").contains("users"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}

#[test]
fn record_size_sums_attribute_widths() {
    let schema = sample_schema();
    // 4 + (8 + 1) + 4 + 1
    assert_eq!(schema.record_size(), 18);
    assert_eq!(schema.attr_offset(0), 0);
    assert_eq!(schema.attr_offset(1), 4);
    assert_eq!(schema.attr_offset(2), 13);
    assert_eq!(schema.attr_offset(3), 17);
}

#[test]
fn set_then_get_round_trips() {
    let schema = sample_schema();
    let mut record = Record::new(&schema);
    record.set_attr(&schema, 0, &Value::Int(-42)).unwrap();
    record
        .set_attr(&schema, 1, &Value::Text("Ada".into()))
        .unwrap();
    record.set_attr(&schema, 2, &Value::Float(2.5)).unwrap();
    record.set_attr(&schema, 3, &Value::Bool(true)).unwrap();

    assert_eq!(record.get_attr(&schema, 0).unwrap(), Value::Int(-42));
    assert_eq!(
        record.get_attr(&schema, 1).unwrap(),
        Value::Text("Ada".into())
    );
    assert_eq!(record.get_attr(&schema, 2).unwrap(), Value::Float(2.5));
    assert_eq!(record.get_attr(&schema, 3).unwrap(), Value::Bool(true));
}

#[test]
fn long_text_is_truncated_with_terminator() {
    let schema = sample_schema();
    let mut record = Record::new(&schema);
    record
        .set_attr(&schema, 1, &Value::Text("abcdefghij".into()))
        .unwrap();
    // Capacity is 8 characters; the ninth byte stays NUL.
    assert_eq!(
        record.get_attr(&schema, 1).unwrap(),
        Value::Text("abcdefgh".into())
    );
}

#[test]
fn shorter_text_overwrite_leaves_no_residue() {
    let schema = sample_schema();
    let mut record = Record::new(&schema);
    record
        .set_attr(&schema, 1, &Value::Text("longname".into()))
        .unwrap();
    record
        .set_attr(&schema, 1, &Value::Text("ab".into()))
        .unwrap();
    assert_eq!(
        record.get_attr(&schema, 1).unwrap(),
        Value::Text("ab".into())
    );
}

#[test]
fn out_of_range_attribute_is_rejected() {
    let schema = sample_schema();
    let mut record = Record::new(&schema);
    assert!(matches!(
        record.set_attr(&schema, 4, &Value::Int(0)),
        Err(DbError::WriteFailed(_))
    ));
    assert!(matches!(
        record.get_attr(&schema, 9),
        Err(DbError::WriteFailed(_))
    ));
}

#[test]
fn type_mismatch_is_rejected() {
    let schema = sample_schema();
    let mut record = Record::new(&schema);
    assert!(matches!(
        record.set_attr(&schema, 0, &Value::Text("1".into())),
        Err(DbError::WriteFailed(_))
    ));
}

proptest! {
    // Any value written through set_attr reads back identically (text within
    // capacity and free of interior NULs).
    #[test]
    fn attr_round_trip(id in any::<i32>(), name in "[a-zA-Z0-9]{0,8}", score in -1.0e6f32..1.0e6f32, active in any::<bool>()) {
        let schema = sample_schema();
        let mut record = Record::new(&schema);
        record.set_attr(&schema, 0, &Value::Int(id)).unwrap();
        record.set_attr(&schema, 1, &Value::Text(name.clone())).unwrap();
        record.set_attr(&schema, 2, &Value::Float(score)).unwrap();
        record.set_attr(&schema, 3, &Value::Bool(active)).unwrap();

        prop_assert_eq!(record.get_attr(&schema, 0).unwrap(), Value::Int(id));
        prop_assert_eq!(record.get_attr(&schema, 1).unwrap(), Value::Text(name));
        prop_assert_eq!(record.get_attr(&schema, 2).unwrap(), Value::Float(score));
        prop_assert_eq!(record.get_attr(&schema, 3).unwrap(), Value::Bool(active));
    }
}
