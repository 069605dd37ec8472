use std::io::Write;

use hop_core::catalog::{Catalog, CatalogError};

fn write_catalog(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write catalog");
    file
}

#[test]
fn loads_all_rows_in_source_order() {
    let file = write_catalog(
        "Numero,IP,Nombre\n\
         14021,10.0.0.5,db-primary\n\
         14022,10.0.0.6,db-replica\n\
         9,192.168.1.20,\"web, frontend\"\n",
    );

    let catalog = Catalog::load(file.path()).expect("load catalog");
    assert_eq!(catalog.len(), 3);

    let ids: Vec<&str> = catalog.iter().map(|t| t.id()).collect();
    assert_eq!(ids, ["14021", "14022", "9"]);
    assert_eq!(catalog.get(3).unwrap().label(), "web, frontend");
}

#[test]
fn english_header_aliases_are_accepted() {
    let file = write_catalog("id,address,label\n1,10.0.0.1,alpha\n");
    let catalog = Catalog::load(file.path()).expect("load catalog");
    assert_eq!(catalog.get(1).unwrap().label(), "alpha");
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Catalog::load(dir.path().join("output.csv")).unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)), "got {err:?}");
}

#[test]
fn header_only_is_empty() {
    let file = write_catalog("Numero,IP,Nombre\n");
    let err = Catalog::load(file.path()).unwrap_err();
    assert!(matches!(err, CatalogError::Empty), "got {err:?}");
}

#[test]
fn row_missing_a_field_fails_the_whole_load() {
    let file = write_catalog(
        "Numero,IP,Nombre\n\
         14021,10.0.0.5,db-primary\n\
         14022,10.0.0.6\n\
         14023,10.0.0.7,cache\n",
    );
    match Catalog::load(file.path()) {
        Err(CatalogError::MalformedRow { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected MalformedRow, got {other:?}"),
    }
}

#[test]
fn row_with_an_extra_field_fails_the_whole_load() {
    let file = write_catalog("Numero,IP,Nombre\n1,10.0.0.1,a,extra\n");
    match Catalog::load(file.path()) {
        Err(CatalogError::MalformedRow { line, reason }) => {
            assert_eq!(line, 2);
            assert!(reason.contains("expected 3 fields, found 4"), "reason: {reason}");
        }
        other => panic!("expected MalformedRow, got {other:?}"),
    }
}

#[test]
fn row_with_blank_field_is_malformed() {
    let file = write_catalog("Numero,IP,Nombre\n14021,,db-primary\n");
    match Catalog::load(file.path()) {
        Err(CatalogError::MalformedRow { line, reason }) => {
            assert_eq!(line, 2);
            assert!(reason.contains("address"), "reason: {reason}");
        }
        other => panic!("expected MalformedRow, got {other:?}"),
    }
}

#[test]
fn non_numeric_id_and_bad_address_are_malformed() {
    let file = write_catalog("Numero,IP,Nombre\nabc,10.0.0.5,x\n");
    assert!(matches!(
        Catalog::load(file.path()),
        Err(CatalogError::MalformedRow { .. })
    ));

    let file = write_catalog("Numero,IP,Nombre\n1,10.0.0.999,x\n");
    assert!(matches!(
        Catalog::load(file.path()),
        Err(CatalogError::MalformedRow { .. })
    ));
}

#[test]
fn wrong_header_is_rejected() {
    let file = write_catalog("host,port,name\n1,22,x\n");
    let err = Catalog::load(file.path()).unwrap_err();
    assert!(matches!(err, CatalogError::Header(_)), "got {err:?}");
}
