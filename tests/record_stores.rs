use records_server::store::{
    Database, InventoryStore, ItemSearchScope, NewItem, NewProfile, ProfileStore,
};
use records_server::validation::{Field, FormInput};
use records_server::{StoreError, Validator};

fn stores() -> (InventoryStore, ProfileStore) {
    let db = Database::open_in_memory().unwrap();
    let validator = Validator::default();
    (
        InventoryStore::new(db.clone(), validator),
        ProfileStore::new(db, validator),
    )
}

fn item(code: &str, name: &str, quantity: i64, price: f64) -> NewItem {
    NewItem {
        code: code.to_string(),
        name: name.to_string(),
        quantity,
        price,
        category: "Bahan".to_string(),
        notes: None,
    }
}

fn budi_form() -> FormInput {
    FormInput::new()
        .with("name", "Budi")
        .with("email", "budi@mail.com")
        .with("age", "25")
        .with("phone", "+62 812 3456 7890")
        .with("address", "Jl. A")
        .with("gender", "Male")
        .with("education", "Diploma")
}

#[test]
fn age_boundaries() {
    let validator = Validator::default();
    assert!(validator.validate(Field::Age, "9").is_err());
    assert!(validator.validate(Field::Age, "10").is_ok());
    assert!(validator.validate(Field::Age, "100").is_ok());
    assert!(validator.validate(Field::Age, "101").is_err());
}

#[test]
fn budi_registers_once() {
    let (_, profiles) = stores();
    let validator = Validator::default();

    let profile = NewProfile::from_form(&budi_form(), &validator).unwrap();
    let saved = profiles.insert(profile.clone()).unwrap();
    assert_eq!(saved.email, "budi@mail.com");

    let err = profiles.insert(profile).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert_eq!(profiles.fetch_all().unwrap().len(), 1);
}

#[test]
fn duplicate_item_leaves_original_untouched() {
    let (inventory, _) = stores();
    inventory.insert(item("A-1", "Kabel", 3, 1500.0)).unwrap();

    let err = inventory.insert(item("A-1", "Lampu", 9, 1.0)).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    let kept = inventory.get("A-1").unwrap().unwrap();
    assert_eq!(kept.name, "Kabel");
    assert_eq!(kept.quantity, 3);
}

#[test]
fn missing_keys_are_not_found() {
    let (inventory, profiles) = stores();
    inventory.insert(item("A-1", "Kabel", 3, 1500.0)).unwrap();

    assert!(matches!(
        inventory.update("Z-9", item("Z-9", "Lampu", 1, 1.0)),
        Err(StoreError::NotFound { .. })
    ));
    assert_eq!(inventory.fetch_all().unwrap().len(), 1);

    inventory.delete("A-1").unwrap();
    assert!(inventory.get("A-1").unwrap().is_none());
    assert!(matches!(
        inventory.delete("A-1"),
        Err(StoreError::NotFound { .. })
    ));

    assert!(matches!(profiles.delete(42), Err(StoreError::NotFound { .. })));
}

#[test]
fn aggregate_sums_current_items() {
    let (inventory, _) = stores();
    let empty = inventory.aggregate().unwrap();
    assert_eq!(empty.total_items, 0);
    assert_eq!(empty.total_quantity, 0);
    assert_eq!(empty.total_value, 0.0);

    inventory.insert(item("A-1", "Kabel", 2, 10.0)).unwrap();
    inventory.insert(item("A-2", "Lampu", 3, 20.0)).unwrap();
    let summary = inventory.aggregate().unwrap();
    assert_eq!(summary.total_items, 2);
    assert_eq!(summary.total_quantity, 5);
    assert_eq!(summary.total_value, 80.0);
}

#[test]
fn code_search_finds_pen() {
    let (inventory, _) = stores();
    let mut pen = item("QC-001", "Pen", 10, 5000.0);
    pen.category = "Alat Kantor".to_string();
    inventory.insert(pen).unwrap();
    inventory.insert(item("AB-002", "Kertas QC", 1, 100.0)).unwrap();

    let found = inventory.search("QC", ItemSearchScope::Code).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, "QC-001");
}

#[test]
fn export_then_import_keeps_records() {
    let (inventory, profiles) = stores();
    inventory.insert(item("A-1", "Kabel", 2, 10.0)).unwrap();
    inventory.insert(item("A-2", "Lampu", 3, 20.5)).unwrap();
    profiles
        .insert(NewProfile::from_form(&budi_form(), &Validator::default()).unwrap())
        .unwrap();

    let items_before = inventory.fetch_all().unwrap();
    let users_before = profiles.fetch_all().unwrap();

    assert_eq!(inventory.import_csv(&inventory.export_csv().unwrap()).unwrap(), 2);
    assert_eq!(profiles.import_csv(&profiles.export_csv().unwrap()).unwrap(), 1);

    assert_eq!(inventory.fetch_all().unwrap(), items_before);
    assert_eq!(profiles.fetch_all().unwrap(), users_before);
}

#[test]
fn backup_and_restore_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("records.db")).unwrap();
    let inventory = InventoryStore::new(db.clone(), Validator::default());

    inventory.insert(item("A-1", "Kabel", 2, 10.0)).unwrap();
    let backup = dir.path().join("backup.db");
    db.backup_to(&backup).unwrap();

    inventory.delete("A-1").unwrap();
    assert!(inventory.fetch_all().unwrap().is_empty());

    db.restore_from(&backup).unwrap();
    assert_eq!(inventory.get("A-1").unwrap().unwrap().name, "Kabel");
}
