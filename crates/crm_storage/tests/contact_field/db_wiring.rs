#![forbid(unsafe_code)]

use crm_kernel_contracts::contact::{ContactId, ContactInput};
use crm_kernel_contracts::contactfield::{FieldKind, FieldTypeCreateRequest, FieldTypeId};
use crm_kernel_contracts::tenant::{SessionToken, TenantId, UserId};
use crm_kernel_contracts::MonotonicTimeNs;
use crm_storage::repo::{ContactFieldTypeRepo, ContactFieldValueRepo, CrmFoundationRepo};
use crm_storage::store::{CrmStore, SessionRecord, StorageError};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn seed_contact(store: &mut CrmStore, tenant_id: &TenantId) -> ContactId {
    store
        .insert_contact_row(
            MonotonicTimeNs(1),
            ContactInput::v1(tenant_id.clone(), "Ada".to_string(), None).unwrap(),
        )
        .unwrap()
        .contact_id
}

fn seed_field_type(store: &mut CrmStore, tenant_id: &TenantId, name: &str) -> FieldTypeId {
    store
        .create_field_type_row(
            MonotonicTimeNs(1),
            tenant_id,
            FieldTypeCreateRequest {
                name: name.to_string(),
                kind: FieldKind::parse("test").unwrap(),
                protocol: None,
            },
        )
        .unwrap()
        .field_type_id
}

#[test]
fn at_contact_field_db_01_tenant_isolation_enforced() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let tenant_b = tenant("tenant_b");
    let contact_a = seed_contact(&mut s, &tenant_a);
    let ft_a = seed_field_type(&mut s, &tenant_a, "Test Name");
    seed_contact(&mut s, &tenant_b);

    let v = s
        .create_field_value_row(
            MonotonicTimeNs(10),
            &tenant_a,
            contact_a,
            ft_a,
            "test_data".to_string(),
        )
        .unwrap();
    assert_eq!(v.tenant_id, tenant_a);

    assert!(matches!(
        s.field_value_rows_for_contact(&tenant_b, contact_a),
        Err(StorageError::NotFound { .. })
    ));
    assert!(s.field_value_row(&tenant_b, v.field_value_id).is_none());
    assert!(matches!(
        s.update_field_value_row(
            MonotonicTimeNs(11),
            &tenant_b,
            v.field_value_id,
            ft_a,
            "hijack".to_string()
        ),
        Err(StorageError::NotFound { .. })
    ));
    assert!(matches!(
        s.delete_field_value_row(&tenant_b, v.field_value_id),
        Err(StorageError::NotFound { .. })
    ));

    // Tenant A is untouched by the failed cross-tenant writes.
    let rows = s.field_value_rows_for_contact(&tenant_a, contact_a).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data, "test_data");
}

#[test]
fn at_contact_field_db_02_cross_tenant_contact_is_not_found_on_create() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let tenant_b = tenant("tenant_b");
    let contact_a = seed_contact(&mut s, &tenant_a);
    let ft_b = seed_field_type(&mut s, &tenant_b, "Test Name");

    let out = s.create_field_value_row(
        MonotonicTimeNs(10),
        &tenant_b,
        contact_a,
        ft_b,
        "x".to_string(),
    );
    assert!(matches!(out, Err(StorageError::NotFound { table: "contacts", .. })));
}

#[test]
fn at_contact_field_db_03_unknown_field_type_is_foreign_key_violation() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let contact_a = seed_contact(&mut s, &tenant_a);

    let out = s.create_field_value_row(
        MonotonicTimeNs(10),
        &tenant_a,
        contact_a,
        FieldTypeId::new(999).unwrap(),
        "x".to_string(),
    );
    assert!(matches!(out, Err(StorageError::ForeignKeyViolation { .. })));
    assert!(s
        .field_value_rows_for_contact(&tenant_a, contact_a)
        .unwrap()
        .is_empty());
}

#[test]
fn at_contact_field_db_04_duplicate_pairs_allowed_and_reads_are_stable() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let contact_a = seed_contact(&mut s, &tenant_a);
    let ft = seed_field_type(&mut s, &tenant_a, "Phone");

    let first = s
        .create_field_value_row(MonotonicTimeNs(10), &tenant_a, contact_a, ft, "111".to_string())
        .unwrap();
    let second = s
        .create_field_value_row(MonotonicTimeNs(11), &tenant_a, contact_a, ft, "222".to_string())
        .unwrap();
    assert_ne!(first.field_value_id, second.field_value_id);

    let read_1: Vec<_> = s
        .field_value_rows_for_contact(&tenant_a, contact_a)
        .unwrap()
        .into_iter()
        .cloned()
        .collect();
    let read_2: Vec<_> = s
        .field_value_rows_for_contact(&tenant_a, contact_a)
        .unwrap()
        .into_iter()
        .cloned()
        .collect();
    assert_eq!(read_1, read_2);
    assert_eq!(
        read_1.iter().map(|v| v.data.as_str()).collect::<Vec<_>>(),
        vec!["111", "222"]
    );
}

#[test]
fn at_contact_field_db_05_update_replaces_data_wholesale() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let contact_a = seed_contact(&mut s, &tenant_a);
    let ft = seed_field_type(&mut s, &tenant_a, "Test Name");

    let v = s
        .create_field_value_row(
            MonotonicTimeNs(10),
            &tenant_a,
            contact_a,
            ft,
            "first value".to_string(),
        )
        .unwrap();
    s.update_field_value_row(
        MonotonicTimeNs(11),
        &tenant_a,
        v.field_value_id,
        ft,
        "second".to_string(),
    )
    .unwrap();

    let rows = s.field_value_rows_for_contact(&tenant_a, contact_a).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data, "second");
    assert_eq!(rows[0].field_value_id, v.field_value_id);
}

#[test]
fn at_contact_field_db_06_delete_is_permanent() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let contact_a = seed_contact(&mut s, &tenant_a);
    let ft = seed_field_type(&mut s, &tenant_a, "Test Name");

    let v = s
        .create_field_value_row(MonotonicTimeNs(10), &tenant_a, contact_a, ft, "gone".to_string())
        .unwrap();
    s.delete_field_value_row(&tenant_a, v.field_value_id).unwrap();

    assert!(s.field_value_row(&tenant_a, v.field_value_id).is_none());
    assert!(s
        .field_value_rows_for_contact(&tenant_a, contact_a)
        .unwrap()
        .is_empty());
    assert!(matches!(
        s.delete_field_value_row(&tenant_a, v.field_value_id),
        Err(StorageError::NotFound { .. })
    ));

    // Ids are never reused after a delete.
    let next = s
        .create_field_value_row(MonotonicTimeNs(11), &tenant_a, contact_a, ft, "new".to_string())
        .unwrap();
    assert!(next.field_value_id > v.field_value_id);
}

#[test]
fn at_contact_field_db_07_blank_data_rejected() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let contact_a = seed_contact(&mut s, &tenant_a);
    let ft = seed_field_type(&mut s, &tenant_a, "Test Name");

    let out = s.create_field_value_row(MonotonicTimeNs(10), &tenant_a, contact_a, ft, " ".to_string());
    assert!(matches!(out, Err(StorageError::ContractViolation(_))));
}

#[test]
fn at_contact_field_db_08_session_and_contact_rows_resolve() {
    let mut s = CrmStore::new_in_memory();
    let tenant_a = tenant("tenant_a");
    let token = SessionToken::new("tok_a").unwrap();
    s.insert_session_row(
        SessionRecord::v1(
            token.clone(),
            tenant_a.clone(),
            UserId::new("user_1").unwrap(),
            MonotonicTimeNs(1),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(s.session_row(&token).unwrap().tenant_id, tenant_a);
    assert!(s
        .session_row(&SessionToken::new("tok_other").unwrap())
        .is_none());

    let contact_a = seed_contact(&mut s, &tenant_a);
    assert!(s.contact_row(&tenant_a, contact_a).is_some());
    assert!(s.contact_row(&tenant("tenant_b"), contact_a).is_none());
}
