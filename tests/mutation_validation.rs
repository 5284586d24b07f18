use market_query::{
    config::EngineConfig,
    engine::{Operation, OperationKind, QueryEngine, Request, ValidatedOperation},
    error::{AppError, ErrorKind},
    mutation::{EmbeddedOp, RelationOp, ScalarUpdate},
    schemas::global_registry,
};
use serde_json::{json, Value};

fn engine() -> QueryEngine<'static> {
    QueryEngine::new(global_registry().unwrap(), EngineConfig::default())
}

fn order_item(id: &str, price: i64) -> Value {
    json!({
        "id": id,
        "name": "Shirt",
        "size": "M",
        "color": "red",
        "price": price,
        "freeShipping": false,
        "image": []
    })
}

#[test]
fn test_to_one_connect_requires_single_object() {
    let engine = engine();
    let err = engine
        .validate_update("Order", &json!({"coupon": {"connect": [{"id": "x"}, {"id": "y"}]}}))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::CardinalityViolation);

    let data = engine
        .validate_update("Order", &json!({"coupon": {"connect": {"id": "x"}}}))
        .unwrap();
    assert_eq!(data.relations["coupon"].ops.len(), 1);
}

#[test]
fn test_to_many_verbs_on_to_one_relation() {
    let engine = engine();
    for verb in ["createMany", "updateMany", "deleteMany", "set"] {
        let err = engine
            .validate_update("Worker", &json!({"company": {verb: {}}}))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CardinalityViolation, "{}", verb);
    }
}

#[test]
fn test_set_with_increment_is_ambiguous() {
    let engine = engine();
    let err = engine
        .validate_update("Product", &json!({"price": {"set": 5, "increment": 1}}))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AmbiguousUpdateOperator);
    assert_eq!(err.path.to_string(), "data.price");
}

#[test]
fn test_int_increment_at_the_bound_stays_integral() {
    let engine = engine();
    let data = engine
        .validate_update("Product", &json!({"price": {"increment": 1}}))
        .unwrap();
    let mut doc = json!({"price": i64::MAX});
    data.apply_to(doc.as_object_mut().unwrap());
    assert!(doc["price"].is_i64());
    assert_eq!(doc["price"], json!(i64::MAX));
}

#[test]
fn test_unset_and_set_null_stay_distinct() {
    let engine = engine();
    let data = engine
        .validate_update("Product", &json!({"dec": {"unset": true}, "image": {"set": null}}))
        .unwrap();
    assert_eq!(data.scalars["dec"], ScalarUpdate::Unset);
    assert_eq!(data.scalars["image"], ScalarUpdate::Set(market_query::core::ScalarValue::Null));

    let mut doc = json!({"dec": "old", "image": "a.png", "price": 1});
    data.apply_to(doc.as_object_mut().unwrap());
    assert_eq!(doc, json!({"image": null, "price": 1}));
}

#[test]
fn test_embedded_round_trip() {
    let engine = engine();
    let mut items = vec![order_item("1", 400)];

    let update = engine
        .validate_update(
            "Order",
            &json!({"items": {"updateMany": {"where": {"id": "1"}, "data": {"price": {"set": 500}}}}}),
        )
        .unwrap();
    update.embedded["items"].apply(&mut items);
    assert_eq!(items, vec![order_item("1", 500)]);

    let delete = engine
        .validate_update("Order", &json!({"items": {"deleteMany": {"where": {"id": "1"}}}}))
        .unwrap();
    assert!(matches!(delete.embedded["items"].ops[0], EmbeddedOp::DeleteMany { .. }));
    delete.embedded["items"].apply(&mut items);
    assert!(items.is_empty());
}

#[test]
fn test_embedded_push_allows_duplicates() {
    let engine = engine();
    let mut items = vec![order_item("1", 400)];
    let update = engine
        .validate_update("Order", &json!({"items": {"push": [order_item("1", 400), order_item("1", 400)]}}))
        .unwrap();
    update.embedded["items"].apply(&mut items);
    assert_eq!(items.len(), 3);
}

#[test]
fn test_nested_create_through_relations() {
    let engine = engine();
    let data = engine
        .validate_create(
            "Company",
            &json!({
                "name": "Acme",
                "type": "PHARMACY",
                "logo": "acme.png",
                "workers": {"create": [
                    {"name": "Ann", "phoneNumber": "1", "password": "hash", "role": "ADMIN"},
                    {"name": "Bob", "phoneNumber": "2", "password": "hash", "role": "DELIVERY"}
                ]},
                "coupons": {"connectOrCreate": {
                    "where": {"code": "WELCOME"},
                    "create": {"code": "WELCOME", "amount": 5.0}
                }}
            }),
        )
        .unwrap();
    assert_eq!(data.relations["workers"].ops.len(), 2);
    assert!(matches!(data.relations["coupons"].ops[0], RelationOp::ConnectOrCreate { .. }));
    assert!(data.defaulted.contains(&"active".to_string()));
}

#[test]
fn test_operations_through_the_envelope() {
    let engine = engine();
    let request: Request = serde_json::from_value(json!({
        "entity": "Order",
        "operation": "createMany",
        "args": {
            "data": [
                {"subtotal": 10.0, "delivery": 1.0, "total": 11.0, "businessId": "b1", "items": [order_item("1", 400)]},
                {"subtotal": 20.0, "delivery": 1.0, "total": 21.0, "businessId": "b1"}
            ],
            "skipDuplicates": true
        }
    }))
    .unwrap();
    match engine.validate_request(&request).unwrap() {
        ValidatedOperation::CreateMany { data, skip_duplicates } => {
            assert_eq!(data.len(), 2);
            assert!(skip_duplicates);
            assert!(data[1].embedded["items"].is_empty());
        }
        other => panic!("expected createMany, got {:?}", other),
    }

    let upsert = Operation::new(
        OperationKind::Upsert,
        json!({
            "where": {"phoneNumber": "555"},
            "create": {"name": "Ann", "phoneNumber": "555", "password": "hash", "role": "ADMIN", "companyId": "c1"},
            "update": {"role": "SUPERVISOR"}
        }),
    );
    assert!(matches!(
        engine.validate_operation("Worker", &upsert).unwrap(),
        ValidatedOperation::Upsert { .. }
    ));

    let find = Operation::new(
        OperationKind::FindMany,
        json!({"where": {"company": {"is": {"active": true}}}, "orderBy": {"createdAt": "desc"}, "take": 10}),
    );
    assert!(engine.validate_operation("Worker", &find).is_ok());
}

#[test]
fn test_errors_map_to_status_codes() {
    let engine = engine();
    let err = engine.validate_create("Invoice", &json!({})).unwrap_err();
    assert_eq!(AppError::from(err).status_code(), 404);

    let err = engine.validate_create("Coupon", &json!({"code": 5, "amount": 1.0})).unwrap_err();
    let app = AppError::from(err);
    assert_eq!(app.status_code(), 400);
    assert_eq!(app.to_response_body()["path"], "data.code");
}
