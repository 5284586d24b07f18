// Order Entity Schema - Orders with an embedded list of line items
// Line items are a composite type: no identity, no storage of their own

use crate::ent_schema::{EntSchema, EntityKind, FieldDefault, FieldDefinition, ScalarKind};
use crate::schemas::model_fields;

pub struct OrderSchema;

impl EntSchema for OrderSchema {
    fn name() -> &'static str {
        "Order"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::float("subtotal"),
            FieldDefinition::float("delivery"),
            FieldDefinition::float("discount").default_value(FieldDefault::Float(0.0)),
            FieldDefinition::float("total"),
            FieldDefinition::string("businessId").optional(),
            FieldDefinition::string("companyId").optional(),
            FieldDefinition::string("couponId").optional(),
            FieldDefinition::embedded("items", "OrderItem"),
            // Relations
            FieldDefinition::to_one("business", "Business")
                .foreign_key("businessId")
                .inverse("orders"),
            FieldDefinition::to_one("company", "Company")
                .foreign_key("companyId")
                .inverse("orders"),
            FieldDefinition::to_one("coupon", "Coupon")
                .foreign_key("couponId")
                .inverse("orders"),
        ])
    }
}

/// Line item embedded in an order
pub struct OrderItemSchema;

impl EntSchema for OrderItemSchema {
    fn name() -> &'static str {
        "OrderItem"
    }

    fn kind() -> EntityKind {
        EntityKind::Composite
    }

    fn fields() -> Vec<FieldDefinition> {
        // `id` is carried but not enforced unique
        vec![
            FieldDefinition::string("id"),
            FieldDefinition::string("name"),
            FieldDefinition::string("size"),
            FieldDefinition::string("color"),
            FieldDefinition::int("price"),
            FieldDefinition::boolean("freeShipping"),
            FieldDefinition::list("image", ScalarKind::String),
        ]
    }
}
