// Company Entity Schema - Sellers owning products, workers and coupons

use crate::ent_schema::{EntSchema, FieldDefault, FieldDefinition};
use crate::schemas::{business_type, model_fields};

pub struct CompanySchema;

impl EntSchema for CompanySchema {
    fn name() -> &'static str {
        "Company"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::string("name"),
            FieldDefinition::enumeration("type", business_type()),
            FieldDefinition::boolean("active").default_value(FieldDefault::Bool(true)),
            FieldDefinition::string("logo"),
            // Owned records
            FieldDefinition::to_many("products", "Product").inverse("company"),
            FieldDefinition::to_many("orders", "Order").inverse("company"),
            FieldDefinition::to_many("workers", "Worker").inverse("company"),
            FieldDefinition::to_many("coupons", "Coupon").inverse("company"),
            FieldDefinition::to_many("wishLists", "WishList").inverse("company"),
            FieldDefinition::to_many("categories", "Category").inverse("company"),
        ])
    }
}
