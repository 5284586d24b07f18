// Simple schema definitions for the smaller company-owned entities

use crate::ent_schema::{EntSchema, EnumDefinition, FieldDefault, FieldDefinition, ScalarKind};
use crate::schemas::model_fields;

/// Category entity schema
pub struct CategorySchema;

impl EntSchema for CategorySchema {
    fn name() -> &'static str {
        "Category"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::string("name"),
            FieldDefinition::list("productsIds", ScalarKind::String),
            FieldDefinition::string("companyId"),
            FieldDefinition::to_one("company", "Company")
                .required()
                .foreign_key("companyId")
                .inverse("categories"),
            FieldDefinition::to_many("products", "Product")
                .inverse("categories")
                .mirrored("productsIds", "categoryIds"),
        ])
    }
}

/// Worker entity schema
pub struct WorkerSchema;

impl EntSchema for WorkerSchema {
    fn name() -> &'static str {
        "Worker"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::string("name"),
            FieldDefinition::string("phoneNumber").unique(),
            FieldDefinition::string("password"),
            FieldDefinition::enumeration(
                "role",
                EnumDefinition::new("WorkerRole", &["ADMIN", "SUPERVISOR", "DELIVERY"]),
            ),
            FieldDefinition::string("companyId"),
            FieldDefinition::to_one("company", "Company")
                .required()
                .foreign_key("companyId")
                .inverse("workers"),
        ])
    }
}

/// Coupon entity schema
pub struct CouponSchema;

impl EntSchema for CouponSchema {
    fn name() -> &'static str {
        "Coupon"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::string("code").unique(),
            FieldDefinition::float("amount"),
            FieldDefinition::boolean("isValid").default_value(FieldDefault::Bool(true)),
            FieldDefinition::boolean("active").default_value(FieldDefault::Bool(true)),
            FieldDefinition::string("companyId").optional(),
            FieldDefinition::to_one("company", "Company")
                .foreign_key("companyId")
                .inverse("coupons"),
            FieldDefinition::to_many("orders", "Order").inverse("coupon"),
        ])
    }
}

/// WishList entity schema
pub struct WishListSchema;

impl EntSchema for WishListSchema {
    fn name() -> &'static str {
        "WishList"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::string("name"),
            FieldDefinition::list("productsIds", ScalarKind::String),
            FieldDefinition::string("businessId"),
            FieldDefinition::string("companyId"),
            FieldDefinition::to_one("business", "Business")
                .required()
                .foreign_key("businessId")
                .inverse("wishLists"),
            FieldDefinition::to_one("company", "Company")
                .required()
                .foreign_key("companyId")
                .inverse("wishLists"),
            FieldDefinition::to_many("products", "Product")
                .inverse("wishLists")
                .mirrored("productsIds", "wishListIds"),
        ])
    }
}
