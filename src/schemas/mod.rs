// Schema definitions module - centralized schema registry

pub mod business_schema;
pub mod company_schema;
pub mod order_schema;
pub mod product_schema;
pub mod simple_schemas;

use once_cell::sync::OnceCell;

use crate::ent_schema::{EnumDefinition, FieldDefault, FieldDefinition, SchemaRegistry};
use crate::error::AppResult;

pub use business_schema::BusinessSchema;
pub use company_schema::CompanySchema;
pub use order_schema::{OrderItemSchema, OrderSchema};
pub use product_schema::ProductSchema;
pub use simple_schemas::{CategorySchema, CouponSchema, WishListSchema, WorkerSchema};

static REGISTRY: OnceCell<SchemaRegistry> = OnceCell::new();

/// Identity and timestamp fields carried by every stored entity, followed by `fields`
pub(crate) fn model_fields(fields: Vec<FieldDefinition>) -> Vec<FieldDefinition> {
    let mut all = vec![
        FieldDefinition::string("id")
            .unique()
            .immutable()
            .default_value(FieldDefault::Auto),
        FieldDefinition::date("createdAt").default_value(FieldDefault::Now),
        FieldDefinition::date("updatedAt").default_value(FieldDefault::Now),
    ];
    all.extend(fields);
    all
}

pub(crate) fn business_type() -> EnumDefinition {
    EnumDefinition::new("BusinessType", &["HOSPITAL", "PHARMACY", "GROCERY"])
}

/// Initialize and register all schemas
pub fn create_schema_registry() -> AppResult<SchemaRegistry> {
    SchemaRegistry::builder()
        .register::<BusinessSchema>()
        .register::<CompanySchema>()
        .register::<ProductSchema>()
        .register::<CategorySchema>()
        .register::<WorkerSchema>()
        .register::<OrderSchema>()
        .register::<OrderItemSchema>()
        .register::<CouponSchema>()
        .register::<WishListSchema>()
        .build()
}

/// Process-wide registry, built on first use and immutable afterwards
pub fn global_registry() -> AppResult<&'static SchemaRegistry> {
    REGISTRY.get_or_try_init(create_schema_registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ent_schema::{Cardinality, EntityKind};

    #[test]
    fn test_all_schemas_are_consistent() {
        let registry = create_schema_registry().unwrap();
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = global_registry().unwrap() as *const SchemaRegistry;
        let b = global_registry().unwrap() as *const SchemaRegistry;
        assert_eq!(a, b);
    }

    #[test]
    fn test_order_items_are_embedded() {
        let registry = create_schema_registry().unwrap();
        let order = registry.lookup("Order").unwrap();
        let items = order.field("items").and_then(|f| f.relation()).unwrap();
        assert!(items.embedded);
        assert_eq!(items.cardinality, Cardinality::ToMany);
        assert_eq!(registry.get(items.target_id()).unwrap().kind(), EntityKind::Composite);
    }

    #[test]
    fn test_liked_products_mirror_business_likes() {
        let registry = create_schema_registry().unwrap();
        let business = registry.lookup("Business").unwrap();
        let liked = business.field("productsLiked").and_then(|f| f.relation()).unwrap();
        let mirror = liked.mirror.as_ref().unwrap();
        assert_eq!(mirror.local_ids, "productsLikedIds");
        assert_eq!(mirror.remote_ids, "businessLikeIds");
    }
}
