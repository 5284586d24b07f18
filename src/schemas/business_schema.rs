// Business Entity Schema - Buyers placing orders and liking products
// Liked products are a many-to-many relation stored as mirrored ID lists

use crate::ent_schema::{EntSchema, FieldDefinition, ScalarKind};
use crate::schemas::{business_type, model_fields};

pub struct BusinessSchema;

impl EntSchema for BusinessSchema {
    fn name() -> &'static str {
        "Business"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::string("name"),
            FieldDefinition::string("password"),
            FieldDefinition::string("phoneNumber").unique(),
            FieldDefinition::string("state"),
            FieldDefinition::string("location"),
            FieldDefinition::string("neighborhood"),
            FieldDefinition::enumeration("type", business_type()),
            FieldDefinition::list("productsLikedIds", ScalarKind::String),
            // Relations
            FieldDefinition::to_many("orders", "Order").inverse("business"),
            FieldDefinition::to_many("wishLists", "WishList").inverse("business"),
            FieldDefinition::to_many("productsLiked", "Product")
                .inverse("businessLikes")
                .mirrored("productsLikedIds", "businessLikeIds"),
        ])
    }
}
