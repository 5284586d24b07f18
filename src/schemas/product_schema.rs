// Product Entity Schema - Catalog entries with three mirrored many-to-many relations

use crate::ent_schema::{EntSchema, FieldDefault, FieldDefinition, ScalarKind};
use crate::schemas::model_fields;

pub struct ProductSchema;

impl EntSchema for ProductSchema {
    fn name() -> &'static str {
        "Product"
    }

    fn fields() -> Vec<FieldDefinition> {
        model_fields(vec![
            FieldDefinition::string("name"),
            FieldDefinition::string("dec").optional(),
            FieldDefinition::string("image").optional(),
            FieldDefinition::int("price"),
            FieldDefinition::int("oldPrice").optional(),
            FieldDefinition::boolean("available").default_value(FieldDefault::Bool(true)),
            FieldDefinition::boolean("hot").default_value(FieldDefault::Bool(false)),
            FieldDefinition::boolean("freeShipping").default_value(FieldDefault::Bool(false)),
            FieldDefinition::list("views", ScalarKind::String),
            FieldDefinition::list("categoryIds", ScalarKind::String),
            FieldDefinition::list("businessLikeIds", ScalarKind::String),
            FieldDefinition::list("wishListIds", ScalarKind::String),
            FieldDefinition::string("companyId"),
            // Relations
            FieldDefinition::to_one("company", "Company")
                .required()
                .foreign_key("companyId")
                .inverse("products"),
            FieldDefinition::to_many("categories", "Category")
                .inverse("products")
                .mirrored("categoryIds", "productsIds"),
            FieldDefinition::to_many("businessLikes", "Business")
                .inverse("productsLiked")
                .mirrored("businessLikeIds", "productsLikedIds"),
            FieldDefinition::to_many("wishLists", "WishList")
                .inverse("products")
                .mirrored("wishListIds", "productsIds"),
        ])
    }
}
