use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub author: String,
    #[sea_orm(unique)]
    pub isbn: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub shelf: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub publisher: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::circulation::Entity")]
    Circulation,
}

impl Related<super::circulation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Circulation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for domain::Book {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            author: model.author,
            isbn: model.isbn,
            total_copies: model.total_copies,
            available_copies: model.available_copies,
            shelf: model.shelf,
            category: model.category,
            description: model.description,
            published_year: model.published_year,
            publisher: model.publisher,
            cover_image: model.cover_image,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
