use crate::model::{generate_id, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product template: the record feature assignments are bound to.
/// External to the feature subsystem proper; only what the propagation
/// engine needs is modeled here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTemplate {
    pub id: Id,
    pub scope_id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductTemplate {
    pub name: String,
}

impl NewProductTemplate {
    pub fn into_template(self, scope_id: Id) -> ProductTemplate {
        ProductTemplate {
            id: generate_id(),
            scope_id,
            name: self.name,
            created_at: Utc::now(),
        }
    }
}

/// A concrete product variant of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: Id,
    pub template_id: Id,
    pub scope_id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductVariant {
    pub template_id: Id,
    pub name: String,
}

impl NewProductVariant {
    pub fn into_variant(self, scope_id: Id) -> ProductVariant {
        ProductVariant {
            id: generate_id(),
            template_id: self.template_id,
            scope_id,
            name: self.name,
            created_at: Utc::now(),
        }
    }
}

/// A production lot/serial. The product reference may be set after
/// creation; changing it triggers a full refresh of the lot's feature
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLot {
    pub id: Id,
    pub scope_id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductionLot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Id>,
}

impl NewProductionLot {
    pub fn into_lot(self, scope_id: Id) -> ProductionLot {
        ProductionLot {
            id: generate_id(),
            scope_id,
            name: self.name,
            product_id: self.product_id,
            created_at: Utc::now(),
        }
    }
}
