//! Catalog directory projections.
//!
//! Creation-only streams feed these: each upsert writes the same value, so
//! the directories are naturally idempotent and need no sequence cursors.

use serde_json::Value as JsonValue;
use thiserror::Error;

use depot_catalog::{CategoryEvent, ProductEvent, SupplierEvent, WarehouseEvent};
use depot_core::{CategoryId, ProductId, SupplierId, WarehouseId};
use depot_events::EventEnvelope;

use crate::read_model::ReadModelStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub title: String,
    pub price: i64,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReadModel {
    pub category_id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseReadModel {
    pub warehouse_id: WarehouseId,
    pub name: String,
    pub capacity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierReadModel {
    pub supplier_id: SupplierId,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Error)]
pub enum CatalogProjectionError {
    #[error("failed to deserialize catalog event: {0}")]
    Deserialize(String),
}

/// Product directory: existence checks, name joins, listings.
#[derive(Debug)]
pub struct ProductDirectory<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    store: S,
}

impl<S> ProductDirectory<S>
where
    S: ReadModelStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, product_id: ProductId) -> Option<ProductReadModel> {
        self.store.get(&product_id)
    }

    pub fn exists(&self, product_id: ProductId) -> bool {
        self.store.get(&product_id).is_some()
    }

    pub fn list(&self) -> Vec<ProductReadModel> {
        let mut items = self.store.list();
        items.sort_by_key(|p| p.product_id);
        items
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "catalog.product" {
            return Ok(());
        }

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        match event {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        title: e.title,
                        price: e.price,
                        category_id: e.category_id,
                    },
                );
            }
        }

        Ok(())
    }
}

/// Category directory.
#[derive(Debug)]
pub struct CategoryDirectory<S>
where
    S: ReadModelStore<CategoryId, CategoryReadModel>,
{
    store: S,
}

impl<S> CategoryDirectory<S>
where
    S: ReadModelStore<CategoryId, CategoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, category_id: CategoryId) -> Option<CategoryReadModel> {
        self.store.get(&category_id)
    }

    pub fn exists(&self, category_id: CategoryId) -> bool {
        self.store.get(&category_id).is_some()
    }

    pub fn list(&self) -> Vec<CategoryReadModel> {
        let mut items = self.store.list();
        items.sort_by_key(|c| c.category_id);
        items
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "catalog.category" {
            return Ok(());
        }

        let event: CategoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.store.upsert(
                    e.category_id,
                    CategoryReadModel {
                        category_id: e.category_id,
                        name: e.name,
                    },
                );
            }
        }

        Ok(())
    }
}

/// Warehouse directory.
#[derive(Debug)]
pub struct WarehouseDirectory<S>
where
    S: ReadModelStore<WarehouseId, WarehouseReadModel>,
{
    store: S,
}

impl<S> WarehouseDirectory<S>
where
    S: ReadModelStore<WarehouseId, WarehouseReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, warehouse_id: WarehouseId) -> Option<WarehouseReadModel> {
        self.store.get(&warehouse_id)
    }

    pub fn exists(&self, warehouse_id: WarehouseId) -> bool {
        self.store.get(&warehouse_id).is_some()
    }

    pub fn list(&self) -> Vec<WarehouseReadModel> {
        let mut items = self.store.list();
        items.sort_by_key(|w| w.warehouse_id);
        items
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "catalog.warehouse" {
            return Ok(());
        }

        let event: WarehouseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        match event {
            WarehouseEvent::WarehouseCreated(e) => {
                self.store.upsert(
                    e.warehouse_id,
                    WarehouseReadModel {
                        warehouse_id: e.warehouse_id,
                        name: e.name,
                        capacity: e.capacity,
                    },
                );
            }
        }

        Ok(())
    }
}

/// Supplier directory.
#[derive(Debug)]
pub struct SupplierDirectory<S>
where
    S: ReadModelStore<SupplierId, SupplierReadModel>,
{
    store: S,
}

impl<S> SupplierDirectory<S>
where
    S: ReadModelStore<SupplierId, SupplierReadModel>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, supplier_id: SupplierId) -> Option<SupplierReadModel> {
        self.store.get(&supplier_id)
    }

    pub fn exists(&self, supplier_id: SupplierId) -> bool {
        self.store.get(&supplier_id).is_some()
    }

    pub fn list(&self) -> Vec<SupplierReadModel> {
        let mut items = self.store.list();
        items.sort_by_key(|s| s.supplier_id);
        items
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "catalog.supplier" {
            return Ok(());
        }

        let event: SupplierEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        match event {
            SupplierEvent::SupplierCreated(e) => {
                self.store.upsert(
                    e.supplier_id,
                    SupplierReadModel {
                        supplier_id: e.supplier_id,
                        name: e.name,
                        phone: e.phone,
                    },
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryReadModelStore;
    use chrono::Utc;
    use depot_catalog::ProductCreated;
    use depot_core::AggregateId;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn product_directory_answers_existence_and_lookup() {
        let dir = ProductDirectory::new(Arc::new(InMemoryReadModelStore::new()));
        let product_id = ProductId::new();

        let event = ProductEvent::ProductCreated(ProductCreated {
            product_id,
            title: "Widget".to_string(),
            price: 900,
            category_id: None,
            occurred_at: Utc::now(),
        });
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::from_uuid(product_id.into()),
            "catalog.product".to_string(),
            1,
            Utc::now(),
            serde_json::to_value(&event).unwrap(),
        );

        assert!(!dir.exists(product_id));
        dir.apply_envelope(&envelope).unwrap();
        assert!(dir.exists(product_id));
        assert_eq!(dir.get(product_id).unwrap().title, "Widget");

        // Foreign aggregate types pass through untouched.
        let foreign = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            "inventory.ledger".to_string(),
            1,
            Utc::now(),
            serde_json::json!({}),
        );
        dir.apply_envelope(&foreign).unwrap();
        assert_eq!(dir.list().len(), 1);
    }
}
