use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{Aggregate, AggregateRoot, CategoryId, DomainError, ProductId};
use depot_events::Event;

/// Aggregate root: Product.
///
/// Holds identity, title and price only. The global on-hand quantity is a
/// derived figure (sum of the product's per-warehouse stock levels) and is
/// never stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    title: String,
    price: i64,
    category_id: Option<CategoryId>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            title: String::new(),
            price: 0,
            category_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> i64 {
        self.price
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub title: String,
    /// Sale price in the smallest currency unit.
    pub price: i64,
    pub category_id: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub title: String,
    pub price: i64,
    pub category_id: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.title = e.title.clone();
                self.price = e.price;
                self.category_id = e.category_id;
                self.created = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
        }
    }
}

impl Product {
    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.price < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            title: cmd.title.clone(),
            price: cmd.price,
            category_id: cmd.category_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_product_emits_event() {
        let id = ProductId::new();
        let product = Product::empty(id);

        let events = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                title: "USB-C cable".to_string(),
                price: 1500,
                category_id: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        assert_eq!(events.len(), 1);
        match &events[0] {
            ProductEvent::ProductCreated(e) => {
                assert_eq!(e.product_id, id);
                assert_eq!(e.price, 1500);
            }
        }
    }

    #[test]
    fn empty_title_and_negative_price_are_rejected() {
        let id = ProductId::new();
        let product = Product::empty(id);

        let err = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                title: "   ".to_string(),
                price: 1,
                category_id: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                title: "ok".to_string(),
                price: -1,
                category_id: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn duplicate_create_is_a_conflict() {
        let id = ProductId::new();
        let mut product = Product::empty(id);

        let cmd = ProductCommand::CreateProduct(CreateProduct {
            product_id: id,
            title: "widget".to_string(),
            price: 100,
            category_id: None,
            occurred_at: Utc::now(),
        });

        let events = product.handle(&cmd).unwrap();
        for e in &events {
            product.apply(e);
        }

        assert!(matches!(product.handle(&cmd), Err(DomainError::Conflict(_))));
    }
}
