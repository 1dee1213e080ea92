//! Order service providing a single entry point for order operations.

use common::OrderId;
use storage::Store;

use super::{
    OrderAggregate, OrderError, OrderMutationService, OrderPlacementService, PlaceOrder,
    PlacementOutcome, PlacementPolicy, UpdateOrder,
};

/// Service for managing orders.
///
/// Wraps placement and mutation and adds reads and deletion over the same
/// store.
pub struct OrderService<S: Store + Clone> {
    store: S,
    placement: OrderPlacementService<S>,
    mutation: OrderMutationService<S>,
}

impl<S: Store + Clone> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, PlacementPolicy::default())
    }

    pub fn with_policy(store: S, policy: PlacementPolicy) -> Self {
        Self {
            placement: OrderPlacementService::with_policy(store.clone(), policy),
            mutation: OrderMutationService::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn place(&self, cmd: PlaceOrder) -> Result<PlacementOutcome, OrderError> {
        self.placement.place(cmd).await
    }

    pub async fn update(&self, cmd: UpdateOrder) -> Result<OrderAggregate, OrderError> {
        self.mutation.update(cmd).await
    }

    /// Loads an order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, order_id: OrderId) -> Result<OrderAggregate, OrderError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Loads every order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<OrderAggregate>, OrderError> {
        Ok(self.store.list_orders().await?)
    }

    /// Deletes an order and its lines. Stock is not restored.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, order_id: OrderId) -> Result<(), OrderError> {
        if self.store.delete_order(order_id).await? {
            tracing::info!(%order_id, "order deleted");
            Ok(())
        } else {
            Err(OrderError::OrderNotFound(order_id))
        }
    }
}
