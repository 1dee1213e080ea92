//! Header updates for existing orders.

use storage::{OrderKind, OrderRecord, Store, StoreTransaction};

use super::commands::UpdateOrder;
use super::{OrderAggregate, OrderError, abandon, read_back, validation};

/// Applies partial header updates. Never touches lines or stock.
pub struct OrderMutationService<S: Store> {
    store: S,
}

impl<S: Store> OrderMutationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Updates an order and returns its refreshed view.
    ///
    /// An update that would leave every field as it is skips the write.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn update(&self, cmd: UpdateOrder) -> Result<OrderAggregate, OrderError> {
        let mut tx = self.store.begin().await?;
        let current = match tx.find_order_for_update(cmd.order_id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                abandon(tx).await;
                return Err(OrderError::OrderNotFound(cmd.order_id));
            }
            Err(e) => {
                abandon(tx).await;
                return Err(e.into());
            }
        };

        if let Err(errors) = validation::validate_update(&cmd, current.kind) {
            abandon(tx).await;
            return Err(errors.into());
        }

        let updated = apply_update(&current, &cmd);
        if updated == current {
            tx.rollback().await?;
            tracing::debug!("update changes nothing");
        } else {
            if let Err(e) = tx.update_order(&updated).await {
                abandon(tx).await;
                return Err(e.into());
            }
            tx.commit().await?;
            metrics::counter!("orders_updated_total").increment(1);
            tracing::info!("order updated");
        }

        read_back(&self.store, cmd.order_id).await
    }
}

/// Computes the header after an update without touching storage.
///
/// Fields that do not belong to the order's kind are ignored.
pub fn apply_update(current: &OrderRecord, cmd: &UpdateOrder) -> OrderRecord {
    let mut next = current.clone();

    if let Some(price) = cmd.price {
        next.price = price;
    }
    if let Some(bonus) = cmd.bonus {
        next.bonus = bonus;
    }
    if let Some(ref status) = cmd.status {
        next.status = status.clone();
    }

    match current.kind {
        OrderKind::Individual => {
            if let Some(ref phone) = cmd.phone {
                next.phone = Some(phone.clone());
            }
            if let Some(ref name) = cmd.name {
                next.name = Some(name.clone());
            }
        }
        OrderKind::Legal => {
            if let Some(ref organization) = cmd.organization {
                next.organization = Some(organization.clone());
            }
            if let Some(ref tax_id) = cmd.tax_id {
                next.tax_id = Some(tax_id.clone());
            }
            if let Some(ref comment) = cmd.comment {
                next.comment = (!comment.is_empty()).then(|| comment.clone());
            }
        }
    }

    next
}
