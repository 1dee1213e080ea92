//! Transactional order placement.

use std::collections::HashMap;
use std::time::Instant;

use common::{Money, OrderId, ProductId};
use storage::{InventoryLedger, NewOrder, NewOrderLine, Store, StoreError, StoreTransaction};

use super::commands::{CustomerDetails, PlaceOrder};
use super::{OrderAggregate, OrderError, abandon, read_back, validation};

/// How placement reconciles the caller's price with the line total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementPolicy {
    /// Reject orders whose price differs from the sum of unit price times
    /// quantity. When false a mismatch is only logged.
    pub enforce_price_match: bool,
}

impl PlacementPolicy {
    pub fn strict() -> Self {
        Self {
            enforce_price_match: true,
        }
    }
}

/// Result of a successful placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementOutcome {
    pub order: OrderAggregate,
    /// Sum of unit price times quantity over all lines.
    pub computed_total: Money,
    /// True when the idempotency key matched an earlier order and nothing was
    /// written.
    pub replayed: bool,
}

/// What the transaction body produced before commit.
enum Staged {
    Placed {
        order_id: OrderId,
        computed_total: Money,
        units: u64,
    },
    Existing(OrderId),
}

/// Places orders, validating every line against stock and decrementing it
/// within one storage transaction.
pub struct OrderPlacementService<S: Store> {
    store: S,
    policy: PlacementPolicy,
}

impl<S: Store> OrderPlacementService<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, PlacementPolicy::default())
    }

    pub fn with_policy(store: S, policy: PlacementPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// Places an order.
    ///
    /// Either the header, every line and every stock decrement become visible
    /// together, or none of them do. A read failure after commit is reported
    /// as [`OrderError::ViewUnavailable`] and does not undo the order.
    #[tracing::instrument(
        skip(self, cmd),
        fields(kind = %cmd.kind(), lines = cmd.lines.len())
    )]
    pub async fn place(&self, cmd: PlaceOrder) -> Result<PlacementOutcome, OrderError> {
        let started = Instant::now();
        let result = self.place_once(&cmd).await;

        match &result {
            Ok(outcome) if outcome.replayed => {
                tracing::info!(order_id = %outcome.order.header.id, "placement replayed");
            }
            Ok(outcome) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %outcome.order.header.id,
                    computed_total = %outcome.computed_total,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                tracing::info!(reason = e.reason(), error = %e, "placement rejected");
            }
        }
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn place_once(&self, cmd: &PlaceOrder) -> Result<PlacementOutcome, OrderError> {
        let lines = validation::validate_placement(cmd)?;

        let mut tx = self.store.begin().await?;
        let staged = match self.stage(&mut tx, cmd, &lines).await {
            Ok(staged) => staged,
            Err(e) => {
                abandon(tx).await;
                return self.recover(e, cmd, &lines).await;
            }
        };

        match staged {
            Staged::Existing(order_id) => {
                abandon(tx).await;
                self.replay(order_id, cmd, &lines).await
            }
            Staged::Placed {
                order_id,
                computed_total,
                units,
            } => {
                if let Err(e) = tx.commit().await {
                    return self.recover(e.into(), cmd, &lines).await;
                }
                metrics::counter!("inventory_units_decremented_total").increment(units);

                let order = read_back(&self.store, order_id).await?;
                Ok(PlacementOutcome {
                    order,
                    computed_total,
                    replayed: false,
                })
            }
        }
    }

    /// Runs every write of a placement inside `tx` without committing.
    async fn stage(
        &self,
        tx: &mut S::Transaction,
        cmd: &PlaceOrder,
        lines: &[NewOrderLine],
    ) -> Result<Staged, OrderError> {
        if let Some(key) = cmd.idempotency_key
            && let Some(existing) = tx.find_order_by_idempotency_key(key).await?
        {
            return Ok(Staged::Existing(existing));
        }

        let order_id = tx.insert_order(&new_order(cmd)).await?;

        // Lock in id order so placements listing the same products in a
        // different order cannot deadlock.
        let mut product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        tx.lock_products(&product_ids).await?;

        let mut demand: HashMap<ProductId, u64> = HashMap::new();
        let mut computed_total = Money::zero();
        for line in lines {
            let product = tx
                .find_product(line.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(line.product_id))?;

            let requested = demand.entry(line.product_id).or_default();
            *requested += u64::from(line.quantity);
            if *requested > u64::from(product.stock) {
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id,
                    requested: u32::try_from(*requested).unwrap_or(u32::MAX),
                    available: product.stock,
                });
            }

            computed_total += product.price.multiply(line.quantity);
        }

        if computed_total != cmd.price {
            if self.policy.enforce_price_match {
                return Err(OrderError::PriceMismatch {
                    expected: computed_total,
                    received: cmd.price,
                });
            }
            tracing::warn!(
                %order_id,
                price = %cmd.price,
                %computed_total,
                "order price differs from line total"
            );
        }

        tx.insert_order_lines(order_id, lines).await?;

        let mut units = 0u64;
        for line in lines {
            let remaining = tx.decrement_stock(line.product_id, line.quantity).await?;
            tracing::debug!(product_id = %line.product_id, remaining, "stock decremented");
            units += u64::from(line.quantity);
        }

        Ok(Staged::Placed {
            order_id,
            computed_total,
            units,
        })
    }

    /// Turns a lost idempotency-key race into a replay of the winner.
    async fn recover(
        &self,
        error: OrderError,
        cmd: &PlaceOrder,
        lines: &[NewOrderLine],
    ) -> Result<PlacementOutcome, OrderError> {
        match (error, cmd.idempotency_key) {
            (OrderError::TransactionFailure(StoreError::DuplicateIdempotencyKey(dup)), Some(key))
                if dup == key =>
            {
                tracing::debug!(%key, "lost idempotency key race");
                match self.store.find_order_id_by_idempotency_key(key).await? {
                    Some(order_id) => self.replay(order_id, cmd, lines).await,
                    None => Err(OrderError::TransactionFailure(
                        StoreError::DuplicateIdempotencyKey(key),
                    )),
                }
            }
            (error, _) => Err(error),
        }
    }

    /// Returns the order that already claimed the command's key.
    ///
    /// The key only replays a request with the same kind and the same lines.
    async fn replay(
        &self,
        order_id: OrderId,
        cmd: &PlaceOrder,
        lines: &[NewOrderLine],
    ) -> Result<PlacementOutcome, OrderError> {
        let order = read_back(&self.store, order_id).await?;
        if !same_request(&order, cmd, lines) {
            tracing::warn!(%order_id, "idempotency key reused for a different request");
            return Err(OrderError::IdempotencyConflict(order_id));
        }
        Ok(PlacementOutcome {
            computed_total: order.line_total(),
            order,
            replayed: true,
        })
    }
}

/// Compares the immutable parts of a stored order with a placement.
fn same_request(order: &OrderAggregate, cmd: &PlaceOrder, lines: &[NewOrderLine]) -> bool {
    order.header.kind == cmd.kind()
        && order.lines.len() == lines.len()
        && order
            .lines
            .iter()
            .zip(lines)
            .all(|(stored, requested)| {
                stored.line.product_id == requested.product_id
                    && stored.line.quantity == requested.quantity
            })
}

fn new_order(cmd: &PlaceOrder) -> NewOrder {
    let (phone, name, organization, tax_id) = match &cmd.customer {
        CustomerDetails::Individual { phone, name } => {
            (Some(phone.clone()), Some(name.clone()), None, None)
        }
        CustomerDetails::Legal {
            organization,
            tax_id,
        } => (None, None, Some(organization.clone()), Some(tax_id.clone())),
    };

    NewOrder {
        price: cmd.price,
        bonus: cmd.bonus,
        user_id: cmd.user_id,
        kind: cmd.kind(),
        status: cmd.status.clone(),
        service_mode: cmd.service_mode.clone(),
        phone,
        name,
        organization,
        tax_id,
        comment: cmd.comment.clone(),
        idempotency_key: cmd.idempotency_key,
    }
}
