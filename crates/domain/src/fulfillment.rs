//! Order fulfillment: one order record plus one stock adjustment, atomically.

use std::time::Duration;

use common::{OrderId, PageRequest, ProductId};
use serde::{Deserialize, Serialize};
use storage::{NewOrder, Order, OrderType, WarehouseStore};
use tokio::time::{Instant, timeout, timeout_at};

use crate::error::FulfillmentError;

/// Deadline applied when none is configured.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// A request to receive or ship a quantity of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl FulfillmentRequest {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }

    /// Checks the request shape before any storage is touched.
    pub fn validate(&self) -> Result<(), FulfillmentError> {
        if self.product_id.is_nil() {
            return Err(FulfillmentError::InvalidRequest(
                "product_id must not be nil".to_string(),
            ));
        }
        if self.quantity <= 0 {
            return Err(FulfillmentError::InvalidRequest(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        Ok(())
    }

    fn into_order(self, order_type: OrderType) -> NewOrder {
        NewOrder {
            order_type,
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

/// Coordinates the order log and the stock ledger.
///
/// Each call opens its own transaction, writes the order and the stock
/// change against it, waits for both, and only then decides once whether to
/// commit or roll back. Nothing is retried here: a shipment that failed
/// ambiguously must not be replayed blindly.
pub struct FulfillmentService<S: WarehouseStore> {
    store: S,
    deadline: Duration,
}

impl<S: WarehouseStore> FulfillmentService<S> {
    /// Creates a new fulfillment service with the default deadline.
    pub fn new(store: S) -> Self {
        Self::with_deadline(store, DEFAULT_DEADLINE)
    }

    /// Creates a fulfillment service whose transactions may stay open at most `deadline`.
    ///
    /// The commit itself gets a further `deadline` to answer.
    pub fn with_deadline(store: S, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Records incoming goods and increases the product's stock.
    #[tracing::instrument(skip(self), fields(order_type = "receiving"))]
    pub async fn receive_order(&self, request: FulfillmentRequest) -> Result<Order, FulfillmentError> {
        self.fulfill(OrderType::Receiving, request).await
    }

    /// Records outgoing goods and decreases the product's stock.
    ///
    /// Fails with `InsufficientStock` rather than letting stock go negative,
    /// in which case no order is recorded either.
    #[tracing::instrument(skip(self), fields(order_type = "shipping"))]
    pub async fn ship_order(&self, request: FulfillmentRequest) -> Result<Order, FulfillmentError> {
        self.fulfill(OrderType::Shipping, request).await
    }

    /// Lists committed orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_all_orders(&self, page: PageRequest) -> Result<Vec<Order>, FulfillmentError> {
        page.validate().map_err(|field| {
            FulfillmentError::InvalidRequest(format!("invalid pagination parameter: {field}"))
        })?;
        self.store
            .find_all(page)
            .await
            .map_err(FulfillmentError::Read)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order_by_id(&self, id: OrderId) -> Result<Order, FulfillmentError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(FulfillmentError::Read)?
            .ok_or(FulfillmentError::OrderNotFound(id))
    }

    async fn fulfill(
        &self,
        order_type: OrderType,
        request: FulfillmentRequest,
    ) -> Result<Order, FulfillmentError> {
        let started = std::time::Instant::now();
        let result = self.run_transaction(request.into_order(order_type), request).await;

        metrics::histogram!("fulfillment_duration_seconds", "type" => order_type.as_str())
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => {
                metrics::counter!("orders_fulfilled_total", "type" => order_type.as_str())
                    .increment(1);
            }
            Err(err) => {
                metrics::counter!(
                    "orders_rejected_total",
                    "type" => order_type.as_str(),
                    "reason" => err.reason()
                )
                .increment(1);
            }
        }
        result
    }

    async fn run_transaction(
        &self,
        order: NewOrder,
        request: FulfillmentRequest,
    ) -> Result<Order, FulfillmentError> {
        request.validate()?;

        let deadline = Instant::now() + self.deadline;
        let mut tx = match timeout_at(deadline, self.store.begin()).await {
            Ok(Ok(tx)) => tx,
            Ok(Err(e)) => return Err(FulfillmentError::Write(e)),
            Err(_) => return Err(FulfillmentError::DeadlineExceeded(self.deadline)),
        };

        let written = match timeout_at(deadline, self.write(&mut tx, order)).await {
            Ok(written) => written,
            Err(_) => Err(FulfillmentError::DeadlineExceeded(self.deadline)),
        };

        match written {
            Ok(recorded) => {
                // Bounded separately from the writes; a timeout here leaves the outcome unknown.
                match timeout(self.deadline, self.store.commit(tx)).await {
                    Ok(committed) => committed.map_err(FulfillmentError::Commit)?,
                    Err(_) => {
                        tracing::error!(
                            order_id = %recorded.id,
                            product_id = %recorded.product_id,
                            "commit timed out, outcome unknown"
                        );
                        return Err(FulfillmentError::CommitTimedOut(self.deadline));
                    }
                }
                tracing::info!(
                    order_id = %recorded.id,
                    product_id = %recorded.product_id,
                    quantity = recorded.quantity,
                    "order committed"
                );
                Ok(recorded)
            }
            Err(err) => {
                self.abort(tx, &err).await;
                Err(err)
            }
        }
    }

    /// Issues the stock adjustment and the order append against one handle.
    async fn write(&self, tx: &mut S::Tx, order: NewOrder) -> Result<Order, FulfillmentError> {
        let product_id = order.product_id;
        let remaining = match order.order_type {
            OrderType::Receiving => {
                self.store
                    .increase_stock(tx, product_id, order.quantity)
                    .await
            }
            OrderType::Shipping => {
                self.store
                    .decrease_stock(tx, product_id, order.quantity)
                    .await
            }
        }
        .map_err(|e| FulfillmentError::from_write(e, product_id))?;

        let recorded = self
            .store
            .append(tx, order)
            .await
            .map_err(|e| FulfillmentError::from_write(e, product_id))?;

        tracing::debug!(%product_id, remaining, "stock adjusted");
        Ok(recorded)
    }

    async fn abort(&self, tx: S::Tx, reason: &FulfillmentError) {
        tracing::warn!(error = %reason, "rolling back fulfillment");
        if let Err(e) = self.store.rollback(tx).await {
            tracing::error!(error = %e, "rollback failed");
        }
    }
}
