use crate::engine::TradingContext;
use crate::error::ExecutorError;
use crate::portfolio::owned_shares;
use core_types::{
    AccountId, LimitOrder, NewLimitOrder, NewTrade, OrderId, OrderSide, TradeSource,
    normalize_ticker,
};
use database::DbError;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Accepts resting limit orders and executes them when the quoted price
/// reaches the limit.
///
/// Limit executions are not gated by market hours and carry no commission.
#[derive(Clone)]
pub struct LimitOrderMatcher {
    ctx: Arc<TradingContext>,
}

impl LimitOrderMatcher {
    pub fn new(ctx: Arc<TradingContext>) -> Self {
        Self { ctx }
    }

    pub async fn create_limit_order(
        &self,
        account_id: AccountId,
        ticker: &str,
        side: OrderSide,
        shares: i64,
        limit_price: Decimal,
    ) -> Result<LimitOrder, ExecutorError> {
        if shares <= 0 {
            return Err(ExecutorError::InvalidInput(format!(
                "shares must be positive, got {shares}"
            )));
        }
        if limit_price <= Decimal::ZERO {
            return Err(ExecutorError::InvalidInput(format!(
                "limit price must be positive, got {limit_price}"
            )));
        }
        let ticker = normalize_ticker(ticker)?;

        if self.ctx.store.find_account(account_id).await?.is_none() {
            return Err(ExecutorError::AccountNotFound(account_id));
        }

        let order = self
            .ctx
            .store
            .create_limit_order(NewLimitOrder {
                account_id,
                ticker,
                side,
                shares,
                limit_price,
                created_at: self.ctx.clock.now(),
            })
            .await
            .map_err(|e| match e {
                DbError::NotFound => ExecutorError::AccountNotFound(account_id),
                other => ExecutorError::Store(other),
            })?;

        tracing::info!(
            account_id,
            order_id = order.id,
            ticker = %order.ticker,
            side = %order.side,
            shares,
            %limit_price,
            "Limit order placed"
        );
        Ok(order)
    }

    pub async fn cancel_limit_order(&self, order_id: OrderId) -> Result<LimitOrder, ExecutorError> {
        let order = self
            .ctx
            .store
            .find_limit_order(order_id)
            .await?
            .ok_or(ExecutorError::OrderNotFound(order_id))?;
        if !order.is_pending() || !self.ctx.store.cancel_limit_order(order_id).await? {
            return Err(ExecutorError::OrderNotPending(order_id));
        }

        tracing::info!(order_id, account_id = order.account_id, "Limit order cancelled");
        self.ctx
            .store
            .find_limit_order(order_id)
            .await?
            .ok_or(ExecutorError::OrderNotFound(order_id))
    }

    pub async fn pending_orders(&self, account_id: AccountId) -> Result<Vec<LimitOrder>, ExecutorError> {
        Ok(self.ctx.store.pending_limit_orders(Some(account_id)).await?)
    }

    /// Runs one matching pass over a snapshot of all pending orders and
    /// returns how many were executed.
    ///
    /// Each ticker is quoted once per pass. An order whose ticker has no
    /// price, whose limit is not reached, or whose account cannot cover it
    /// stays pending. A failure on one order never stops the others.
    pub async fn check_limit_orders(&self) -> Result<usize, ExecutorError> {
        let pending = self.ctx.store.pending_limit_orders(None).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let prices = self
            .ctx
            .quote_all(pending.iter().map(|o| o.ticker.as_str()))
            .await;

        let mut executed = 0;
        for order in &pending {
            let Some(&price) = prices.get(&order.ticker) else {
                tracing::debug!(order_id = order.id, ticker = %order.ticker, "No price, order left pending");
                continue;
            };
            if !order.is_triggered_by(price) {
                continue;
            }

            match self.try_fill(order, price).await {
                Ok(true) => executed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(order_id = order.id, error = %e, "Limit order fill failed");
                }
            }
        }

        tracing::info!(checked = pending.len(), executed, "Limit order pass complete");
        Ok(executed)
    }

    /// Re-validates a triggered order under its account's lock and fills it.
    /// `Ok(false)` means the order was left as it was.
    async fn try_fill(&self, order: &LimitOrder, price: Decimal) -> Result<bool, ExecutorError> {
        let ctx = &self.ctx;
        let _guard = ctx.locks.acquire(order.account_id).await;

        let Some(account) = ctx.store.find_account(order.account_id).await? else {
            return Err(ExecutorError::AccountNotFound(order.account_id));
        };

        let amount = price * Decimal::from(order.shares);
        let cash_after = match order.side {
            OrderSide::Buy => {
                if account.cash < amount {
                    tracing::info!(
                        order_id = order.id,
                        required = %amount,
                        available = %account.cash,
                        "Insufficient funds, limit order left pending"
                    );
                    return Ok(false);
                }
                account.cash - amount
            }
            OrderSide::Sell => {
                let trades = ctx.store.trades_for_account(order.account_id).await?;
                let owned = owned_shares(&trades, &order.ticker);
                if owned < order.shares {
                    tracing::info!(
                        order_id = order.id,
                        owned,
                        requested = order.shares,
                        "Insufficient shares, limit order left pending"
                    );
                    return Ok(false);
                }
                account.cash + amount
            }
        };

        let previous = ctx
            .store
            .last_trade_for_ticker(order.account_id, &order.ticker)
            .await?;
        let trade = NewTrade {
            account_id: order.account_id,
            ticker: order.ticker.clone(),
            side: order.side,
            shares: order.shares,
            price,
            total: amount,
            source: TradeSource::Limit,
            executed_at: ctx.clock.now(),
        };

        let Some(trade) = ctx
            .store
            .fill_limit_order(order.id, trade, account.cash, cash_after)
            .await?
        else {
            tracing::debug!(order_id = order.id, "Order no longer pending, skipped");
            return Ok(false);
        };

        tracing::info!(
            order_id = order.id,
            trade_id = trade.id,
            account_id = order.account_id,
            ticker = %order.ticker,
            side = %order.side,
            shares = order.shares,
            %price,
            "Limit order executed"
        );

        ctx.raise_alert(order.account_id, &order.ticker, previous.as_ref(), price)
            .await;
        Ok(true)
    }
}
