use crate::alerts::evaluate_price_move;
use crate::calendar::MarketCalendar;
use crate::error::ExecutorError;
use crate::locks::AccountLocks;
use crate::portfolio::owned_shares;
use api_client::PriceOracle;
use core_types::{
    AccountId, Clock, NewTrade, OrderSide, PriceAlert, Trade, TradeSource, normalize_ticker,
};
use database::LedgerStore;
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Money rules applied to every execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingParams {
    pub starting_capital: Decimal,
    /// Fraction charged on market orders; 0.01 is 1%.
    pub commission_pct: Decimal,
    pub alert_threshold_pct: Decimal,
}

impl Default for TradingParams {
    fn default() -> Self {
        Self {
            starting_capital: dec!(10000.00),
            commission_pct: dec!(0.01),
            alert_threshold_pct: dec!(5),
        }
    }
}

impl From<&configuration::Trading> for TradingParams {
    fn from(trading: &configuration::Trading) -> Self {
        Self {
            starting_capital: trading.starting_capital,
            commission_pct: trading.commission_pct,
            alert_threshold_pct: trading.alert_threshold_pct,
        }
    }
}

/// Whether market orders are refused outside the regular session.
///
/// Lives for the lifetime of the process; a restart returns it to the
/// configured default.
#[derive(Debug)]
pub struct MarketHoursPolicy {
    enforce: AtomicBool,
}

impl MarketHoursPolicy {
    pub fn new(enforce: bool) -> Self {
        Self {
            enforce: AtomicBool::new(enforce),
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.enforce.load(Ordering::SeqCst)
    }

    pub fn set_enforced(&self, enforce: bool) {
        self.enforce.store(enforce, Ordering::SeqCst);
        tracing::info!(enforce, "Market hours enforcement changed");
    }
}

impl Default for MarketHoursPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Everything an execution path needs, shared by the market engine and the
/// limit matcher.
pub struct TradingContext {
    pub store: Arc<dyn LedgerStore>,
    pub oracle: Arc<dyn PriceOracle>,
    pub clock: Arc<dyn Clock>,
    pub calendar: MarketCalendar,
    pub policy: MarketHoursPolicy,
    pub params: TradingParams,
    pub locks: AccountLocks,
}

impl TradingContext {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        clock: Arc<dyn Clock>,
        calendar: MarketCalendar,
        params: TradingParams,
        enforce_market_hours: bool,
    ) -> Self {
        Self {
            store,
            oracle,
            clock,
            calendar,
            policy: MarketHoursPolicy::new(enforce_market_hours),
            params,
            locks: AccountLocks::new(),
        }
    }

    /// A usable price for `ticker`, or `None`. Oracle failures are logged and
    /// treated as "no price".
    pub async fn quote(&self, ticker: &str) -> Option<Decimal> {
        match self.oracle.get_price(ticker).await {
            Ok(Some(price)) if price > Decimal::ZERO => Some(price),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(ticker, error = %e, "Price oracle lookup failed");
                None
            }
        }
    }

    /// Quotes each distinct ticker once, concurrently. Tickers without a
    /// usable price are absent from the result.
    pub async fn quote_all<'a, I>(&self, tickers: I) -> HashMap<String, Decimal>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<&str> = tickers.into_iter().collect();
        join_all(
            unique
                .into_iter()
                .map(|ticker| async move { (ticker.to_string(), self.quote(ticker).await) }),
        )
        .await
        .into_iter()
        .filter_map(|(ticker, price)| price.map(|p| (ticker, p)))
        .collect()
    }

    /// Stores an alert if `price` moved enough since `previous`.
    ///
    /// The trade it belongs to is already committed, so a failure here is
    /// logged rather than returned.
    pub(crate) async fn raise_alert(
        &self,
        account_id: AccountId,
        ticker: &str,
        previous: Option<&Trade>,
        price: Decimal,
    ) -> Option<PriceAlert> {
        let alert = evaluate_price_move(
            account_id,
            ticker,
            previous,
            price,
            self.params.alert_threshold_pct,
            self.clock.now(),
        )?;
        match self.store.save_alert(alert).await {
            Ok(alert) => {
                tracing::info!(
                    account_id,
                    ticker,
                    change_percent = %alert.change_percent,
                    "Price alert raised"
                );
                Some(alert)
            }
            Err(e) => {
                tracing::warn!(account_id, ticker, error = %e, "Failed to store price alert");
                None
            }
        }
    }
}

/// Outcome of an executed market order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub trade: Trade,
    pub price: Decimal,
    /// `price * shares` before commission.
    pub gross: Decimal,
    pub commission: Decimal,
    /// Cash actually moved; equals `trade.total`.
    pub amount: Decimal,
    pub cash_after: Decimal,
    pub alert: Option<PriceAlert>,
}

/// Executes market orders immediately against the oracle price.
#[derive(Clone)]
pub struct ExecutionEngine {
    ctx: Arc<TradingContext>,
}

impl ExecutionEngine {
    pub fn new(ctx: Arc<TradingContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<TradingContext> {
        &self.ctx
    }

    pub async fn execute_market_order(
        &self,
        account_id: AccountId,
        ticker: &str,
        side: OrderSide,
        shares: i64,
    ) -> Result<ExecutionResult, ExecutorError> {
        if shares <= 0 {
            return Err(ExecutorError::InvalidInput(format!(
                "shares must be positive, got {shares}"
            )));
        }
        let ticker = normalize_ticker(ticker)?;

        let ctx = &self.ctx;
        let submitted_at = ctx.clock.now();
        if ctx.policy.is_enforced() && !ctx.calendar.is_open(submitted_at) {
            return Err(ExecutorError::MarketClosed {
                next_open: ctx.calendar.next_open(submitted_at),
                hint: ctx.calendar.next_open_hint(submitted_at),
            });
        }

        // The quote is fetched before the account is locked so a slow oracle
        // never holds up other orders on the same account.
        let price = ctx
            .quote(&ticker)
            .await
            .ok_or_else(|| ExecutorError::UnknownTicker(ticker.clone()))?;

        let _guard = ctx.locks.acquire(account_id).await;
        // Stamped under the lock so timestamps follow append order.
        let executed_at = ctx.clock.now();

        let account = ctx
            .store
            .find_account(account_id)
            .await?
            .ok_or(ExecutorError::AccountNotFound(account_id))?;

        let gross = price * Decimal::from(shares);
        let commission = gross * ctx.params.commission_pct;
        let (amount, cash_after) = match side {
            OrderSide::Buy => {
                let required = gross + commission;
                if account.cash < required {
                    return Err(ExecutorError::InsufficientFunds {
                        required,
                        available: account.cash,
                        shortfall: required - account.cash,
                    });
                }
                (required, account.cash - required)
            }
            OrderSide::Sell => {
                let trades = ctx.store.trades_for_account(account_id).await?;
                let owned = owned_shares(&trades, &ticker);
                if owned < shares {
                    return Err(ExecutorError::InsufficientShares {
                        ticker,
                        requested: shares,
                        owned,
                    });
                }
                let proceeds = gross - commission;
                (proceeds, account.cash + proceeds)
            }
        };

        let previous = ctx.store.last_trade_for_ticker(account_id, &ticker).await?;
        let trade = ctx
            .store
            .record_trade(
                NewTrade {
                    account_id,
                    ticker: ticker.clone(),
                    side,
                    shares,
                    price,
                    total: amount,
                    source: TradeSource::Market,
                    executed_at,
                },
                account.cash,
                cash_after,
            )
            .await?;

        tracing::info!(
            account_id,
            trade_id = trade.id,
            ticker = %ticker,
            %side,
            shares,
            %price,
            total = %amount,
            cash_after = %cash_after,
            "Market order executed"
        );

        let alert = ctx
            .raise_alert(account_id, &ticker, previous.as_ref(), price)
            .await;

        Ok(ExecutionResult {
            trade,
            price,
            gross,
            commission,
            amount,
            cash_after,
            alert,
        })
    }
}
