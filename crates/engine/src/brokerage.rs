use crate::accounts::{check_password_strength, hash_password, normalize_username, verify_password};
use crate::error::BrokerageError;
use analytics::{
    AnalyticsEngine, CashMovement, LeaderboardEntry, PortfolioValuation, TickerPnl, TradingStats,
    UnrealizedPosition,
};
use api_client::PriceOracle;
use configuration::Config;
use core_types::{
    Account, AccountId, AlertId, Clock, LimitOrder, OrderId, OrderSide, PriceAlert, Trade,
};
use database::{DbError, LedgerStore};
use executor::{
    ExecutionEngine, ExecutionResult, LimitOrderMatcher, MarketCalendar, MarketStatus,
    TradingContext, TradingParams, open_positions,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// The single entry point to the simulated brokerage.
///
/// Every account-facing operation goes through here: registration and login,
/// market and limit orders, and the read-side reports.
pub struct Brokerage {
    ctx: Arc<TradingContext>,
    engine: ExecutionEngine,
    matcher: LimitOrderMatcher,
    analytics: AnalyticsEngine,
}

impl Brokerage {
    pub fn new(ctx: Arc<TradingContext>) -> Self {
        Self {
            engine: ExecutionEngine::new(ctx.clone()),
            matcher: LimitOrderMatcher::new(ctx.clone()),
            analytics: AnalyticsEngine::new(),
            ctx,
        }
    }

    /// Wires a brokerage from loaded configuration.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BrokerageError> {
        let calendar = MarketCalendar::from_config(&config.market_hours)?;
        let ctx = TradingContext::new(
            store,
            oracle,
            clock,
            calendar,
            TradingParams::from(&config.trading),
            config.market_hours.enforce,
        );
        Ok(Self::new(Arc::new(ctx)))
    }

    pub fn context(&self) -> &Arc<TradingContext> {
        &self.ctx
    }

    // --- Accounts ---

    /// Opens an account funded with the configured starting capital.
    pub async fn register(&self, username: &str, password: &str) -> Result<Account, BrokerageError> {
        let username = normalize_username(username)?;
        check_password_strength(password)?;

        let account = self
            .ctx
            .store
            .create_account(
                &username,
                &hash_password(password)?,
                self.ctx.params.starting_capital,
                self.ctx.clock.now(),
            )
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => BrokerageError::UsernameTaken(username.clone()),
                other => BrokerageError::Database(other),
            })?;

        tracing::info!(account_id = account.id, username = %account.username, "Account registered");
        Ok(account)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Account, BrokerageError> {
        let account = self
            .ctx
            .store
            .find_account_by_username(username.trim())
            .await?
            .ok_or(BrokerageError::Auth)?;
        if !verify_password(password, &account.password_hash) {
            tracing::warn!(username = %account.username, "Failed login");
            return Err(BrokerageError::Auth);
        }
        Ok(account)
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account, BrokerageError> {
        self.ctx
            .store
            .find_account(account_id)
            .await?
            .ok_or(BrokerageError::AccountNotFound(account_id))
    }

    // --- Orders ---

    pub async fn market_order(
        &self,
        account_id: AccountId,
        ticker: &str,
        side: OrderSide,
        shares: i64,
    ) -> Result<ExecutionResult, BrokerageError> {
        Ok(self
            .engine
            .execute_market_order(account_id, ticker, side, shares)
            .await?)
    }

    pub async fn create_limit_order(
        &self,
        account_id: AccountId,
        ticker: &str,
        side: OrderSide,
        shares: i64,
        limit_price: Decimal,
    ) -> Result<LimitOrder, BrokerageError> {
        Ok(self
            .matcher
            .create_limit_order(account_id, ticker, side, shares, limit_price)
            .await?)
    }

    pub async fn cancel_limit_order(&self, order_id: OrderId) -> Result<LimitOrder, BrokerageError> {
        Ok(self.matcher.cancel_limit_order(order_id).await?)
    }

    pub async fn pending_limit_orders(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LimitOrder>, BrokerageError> {
        self.account(account_id).await?;
        Ok(self.matcher.pending_orders(account_id).await?)
    }

    /// One matching pass over every pending limit order.
    pub async fn check_limit_orders(&self) -> Result<usize, BrokerageError> {
        Ok(self.matcher.check_limit_orders().await?)
    }

    // --- Reports ---

    pub async fn portfolio(&self, account_id: AccountId) -> Result<PortfolioValuation, BrokerageError> {
        let account = self.account(account_id).await?;
        self.valuation_of(&account).await
    }

    /// Open positions marked to market, with unrealized P&L and portfolio weights.
    pub async fn portfolio_analytics(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<UnrealizedPosition>, BrokerageError> {
        self.account(account_id).await?;
        let trades = self.ctx.store.trades_for_account(account_id).await?;
        let holdings = open_positions(&trades);
        let prices = self.ctx.quote_all(holdings.keys().map(String::as_str)).await;
        Ok(self.analytics.unrealized(&holdings, &prices)?)
    }

    pub async fn trading_stats(&self, account_id: AccountId) -> Result<TradingStats, BrokerageError> {
        let trades = self.trades_of(account_id).await?;
        Ok(self
            .analytics
            .trading_stats(&trades, self.ctx.params.starting_capital))
    }

    pub async fn realized_pnl(&self, account_id: AccountId) -> Result<Vec<TickerPnl>, BrokerageError> {
        let trades = self.trades_of(account_id).await?;
        Ok(self.analytics.realized_pnl(&trades))
    }

    /// All trades of the account, newest first.
    pub async fn trade_history(&self, account_id: AccountId) -> Result<Vec<Trade>, BrokerageError> {
        let mut trades = self.trades_of(account_id).await?;
        trades.reverse();
        Ok(trades)
    }

    /// Running cash after every trade, oldest first. The opening balance is
    /// reconstructed from the current cash so the last row always matches it.
    pub async fn cash_history(&self, account_id: AccountId) -> Result<Vec<CashMovement>, BrokerageError> {
        let account = self.account(account_id).await?;
        let trades = self.ctx.store.trades_for_account(account_id).await?;
        let net: Decimal = trades.iter().map(Trade::cash_delta).sum();
        Ok(self.analytics.cash_history(&trades, account.cash - net))
    }

    /// Every account ranked by total value. Each distinct ticker is quoted once
    /// for the whole board.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, BrokerageError> {
        let accounts = self.ctx.store.list_accounts().await?;
        let mut books = Vec::with_capacity(accounts.len());
        for account in accounts {
            let trades = self.ctx.store.trades_for_account(account.id).await?;
            books.push((account, open_positions(&trades)));
        }

        let prices = self
            .ctx
            .quote_all(
                books
                    .iter()
                    .flat_map(|(_, holdings)| holdings.keys().map(String::as_str)),
            )
            .await;

        let mut valuations = Vec::with_capacity(books.len());
        for (account, holdings) in books {
            let valuation = self.analytics.portfolio_valuation(
                account.cash,
                &holdings,
                &prices,
                self.ctx.params.starting_capital,
            )?;
            valuations.push((account.id, account.username, valuation));
        }
        Ok(self.analytics.leaderboard(valuations))
    }

    // --- Alerts ---

    /// Unread alerts, newest first.
    pub async fn alerts(&self, account_id: AccountId) -> Result<Vec<PriceAlert>, BrokerageError> {
        self.account(account_id).await?;
        Ok(self.ctx.store.alerts_for_account(account_id, true).await?)
    }

    pub async fn mark_alert_read(&self, alert_id: AlertId) -> Result<(), BrokerageError> {
        if !self.ctx.store.mark_alert_read(alert_id).await? {
            return Err(BrokerageError::AlertNotFound(alert_id));
        }
        Ok(())
    }

    // --- Market hours ---

    pub fn market_status(&self) -> MarketStatus {
        self.ctx.calendar.status(self.ctx.clock.now())
    }

    /// Turns the market-hours gate for market orders on or off until restart.
    pub fn set_market_hours_enforcement(&self, enforce: bool) {
        self.ctx.policy.set_enforced(enforce);
    }

    pub fn market_hours_enforcement(&self) -> bool {
        self.ctx.policy.is_enforced()
    }

    async fn trades_of(&self, account_id: AccountId) -> Result<Vec<Trade>, BrokerageError> {
        self.account(account_id).await?;
        Ok(self.ctx.store.trades_for_account(account_id).await?)
    }

    async fn valuation_of(&self, account: &Account) -> Result<PortfolioValuation, BrokerageError> {
        let trades = self.ctx.store.trades_for_account(account.id).await?;
        let holdings = open_positions(&trades);
        let prices = self.ctx.quote_all(holdings.keys().map(String::as_str)).await;
        Ok(self.analytics.portfolio_valuation(
            account.cash,
            &holdings,
            &prices,
            self.ctx.params.starting_capital,
        )?)
    }
}
