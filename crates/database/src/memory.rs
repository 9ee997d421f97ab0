use crate::error::DbError;
use crate::store::LedgerStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Account, AccountId, AlertId, LimitOrder, LimitOrderStatus, NewLimitOrder, NewPriceAlert,
    NewTrade, OrderId, PriceAlert, Trade,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    trades: Vec<Trade>,
    orders: BTreeMap<OrderId, LimitOrder>,
    alerts: Vec<PriceAlert>,
    next_account_id: AccountId,
    next_trade_id: i64,
    next_order_id: OrderId,
    next_alert_id: AlertId,
}

impl State {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    /// Checks the compare-and-set precondition and applies the cash update.
    fn swap_cash(
        &mut self,
        account_id: AccountId,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<(), DbError> {
        let account = self.accounts.get_mut(&account_id).ok_or(DbError::NotFound)?;
        if account.cash != expected_cash {
            return Err(DbError::Conflict(format!(
                "cash of account {account_id} changed from {expected_cash} to {}",
                account.cash
            )));
        }
        account.cash = cash_after;
        Ok(())
    }

    fn append_trade(&mut self, trade: NewTrade) -> Trade {
        let id = Self::next_id(&mut self.next_trade_id);
        let trade = Trade::from_new(id, trade);
        self.trades.push(trade.clone());
        trade
    }
}

/// A process-local `LedgerStore`. Every operation takes one lock over the
/// whole state, which makes each of them trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn append_order(a: &Trade, b: &Trade) -> std::cmp::Ordering {
    a.id.cmp(&b.id)
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        cash: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<Account, DbError> {
        let mut state = self.write();
        if state.accounts.values().any(|a| a.username == username) {
            return Err(DbError::Conflict(format!("username '{username}' is taken")));
        }
        let id = State::next_id(&mut state.next_account_id);
        let account = Account {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            cash,
            created_at,
        };
        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn find_account(&self, account_id: AccountId) -> Result<Option<Account>, DbError> {
        Ok(self.read().accounts.get(&account_id).cloned())
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
        Ok(self
            .read()
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
        Ok(self.read().accounts.values().cloned().collect())
    }

    async fn trades_for_account(&self, account_id: AccountId) -> Result<Vec<Trade>, DbError> {
        let mut trades: Vec<Trade> = self
            .read()
            .trades
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        trades.sort_by(append_order);
        Ok(trades)
    }

    async fn last_trade_for_ticker(
        &self,
        account_id: AccountId,
        ticker: &str,
    ) -> Result<Option<Trade>, DbError> {
        Ok(self
            .read()
            .trades
            .iter()
            .filter(|t| t.account_id == account_id && t.ticker == ticker)
            .max_by(|a, b| append_order(a, b))
            .cloned())
    }

    async fn record_trade(
        &self,
        trade: NewTrade,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<Trade, DbError> {
        let mut state = self.write();
        state.swap_cash(trade.account_id, expected_cash, cash_after)?;
        Ok(state.append_trade(trade))
    }

    async fn create_limit_order(&self, order: NewLimitOrder) -> Result<LimitOrder, DbError> {
        let mut state = self.write();
        if !state.accounts.contains_key(&order.account_id) {
            return Err(DbError::NotFound);
        }
        let id = State::next_id(&mut state.next_order_id);
        let order = LimitOrder::from_new(id, order);
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn find_limit_order(&self, order_id: OrderId) -> Result<Option<LimitOrder>, DbError> {
        Ok(self.read().orders.get(&order_id).cloned())
    }

    async fn pending_limit_orders(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<LimitOrder>, DbError> {
        Ok(self
            .read()
            .orders
            .values()
            .filter(|o| o.is_pending())
            .filter(|o| account_id.is_none_or(|id| o.account_id == id))
            .cloned()
            .collect())
    }

    async fn cancel_limit_order(&self, order_id: OrderId) -> Result<bool, DbError> {
        let mut state = self.write();
        match state.orders.get_mut(&order_id) {
            Some(order) if order.is_pending() => {
                order.status = LimitOrderStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fill_limit_order(
        &self,
        order_id: OrderId,
        trade: NewTrade,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<Option<Trade>, DbError> {
        let mut state = self.write();
        let pending = state
            .orders
            .get(&order_id)
            .is_some_and(|order| order.is_pending());
        if !pending {
            return Ok(None);
        }

        state.swap_cash(trade.account_id, expected_cash, cash_after)?;
        let executed_at = trade.executed_at;
        let trade = state.append_trade(trade);
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = LimitOrderStatus::Executed;
            order.executed_at = Some(executed_at);
        }
        Ok(Some(trade))
    }

    async fn save_alert(&self, alert: NewPriceAlert) -> Result<PriceAlert, DbError> {
        let mut state = self.write();
        let id = State::next_id(&mut state.next_alert_id);
        let alert = PriceAlert::from_new(id, alert);
        state.alerts.push(alert.clone());
        Ok(alert)
    }

    async fn alerts_for_account(
        &self,
        account_id: AccountId,
        unread_only: bool,
    ) -> Result<Vec<PriceAlert>, DbError> {
        let mut alerts: Vec<PriceAlert> = self
            .read()
            .alerts
            .iter()
            .filter(|a| a.account_id == account_id && (!unread_only || !a.read))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| (b.triggered_at, b.id).cmp(&(a.triggered_at, a.id)));
        Ok(alerts)
    }

    async fn mark_alert_read(&self, alert_id: AlertId) -> Result<bool, DbError> {
        let mut state = self.write();
        match state.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_types::{OrderSide, TradeSource};
    use rust_decimal_macros::dec;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, minute, 0).unwrap()
    }

    fn buy(account_id: AccountId, ticker: &str, price: Decimal, minute: u32) -> NewTrade {
        NewTrade {
            account_id,
            ticker: ticker.to_string(),
            side: OrderSide::Buy,
            shares: 1,
            price,
            total: price,
            source: TradeSource::Market,
            executed_at: at(minute),
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = InMemoryLedger::new();
        store.create_account("ada", "h", dec!(100), at(0)).await.unwrap();
        let err = store.create_account("ada", "h", dec!(100), at(0)).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    async fn record_trade_is_compare_and_set_on_cash() {
        let store = InMemoryLedger::new();
        let account = store.create_account("ada", "h", dec!(100), at(0)).await.unwrap();

        store
            .record_trade(buy(account.id, "AAPL", dec!(10), 1), dec!(100), dec!(90))
            .await
            .unwrap();

        let stale = store
            .record_trade(buy(account.id, "AAPL", dec!(10), 2), dec!(100), dec!(90))
            .await
            .unwrap_err();
        assert!(matches!(stale, DbError::Conflict(_)));

        let account = store.find_account(account.id).await.unwrap().unwrap();
        assert_eq!(account.cash, dec!(90));
        assert_eq!(store.trades_for_account(account.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn last_trade_is_the_most_recent_of_that_ticker() {
        let store = InMemoryLedger::new();
        let account = store.create_account("ada", "h", dec!(100), at(0)).await.unwrap();
        store.record_trade(buy(account.id, "AAPL", dec!(10), 1), dec!(100), dec!(90)).await.unwrap();
        store.record_trade(buy(account.id, "MSFT", dec!(20), 2), dec!(90), dec!(70)).await.unwrap();
        store.record_trade(buy(account.id, "AAPL", dec!(12), 3), dec!(70), dec!(58)).await.unwrap();

        let last = store.last_trade_for_ticker(account.id, "AAPL").await.unwrap().unwrap();
        assert_eq!(last.price, dec!(12));
        assert!(store.last_trade_for_ticker(account.id, "TSLA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trades_are_listed_in_append_order() {
        let store = InMemoryLedger::new();
        let account = store.create_account("ada", "h", dec!(100), at(0)).await.unwrap();
        // Appended second but stamped earlier.
        store.record_trade(buy(account.id, "AAPL", dec!(10), 5), dec!(100), dec!(90)).await.unwrap();
        store.record_trade(buy(account.id, "AAPL", dec!(12), 1), dec!(90), dec!(78)).await.unwrap();

        let prices: Vec<Decimal> = store
            .trades_for_account(account.id)
            .await
            .unwrap()
            .iter()
            .map(|t| t.price)
            .collect();
        assert_eq!(prices, vec![dec!(10), dec!(12)]);

        let last = store.last_trade_for_ticker(account.id, "AAPL").await.unwrap().unwrap();
        assert_eq!(last.price, dec!(12));
    }

    #[tokio::test]
    async fn filled_or_cancelled_orders_cannot_fill_again() {
        let store = InMemoryLedger::new();
        let account = store.create_account("ada", "h", dec!(100), at(0)).await.unwrap();
        let order = store
            .create_limit_order(NewLimitOrder {
                account_id: account.id,
                ticker: "AAPL".to_string(),
                side: OrderSide::Buy,
                shares: 1,
                limit_price: dec!(10),
                created_at: at(0),
            })
            .await
            .unwrap();

        let mut trade = buy(account.id, "AAPL", dec!(9), 5);
        trade.source = TradeSource::Limit;
        let filled = store
            .fill_limit_order(order.id, trade.clone(), dec!(100), dec!(91))
            .await
            .unwrap();
        assert!(filled.is_some());

        let again = store
            .fill_limit_order(order.id, trade, dec!(91), dec!(82))
            .await
            .unwrap();
        assert!(again.is_none());
        assert!(!store.cancel_limit_order(order.id).await.unwrap());

        let order = store.find_limit_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, LimitOrderStatus::Executed);
        assert_eq!(order.executed_at, Some(at(5)));
        assert!(store.pending_limit_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unread_alerts_are_listed_newest_first() {
        let store = InMemoryLedger::new();
        let account = store.create_account("ada", "h", dec!(100), at(0)).await.unwrap();
        for minute in [1, 2, 3] {
            store
                .save_alert(NewPriceAlert {
                    account_id: account.id,
                    ticker: "AAPL".to_string(),
                    original_price: dec!(100),
                    current_price: dec!(110),
                    change_percent: dec!(10),
                    triggered_at: at(minute),
                })
                .await
                .unwrap();
        }
        assert!(store.mark_alert_read(2).await.unwrap());
        assert!(!store.mark_alert_read(99).await.unwrap());

        let unread = store.alerts_for_account(account.id, true).await.unwrap();
        let ids: Vec<_> = unread.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(store.alerts_for_account(account.id, false).await.unwrap().len(), 3);
    }
}
