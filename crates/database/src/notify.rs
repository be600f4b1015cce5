//! Per-table change notification
//!
//! Each cache table has a `watch` channel carrying a version counter. Writers
//! bump the counter; observers wake up, re-query and see the latest state.
//! Several bumps between two wake-ups are seen as one.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Cache tables observable through [`ChangeNotifier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Products,
    Users,
    Orders,
    OrderLines,
    Routes,
    RouteOrders,
    LocationPings,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Products,
        Table::Users,
        Table::Orders,
        Table::OrderLines,
        Table::Routes,
        Table::RouteOrders,
        Table::LocationPings,
    ];

    /// SQL table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Products => "products",
            Table::Users => "users",
            Table::Orders => "orders",
            Table::OrderLines => "order_lines",
            Table::Routes => "routes",
            Table::RouteOrders => "route_orders",
            Table::LocationPings => "location_pings",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Version counters for every cache table
///
/// Clones share the same channels. Receivers see the channel close once every
/// clone has been dropped.
#[derive(Clone)]
pub struct ChangeNotifier {
    senders: Arc<Vec<watch::Sender<u64>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let senders = Table::ALL
            .iter()
            .map(|_| watch::channel(0u64).0)
            .collect();
        Self {
            senders: Arc::new(senders),
        }
    }

    /// Records a change to `table`
    pub fn notify(&self, table: Table) {
        // send_modify updates the value even when nobody is subscribed
        self.senders[table.index()].send_modify(|version| *version = version.wrapping_add(1));
        log::trace!("Table {} changed", table);
    }

    /// Records a change to several tables
    pub fn notify_all(&self, tables: &[Table]) {
        for table in tables {
            self.notify(*table);
        }
    }

    /// Receiver that wakes on the next change to `table`
    pub fn subscribe(&self, table: Table) -> watch::Receiver<u64> {
        self.senders[table.index()].subscribe()
    }

    /// Current version of `table`
    pub fn version(&self, table: Table) -> u64 {
        *self.senders[table.index()].borrow()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let versions: Vec<(&str, u64)> = Table::ALL
            .iter()
            .map(|t| (t.name(), self.version(*t)))
            .collect();
        f.debug_struct("ChangeNotifier")
            .field("versions", &versions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_bumps_only_that_table() {
        let notifier = ChangeNotifier::new();
        notifier.notify(Table::Products);
        notifier.notify(Table::Products);

        assert_eq!(notifier.version(Table::Products), 2);
        assert_eq!(notifier.version(Table::Orders), 0);
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_change() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe(Table::Routes);

        notifier.notify_all(&[Table::Routes, Table::RouteOrders]);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn test_rapid_changes_coalesce() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe(Table::Users);

        for _ in 0..5 {
            notifier.notify(Table::Users);
        }
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 5);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_channel_closes_when_dropped() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe(Table::Products);
        drop(notifier);

        assert!(rx.changed().await.is_err());
    }

    #[test]
    fn test_table_names_match_schema() {
        for (table, name) in Table::ALL.iter().zip(crate::migrations::TABLES.iter()) {
            assert_eq!(table.name(), *name);
        }
    }
}
