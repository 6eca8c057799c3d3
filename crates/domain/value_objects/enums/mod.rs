pub mod interval_units;
pub mod order_statuses;
pub mod transaction_statuses;
