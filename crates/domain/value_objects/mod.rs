pub mod enums;
pub mod installments;
pub mod money;
pub mod orders;
pub mod transactions;
