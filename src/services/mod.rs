pub mod events;
pub mod ledger;
pub mod pricing;
pub mod sweeper;
