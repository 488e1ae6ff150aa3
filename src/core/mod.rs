pub mod account;
pub mod spend;

pub use account::AccountKind;
pub use spend::CategorySummary;
