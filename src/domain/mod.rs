mod account;
mod ledger;
mod money;
mod transaction;

pub use account::*;
pub use ledger::*;
pub use money::*;
pub use transaction::*;
