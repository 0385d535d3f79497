pub mod amount;
pub mod csv;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod program;

pub use amount::Amount;
pub use engine::{Command, EarnOutcome, Engine, EngineError};
pub use ledger::{Ledger, LoyaltySnapshot};
pub use model::{MerchantId, UserId};
pub use program::{LoyaltyProgram, ProgramConfig, ProgramRegistry};
