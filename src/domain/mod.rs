pub mod derivation;
pub mod treasury;
pub mod withdrawal_job;

pub use derivation::{AddressDeriver, DerivedWallet};
pub use treasury::TreasuryContext;
pub use withdrawal_job::{JobStatus, WithdrawalJob};
