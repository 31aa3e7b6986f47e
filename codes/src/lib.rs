pub mod collection;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod migrate;
pub mod redeem;
pub mod run;
pub mod status;
pub mod store;
pub mod types;

pub use collection::Collection;
pub use error::CodesError;
pub use redeem::Redeemer;
pub use redeem::RedemptionClient;
pub use redeem::RunSignal;
pub use status::Status;
pub use types::Game;
pub use types::Platform;
pub use types::Scope;
pub use types::ShiftCode;

#[cfg(test)]
mod testing;
