//! EVM solvers
//!
//! Every role signs the same way on EVM chains; the solvers only differ in the
//! role they are allowed to sign.

use super::{Evm, EvmKeys};
use crate::core::{KeySource, Role, Solver};
use crate::error::Result;
use crate::wallet::Bip32Wallet;

macro_rules! evm_solver {
    ($(#[$doc:meta])* $name:ident, $role:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            key: KeySource,
        }

        impl $name {
            /// Solver for the key at account 0, external chain, address 0
            pub fn new(xprivate_key: &str) -> Self {
                Self {
                    key: KeySource::new(xprivate_key),
                }
            }

            pub fn with_path(mut self, path: &str) -> Self {
                self.key = self.key.with_path(path);
                self
            }

            pub fn with_indexes(mut self, account: u32, change: bool, address: u32) -> Self {
                self.key = self.key.with_indexes(account, change, address);
                self
            }
        }

        impl Solver<Evm> for $name {
            fn role(&self) -> Role {
                $role
            }

            fn solve(&self, chain: &Evm) -> Result<EvmKeys> {
                let wallet = Bip32Wallet::from_xprivate_key(self.key.xprivate_key())?
                    .from_path(&self.key.path(chain.bip44_template()))?;
                EvmKeys::from_wallet(&wallet)
            }
        }
    };
}

evm_solver!(
    /// Signs HTLC fund transactions
    FundSolver,
    Role::Fund
);
evm_solver!(
    /// Signs HTLC withdraw transactions
    WithdrawSolver,
    Role::Withdraw
);
evm_solver!(
    /// Signs HTLC refund transactions
    RefundSolver,
    Role::Refund
);
