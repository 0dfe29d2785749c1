//! Role state machine for HTLC transactions
//!
//! `Transaction<C>` is empty until a role builder fills `fee` and the
//! chain-native transaction in one step; `sign` adds the signature once.

use std::ops::{Deref, DerefMut};
use tracing::info;

use crate::core::{Role, Solver, Spend, SwapChain, TransactionType};
use crate::error::{Result, SwapError};
use crate::raw::TransactionRaw;
use crate::units;

struct Built<C: SwapChain> {
    fee: u64,
    transaction: C::Transaction,
    signature: Option<C::Signature>,
}

/// HTLC transaction of one role on one chain
pub struct Transaction<C: SwapChain> {
    chain: C,
    role: Role,
    built: Option<Built<C>>,
}

impl<C: SwapChain> Transaction<C> {
    pub fn new(chain: C, role: Role) -> Self {
        Self {
            chain,
            role,
            built: None,
        }
    }

    /// Restores a transaction from its raw encoding.
    ///
    /// The raw must be tagged for this chain and network; its role becomes the
    /// transaction's role.
    pub fn from_raw(chain: C, transaction_raw: &str) -> Result<Self> {
        let (raw, tag) =
            TransactionRaw::<C::Transaction, C::Signature>::decode(transaction_raw, chain.kind())?;
        if raw.network != chain.network() {
            return Err(SwapError::Network(format!(
                "transaction raw is for '{}', chain is '{}'",
                raw.network,
                chain.network()
            )));
        }
        if tag.signed != raw.signature.is_some() {
            return Err(SwapError::InvalidTransactionRaw);
        }
        Ok(Self {
            chain,
            role: tag.role,
            built: Some(Built {
                fee: raw.fee,
                transaction: raw.transaction,
                signature: raw.signature,
            }),
        })
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn network(&self) -> &str {
        self.chain.network()
    }

    fn built(&self) -> Result<&Built<C>> {
        self.built.as_ref().ok_or(SwapError::NotBuilt)
    }

    /// Estimates, assembles and records a drafted transaction.
    ///
    /// State is only replaced once every step succeeded.
    pub(crate) async fn complete(&mut self, mut draft: C::Draft) -> Result<()> {
        let fee = self.chain.estimate_fee(&mut draft).await?;
        let transaction = self.chain.assemble(draft, fee)?;
        self.built = Some(Built {
            fee,
            transaction,
            signature: None,
        });
        info!(
            "Built {} {} transaction on {} (fee {})",
            self.chain.kind(),
            self.role,
            self.chain.network(),
            fee
        );
        Ok(())
    }

    /// Signs the built transaction with a solver of this transaction's role.
    pub fn sign<S: Solver<C>>(&mut self, solver: &S) -> Result<&mut Self> {
        let built = self.built.as_ref().ok_or(SwapError::NotBuilt)?;
        if built.signature.is_some() {
            return Err(SwapError::AlreadySigned);
        }
        if solver.role() != self.role {
            return Err(SwapError::wrong_solver(
                self.role.solver_name(),
                solver.role().solver_name(),
            ));
        }
        let keys = solver.solve(&self.chain)?;
        let signature = self
            .chain
            .sign_transaction(self.role, &built.transaction, &keys)?;
        if let Some(built) = self.built.as_mut() {
            built.signature = Some(signature);
        }
        info!(
            "Signed {} {} transaction {}",
            self.chain.kind(),
            self.role,
            self.hash()?
        );
        Ok(self)
    }

    /// Fee in the chain's smallest unit
    pub fn fee(&self) -> Result<u64> {
        Ok(self.built()?.fee)
    }

    /// Fee expressed in `unit` (e.g. `"BTC"`, `"Gwei"`, `"NEU"`)
    pub fn fee_in(&self, unit: &str) -> Result<f64> {
        units::from_smallest(self.chain.units(), u128::from(self.fee()?), unit)
    }

    /// Chain-native transaction object
    pub fn json(&self) -> Result<&C::Transaction> {
        Ok(&self.built()?.transaction)
    }

    pub fn signature(&self) -> Result<Option<&C::Signature>> {
        Ok(self.built()?.signature.as_ref())
    }

    pub fn hash(&self) -> Result<String> {
        let built = self.built()?;
        self.chain
            .transaction_hash(&built.transaction, built.signature.as_ref())
    }

    pub fn raw(&self) -> Result<String> {
        let built = self.built()?;
        self.chain
            .raw_transaction(&built.transaction, built.signature.as_ref())
    }

    pub fn is_signed(&self) -> bool {
        matches!(&self.built, Some(built) if built.signature.is_some())
    }

    /// Type tag, e.g. `vapor_refund_signed`
    pub fn kind(&self) -> Result<String> {
        let built = self.built()?;
        Ok(TransactionType {
            chain: self.chain.kind(),
            role: self.role,
            signed: built.signature.is_some(),
        }
        .to_string())
    }

    pub fn transaction_raw(&self) -> Result<String> {
        let built = self.built()?;
        TransactionRaw {
            fee: built.fee,
            transaction: &built.transaction,
            signature: built.signature.as_ref(),
            network: self.chain.network().to_string(),
            kind: self.kind()?,
        }
        .encode()
    }

    /// Submits the signed transaction, returning the chain's transaction id.
    pub async fn submit(&self) -> Result<String> {
        let built = self.built()?;
        let signature = built
            .signature
            .as_ref()
            .ok_or_else(|| SwapError::Value("transaction is not signed".to_string()))?;
        self.chain.submit(&built.transaction, signature).await
    }
}

/// Submits a signed transaction raw of chain family `C`.
pub async fn submit_transaction_raw<C: SwapChain>(chain: C, transaction_raw: &str) -> Result<String> {
    let transaction = Transaction::from_raw(chain, transaction_raw)?;
    transaction.submit().await
}

// ============================================================================
// ROLE BUILDERS
// ============================================================================

macro_rules! role_transaction {
    ($name:ident, $role:expr) => {
        pub struct $name<C: SwapChain>(Transaction<C>);

        impl<C: SwapChain> $name<C> {
            pub fn new(chain: C) -> Self {
                Self(Transaction::new(chain, $role))
            }

            pub fn into_inner(self) -> Transaction<C> {
                self.0
            }
        }

        impl<C: SwapChain> Deref for $name<C> {
            type Target = Transaction<C>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<C: SwapChain> DerefMut for $name<C> {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

role_transaction!(FundTransaction, Role::Fund);
role_transaction!(WithdrawTransaction, Role::Withdraw);
role_transaction!(RefundTransaction, Role::Refund);

impl<C: SwapChain> FundTransaction<C> {
    /// Builds the transaction locking `amount` into `htlc`.
    ///
    /// `address` must be the HTLC's sender.
    pub async fn build_transaction(
        &mut self,
        address: &str,
        htlc: &C::Htlc,
        amount: C::Amount,
    ) -> Result<&mut Self> {
        info!("Building fund transaction from {} for {}", address, amount);
        let draft = self.0.chain.prepare_fund(address, htlc, amount).await?;
        self.0.complete(draft).await?;
        Ok(self)
    }
}

impl<C: SwapChain> WithdrawTransaction<C> {
    /// Builds the transaction releasing the HTLC funded by `transaction_hash`
    /// to `address` with the secret preimage.
    pub async fn build_transaction(
        &mut self,
        transaction_hash: &str,
        address: &str,
        secret: &str,
        htlc: Option<&C::Htlc>,
    ) -> Result<&mut Self> {
        info!("Building withdraw transaction for funding {}", transaction_hash);
        let spend = Spend {
            transaction_hash,
            address,
            secret: Some(secret),
            htlc,
        };
        let draft = self.0.chain.prepare_spend(Role::Withdraw, spend).await?;
        self.0.complete(draft).await?;
        Ok(self)
    }
}

impl<C: SwapChain> RefundTransaction<C> {
    /// Builds the transaction returning the HTLC funded by `transaction_hash`
    /// to its sender `address` after the timelock.
    pub async fn build_transaction(
        &mut self,
        transaction_hash: &str,
        address: &str,
        htlc: Option<&C::Htlc>,
    ) -> Result<&mut Self> {
        info!("Building refund transaction for funding {}", transaction_hash);
        let spend = Spend {
            transaction_hash,
            address,
            secret: None,
            htlc,
        };
        let draft = self.0.chain.prepare_spend(Role::Refund, spend).await?;
        self.0.complete(draft).await?;
        Ok(self)
    }
}
