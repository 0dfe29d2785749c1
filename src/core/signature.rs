//! Signing façade over unsigned transaction raws
//!
//! Lets a party that only holds an unsigned raw (not the builder instance)
//! produce the signed transaction. The output is byte-identical to signing
//! through the builder.

use tracing::info;

use crate::core::{Solver, SwapChain, Transaction};
use crate::error::{Result, SwapError};

pub struct Signature<C: SwapChain> {
    chain: C,
    transaction: Option<Transaction<C>>,
}

impl<C: SwapChain> Signature<C> {
    pub fn new(chain: C) -> Self {
        Self {
            chain,
            transaction: None,
        }
    }

    /// Signs an unsigned transaction raw.
    ///
    /// # Arguments
    ///
    /// * `transaction_raw` - Unsigned raw of this chain and network
    /// * `solver` - Solver whose role matches the raw's role
    pub fn sign<S: Solver<C>>(&mut self, transaction_raw: &str, solver: &S) -> Result<&mut Self> {
        let mut transaction = Transaction::from_raw(self.chain.clone(), transaction_raw)?;
        if transaction.is_signed() {
            return Err(SwapError::AlreadySigned);
        }
        transaction.sign(solver)?;
        info!(
            "Signature: signed {} {} raw",
            self.chain.kind(),
            transaction.role()
        );
        self.transaction = Some(transaction);
        Ok(self)
    }

    fn signed(&self) -> Result<&Transaction<C>> {
        self.transaction.as_ref().ok_or(SwapError::NotBuilt)
    }

    pub fn fee(&self) -> Result<u64> {
        self.signed()?.fee()
    }

    pub fn fee_in(&self, unit: &str) -> Result<f64> {
        self.signed()?.fee_in(unit)
    }

    pub fn json(&self) -> Result<&C::Transaction> {
        self.signed()?.json()
    }

    pub fn signature(&self) -> Result<Option<&C::Signature>> {
        self.signed()?.signature()
    }

    pub fn hash(&self) -> Result<String> {
        self.signed()?.hash()
    }

    pub fn raw(&self) -> Result<String> {
        self.signed()?.raw()
    }

    pub fn kind(&self) -> Result<String> {
        self.signed()?.kind()
    }

    pub fn transaction_raw(&self) -> Result<String> {
        self.signed()?.transaction_raw()
    }
}
