use super::block::Block;
use super::clock::Clock;
use super::crypto::{Address, CryptoError, DigitalSignature, KeyPair, Signer};
use super::transaction::{Amount, Transaction, TransactionError};

/// Read access to who is sending and how much they hold right now
pub trait BalanceSource {
    /// The sender's address
    fn address(&self) -> &Address;

    /// The sender's current balance
    fn balance(&self) -> Amount;
}

/// Everything a transaction needs from the party sending it
pub trait SenderWallet: BalanceSource + Signer {}

impl<T> SenderWallet for T where T: BalanceSource + Signer + ?Sized {}

/// A key pair plus the balance it is known to hold
#[derive(Debug, Clone)]
pub struct Wallet {
    key_pair: KeyPair,
    starting_balance: Amount,
    balance: Amount,
}

impl Wallet {
    /// Creates a wallet with a fresh key pair
    pub fn new(starting_balance: Amount) -> Self {
        Self::from_key_pair(KeyPair::generate(), starting_balance)
    }

    /// Wraps an existing key pair
    pub fn from_key_pair(key_pair: KeyPair, starting_balance: Amount) -> Self {
        Wallet {
            key_pair,
            starting_balance,
            balance: starting_balance,
        }
    }

    /// Recomputes the balance from `chain`
    pub fn refresh_balance(&mut self, chain: &[Block]) -> Amount {
        self.balance = Self::calculate_balance(chain, self.key_pair.address(), self.starting_balance);
        self.balance
    }

    /// Creates a signed transaction to `recipient`.
    ///
    /// When `chain` is given the balance is brought up to date with it first.
    pub fn create_transaction(
        &mut self,
        recipient: Address,
        amount: Amount,
        chain: Option<&[Block]>,
        clock: &dyn Clock,
    ) -> Result<Transaction, TransactionError> {
        if let Some(chain) = chain {
            self.refresh_balance(chain);
        }

        Transaction::create(&*self, recipient, amount, clock)
    }

    /// Balance of `address` according to `chain`.
    ///
    /// Walks back from the newest block. The latest block in which `address`
    /// sent a transaction fixes the balance at its change output; outputs to
    /// `address` in that block and in later blocks are added on top. An address
    /// that never sent anything holds `starting_balance` plus everything it
    /// received.
    pub fn calculate_balance(chain: &[Block], address: &Address, starting_balance: Amount) -> Amount {
        let mut has_sent = false;
        let mut outputs_total: Amount = 0;

        // Genesis carries no transfers
        for block in chain.iter().skip(1).rev() {
            for transaction in &block.data {
                if &transaction.input.address == address {
                    has_sent = true;
                }

                if let Some(amount) = transaction.output_map.get(address) {
                    outputs_total = outputs_total.saturating_add(*amount);
                }
            }

            if has_sent {
                break;
            }
        }

        if has_sent {
            outputs_total
        } else {
            starting_balance.saturating_add(outputs_total)
        }
    }
}

impl BalanceSource for Wallet {
    fn address(&self) -> &Address {
        self.key_pair.address()
    }

    fn balance(&self) -> Amount {
        self.balance
    }
}

impl Signer for Wallet {
    fn sign(&self, message: &[u8]) -> Result<DigitalSignature, CryptoError> {
        self.key_pair.sign(message)
    }
}
