use thiserror::Error;

/// Error type for account operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccountError {
    #[error("Account {0} not found")]
    NotFound(i32),

    #[error("Account store unavailable: {0}")]
    Unavailable(String),
}

pub type AccountResult<T> = Result<T, AccountError>;

/// AccountService is the business-service surface exposed next to the gateway.
///
/// The router never calls it; embedders wire their own implementation in.
pub trait AccountService: Send + Sync + 'static {
    /// Persist a new account.
    fn save_account(&self) -> AccountResult<()>;

    /// Update the account identified by `id`.
    fn update_account(&self, id: i32) -> AccountResult<()>;

    /// Delete an account, returning the number of accounts removed.
    fn delete_account(&self) -> AccountResult<i32>;
}
