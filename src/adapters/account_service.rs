use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicI32, Ordering},
};

use crate::ports::account_service::{AccountError, AccountResult, AccountService};

/// In-memory [`AccountService`] for embedding and tests.
///
/// Accounts are plain numeric ids. `delete_account` removes the most recently
/// saved account and returns how many were removed (0 or 1).
#[derive(Debug, Default)]
pub struct InMemoryAccountService {
    next_id: AtomicI32,
    accounts: Mutex<Vec<Account>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i32,
    pub revision: u32,
}

impl InMemoryAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AccountService for InMemoryAccountService {
    fn save_account(&self) -> AccountResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Account { id, revision: 0 });
        tracing::debug!(account.id = id, "Saved account");
        Ok(())
    }

    fn update_account(&self, id: i32) -> AccountResult<()> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AccountError::NotFound(id))?;
        account.revision += 1;
        tracing::debug!(account.id = id, revision = account.revision, "Updated account");
        Ok(())
    }

    fn delete_account(&self) -> AccountResult<i32> {
        let removed = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        Ok(i32::from(removed.is_some()))
    }
}
