//! Policy for what a tree instance should do in response to transaction
//! lifecycle events and accumulated mutations. This module only decides
//! *what* to do; `Tree` (see `tree/mod.rs`) is the `Observer` that actually
//! carries the action out against its `TreeEngine`.

use crate::config::TreeConfig;
use crate::txn::TxEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    None,
    FlushCommitBuffer,
    RekeyCacheFromCommit,
    RollbackReload,
    FlushAndClear,
}

pub struct LifecycleAdapter {
    max_updates_before_save: u64,
    mutation_counter: u64,
}

impl LifecycleAdapter {
    pub fn new(config: &TreeConfig) -> Self {
        LifecycleAdapter { max_updates_before_save: config.max_updates_before_save, mutation_counter: 0 }
    }

    /// Called after every mutating operation. Returns whether the
    /// accumulated mutation count should trigger a lazy-save now.
    pub fn on_mutation(&mut self) -> bool {
        if self.max_updates_before_save == 0 {
            return false;
        }
        self.mutation_counter += 1;
        if self.mutation_counter >= self.max_updates_before_save {
            self.mutation_counter = 0;
            true
        } else {
            false
        }
    }

    pub fn action_for(&self, event: TxEvent) -> LifecycleAction {
        match event {
            TxEvent::Open => LifecycleAction::None,
            TxEvent::PreCommit => LifecycleAction::FlushCommitBuffer,
            TxEvent::PostCommit => LifecycleAction::RekeyCacheFromCommit,
            TxEvent::Rollback => LifecycleAction::RollbackReload,
            TxEvent::Close => LifecycleAction::FlushAndClear,
        }
    }
}
