//! Transaction lifecycle events. No global listener registry (§9 design
//! note): a `TransactionContext` owns an explicit vector of observers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    Open,
    PreCommit,
    PostCommit,
    Rollback,
    Close,
}

/// Something that reacts to transaction lifecycle events — the
/// `LifecycleAdapter` is the only observer this crate ships, but the trait
/// keeps the transaction context decoupled from any specific tree.
pub trait Observer {
    fn on_event(&mut self, event: TxEvent);
}

#[derive(Default)]
pub struct TransactionContext {
    observers: Vec<Box<dyn Observer>>,
}

impl TransactionContext {
    pub fn new() -> Self {
        TransactionContext { observers: Vec::new() }
    }

    pub fn register(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn emit(&mut self, event: TxEvent) {
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }

    pub fn open(&mut self) {
        self.emit(TxEvent::Open);
    }

    pub fn pre_commit(&mut self) {
        self.emit(TxEvent::PreCommit);
    }

    pub fn post_commit(&mut self) {
        self.emit(TxEvent::PostCommit);
    }

    pub fn rollback(&mut self) {
        self.emit(TxEvent::Rollback);
    }

    pub fn close(&mut self) {
        self.emit(TxEvent::Close);
    }
}
