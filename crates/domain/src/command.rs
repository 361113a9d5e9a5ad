//! Commands and the dispatch table that routes them to processing logic.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::error::CommandError;

/// Immutable request to change one aggregate.
pub trait Command: Send + Sync + 'static {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Command kind, used in logs, metrics and error messages.
    const NAME: &'static str;

    /// Target aggregate. Creation commands carry the suggested or freshly
    /// generated id of the aggregate they create.
    fn aggregate_id(&self) -> AggregateId;

    /// Creation commands are only accepted for ids with no history.
    fn is_creation(&self) -> bool {
        false
    }

    /// Version the caller last saw (the ETag). A mismatch is a conflict.
    fn expected_version(&self) -> Option<Version> {
        None
    }
}

/// Events produced by processing one command, or the reason it was rejected.
pub type Processed<A> = Result<Vec<<A as Aggregate>::Event>, CommandError>;

type ProcessFn<A> = Arc<dyn Fn(&A, &dyn Any) -> Option<Processed<A>> + Send + Sync>;

/// Processing functions for one aggregate kind, keyed by command type.
///
/// Entries are pure: `(current state, command) -> events | error`. Commands
/// are type-erased on the way in and downcast back inside the entry. The key
/// is the command's `TypeId`, so two command types that share a `NAME` still
/// get separate entries.
pub struct DispatchTable<A: Aggregate> {
    entries: HashMap<TypeId, ProcessFn<A>>,
}

impl<A: Aggregate> Default for DispatchTable<A> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<A: Aggregate> DispatchTable<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers processing for `C`, replacing any earlier registration.
    pub fn register<C, F>(&mut self, process: F)
    where
        C: Command<Aggregate = A>,
        F: Fn(&A, &C) -> Processed<A> + Send + Sync + 'static,
    {
        let entry: ProcessFn<A> = Arc::new(move |aggregate: &A, command: &dyn Any| {
            command
                .downcast_ref::<C>()
                .map(|command| process(aggregate, command))
        });
        self.entries.insert(TypeId::of::<C>(), entry);
    }

    pub fn handles<C: Command<Aggregate = A>>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<C>())
    }

    /// Runs the registered processing. `None` means nothing is registered
    /// for the command kind.
    pub fn process<C: Command<Aggregate = A>>(
        &self,
        aggregate: &A,
        command: &C,
    ) -> Option<Processed<A>> {
        let entry = self.entries.get(&TypeId::of::<C>())?;
        entry(aggregate, command as &dyn Any)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
