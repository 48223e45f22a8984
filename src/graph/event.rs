//! Graph change notifications
//!
//! Every applied atomic operation is delivered synchronously to the bound
//! listeners, in registration order. Listeners are plain closures; a listener
//! returning an error stops delivery to the ones registered after it.

use crate::operation::{Operation, OperationMatcher};
use anyhow::Context;
use std::fmt;

/// A change notification
#[derive(Debug, Clone, Copy)]
pub enum GraphEvent<'a> {
    /// An atomic operation was applied
    OperationApplied(&'a Operation),
    /// The graph was reset to its seed
    Reset,
}

impl GraphEvent<'_> {
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            GraphEvent::OperationApplied(op) => Some(op),
            GraphEvent::Reset => None,
        }
    }
}

/// Which operations a listener wants. Reset events reach every listener.
pub enum OperationFilter {
    All,
    Matcher(OperationMatcher),
    Predicate(Box<dyn Fn(&Operation) -> bool>),
}

impl OperationFilter {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Operation) -> bool + 'static,
    {
        OperationFilter::Predicate(Box::new(f))
    }

    pub fn accepts(&self, event: &GraphEvent<'_>) -> bool {
        let GraphEvent::OperationApplied(op) = event else {
            return true;
        };
        match self {
            OperationFilter::All => true,
            OperationFilter::Matcher(matcher) => matcher.matches(op),
            OperationFilter::Predicate(f) => f(op),
        }
    }
}

impl From<OperationMatcher> for OperationFilter {
    fn from(matcher: OperationMatcher) -> Self {
        OperationFilter::Matcher(matcher)
    }
}

impl fmt::Debug for OperationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationFilter::All => f.write_str("All"),
            OperationFilter::Matcher(m) => f.debug_tuple("Matcher").field(m).finish(),
            OperationFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Handle returned by `bind`, used to unbind
pub type ListenerId = u64;

pub type Listener = Box<dyn FnMut(&GraphEvent<'_>) -> anyhow::Result<()>>;

struct Binding {
    id: ListenerId,
    filter: OperationFilter,
    listener: Listener,
}

/// Ordered set of bound listeners
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: ListenerId,
    bindings: Vec<Binding>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind<F>(&mut self, filter: OperationFilter, listener: F) -> ListenerId
    where
        F: FnMut(&GraphEvent<'_>) -> anyhow::Result<()> + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        self.bindings.push(Binding {
            id,
            filter,
            listener: Box::new(listener),
        });
        id
    }

    /// Returns false if `id` was not bound
    pub fn unbind(&mut self, id: ListenerId) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|binding| binding.id != id);
        self.bindings.len() != before
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Deliver to every listener whose filter accepts the event
    pub fn emit(&mut self, event: &GraphEvent<'_>) -> anyhow::Result<()> {
        for binding in &mut self.bindings {
            if binding.filter.accepts(event) {
                (binding.listener)(event).with_context(|| format!("listener {} failed", binding.id))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.bindings.len())
            .finish()
    }
}
