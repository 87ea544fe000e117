// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [27.2 Promise Objects](https://tc39.es/ecma262/#sec-promise-objects)
//!
//! Promises here are only the settle-once completion cells that module
//! loading and evaluation hand out. Reactions are internal closures of the
//! module algorithms; they are queued as [`Job`]s when a promise settles and
//! run by [`Agent::run_jobs`].

use std::ops::{Index, IndexMut};

use tracing::trace;

use crate::{
    ecmascript::{
        execution::{Agent, JsError, JsResult, agent::Job},
        scripts_and_modules::module::{
            Module,
            module_semantics::{
                cyclic_module_records::{
                    async_module_execution_fulfilled, async_module_execution_rejected,
                },
                dynamic_import_evaluated, dynamic_import_loaded,
                source_text_module_records::SourceTextModule,
            },
        },
        types::Value,
    },
    heap::{CreateHeapData, Heap, indexes::PromiseIndex},
};

/// ### \[\[PromiseState]] and \[\[PromiseResult]]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(JsError),
}

#[derive(Debug)]
pub struct PromiseHeapData {
    pub(crate) state: PromiseState,
    /// \[\[PromiseFulfillReactions]] and \[\[PromiseRejectReactions]] in one
    /// list: every internal handler reacts to both outcomes.
    pub(crate) reactions: Vec<PromiseReactionHandler>,
}

/// The internal closures that can be registered on a promise.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PromiseReactionHandler {
    /// The onFulfilled and onRejected closures created by ExecuteAsyncModule.
    AsyncModule(SourceTextModule),
    /// The closures created by ContinueDynamicImport for the promise
    /// returned by LoadRequestedModules.
    DynamicImportLoad {
        capability: PromiseCapability,
        module: Module,
    },
    /// The closures created by ContinueDynamicImport for the promise
    /// returned by Evaluate.
    DynamicImportEvaluate {
        capability: PromiseCapability,
        module: Module,
    },
}

/// ### [27.2.2.1 NewPromiseReactionJob ( reaction, argument )](https://tc39.es/ecma262/#sec-newpromisereactionjob)
pub(crate) fn promise_reaction_job(
    agent: &mut Agent,
    handler: PromiseReactionHandler,
    argument: JsResult<Value>,
) {
    match handler {
        PromiseReactionHandler::AsyncModule(module) => match argument {
            Ok(_) => async_module_execution_fulfilled(agent, module),
            Err(error) => async_module_execution_rejected(agent, module, error),
        },
        PromiseReactionHandler::DynamicImportLoad { capability, module } => {
            dynamic_import_loaded(agent, capability, module, argument)
        }
        PromiseReactionHandler::DynamicImportEvaluate { capability, module } => {
            dynamic_import_evaluated(agent, capability, module, argument)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Promise(pub(crate) PromiseIndex);

impl Promise {
    /// ### [27.2.4.7.1 PromiseResolve ( C, x )](https://tc39.es/ecma262/#sec-promise-resolve)
    pub(crate) fn new_resolved(agent: &mut Agent, value: Value) -> Self {
        agent.heap.create(PromiseHeapData {
            state: PromiseState::Fulfilled(value),
            reactions: vec![],
        })
    }

    pub(crate) fn new_rejected(agent: &mut Agent, error: JsError) -> Self {
        agent.heap.create(PromiseHeapData {
            state: PromiseState::Rejected(error),
            reactions: vec![],
        })
    }

    pub fn state(self, agent: &Agent) -> PromiseState {
        agent[self].state
    }

    pub fn is_pending(self, agent: &Agent) -> bool {
        matches!(agent[self].state, PromiseState::Pending)
    }

    /// The fulfillment value, if the promise is fulfilled.
    pub fn value(self, agent: &Agent) -> Option<Value> {
        match agent[self].state {
            PromiseState::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection reason, if the promise is rejected.
    pub fn error(self, agent: &Agent) -> Option<JsError> {
        match agent[self].state {
            PromiseState::Rejected(error) => Some(error),
            _ => None,
        }
    }

    /// ### [27.2.5.4.1 PerformPromiseThen ( promise, onFulfilled, onRejected \[ , resultCapability \] )](https://tc39.es/ecma262/#sec-performpromisethen)
    pub(crate) fn perform_then(self, agent: &mut Agent, handler: PromiseReactionHandler) {
        match agent[self].state {
            PromiseState::Pending => agent[self].reactions.push(handler),
            PromiseState::Fulfilled(value) => agent.enqueue_job(Job {
                handler,
                argument: Ok(value),
            }),
            PromiseState::Rejected(error) => agent.enqueue_job(Job {
                handler,
                argument: Err(error),
            }),
        }
    }

    /// ### [27.2.1.4 FulfillPromise ( promise, value )](https://tc39.es/ecma262/#sec-fulfillpromise) and [27.2.1.7 RejectPromise ( promise, reason )](https://tc39.es/ecma262/#sec-rejectpromise)
    fn settle(self, agent: &mut Agent, argument: JsResult<Value>) {
        // 1. Assert: The value of promise.[[PromiseState]] is pending.
        if !self.is_pending(agent) {
            trace!(promise = ?self, "ignoring settlement of an already settled promise");
            return;
        }
        let data = &mut agent[self];
        // 2. Let reactions be promise.[[PromiseFulfillReactions]].
        let reactions = std::mem::take(&mut data.reactions);
        // 6. Set promise.[[PromiseState]] to fulfilled / rejected.
        data.state = match argument {
            Ok(value) => PromiseState::Fulfilled(value),
            Err(error) => PromiseState::Rejected(error),
        };
        // 7. Perform TriggerPromiseReactions(reactions, value).
        for handler in reactions {
            agent.enqueue_job(Job { handler, argument });
        }
    }
}

/// ### [27.2.1.1 PromiseCapability Records](https://tc39.es/ecma262/#sec-promisecapability-records)
///
/// The resolving half of a promise. Both [`resolve`](Self::resolve) and
/// [`reject`](Self::reject) settle the promise at most once; any call after
/// the first is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromiseCapability {
    promise: Promise,
}

impl PromiseCapability {
    /// ### [27.2.1.5 NewPromiseCapability ( C )](https://tc39.es/ecma262/#sec-newpromisecapability)
    pub fn new(agent: &mut Agent) -> Self {
        let promise = agent.heap.create(PromiseHeapData {
            state: PromiseState::Pending,
            reactions: vec![],
        });
        Self { promise }
    }

    /// ### \[\[Promise]]
    pub fn promise(self) -> Promise {
        self.promise
    }

    /// ### \[\[Resolve]]
    pub fn resolve(self, agent: &mut Agent, value: Value) {
        self.promise.settle(agent, Ok(value));
    }

    /// ### \[\[Reject]]
    pub fn reject(self, agent: &mut Agent, error: JsError) {
        self.promise.settle(agent, Err(error));
    }
}

impl Index<Promise> for Agent {
    type Output = PromiseHeapData;

    fn index(&self, index: Promise) -> &Self::Output {
        &self.heap.promises[index.0]
    }
}

impl IndexMut<Promise> for Agent {
    fn index_mut(&mut self, index: Promise) -> &mut Self::Output {
        &mut self.heap.promises[index.0]
    }
}

impl CreateHeapData<PromiseHeapData, Promise> for Heap {
    fn create(&mut self, data: PromiseHeapData) -> Promise {
        self.promises.push(data);
        Promise(PromiseIndex::last(&self.promises))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecmascript::execution::{DefaultHostHooks, ExceptionType, Options};

    #[test]
    fn capability_settles_once() {
        let mut agent = Agent::new(Options::default(), &DefaultHostHooks);
        let capability = PromiseCapability::new(&mut agent);
        let promise = capability.promise();
        assert!(promise.is_pending(&agent));

        capability.resolve(&mut agent, Value::Number(1.0));
        let error = agent.throw_exception_with_static_message(ExceptionType::Error, "late");
        capability.reject(&mut agent, error);
        capability.resolve(&mut agent, Value::Number(2.0));

        assert_eq!(
            promise.state(&agent),
            PromiseState::Fulfilled(Value::Number(1.0))
        );
        assert_eq!(promise.error(&agent), None);
    }

    #[test]
    fn rejected_capability_exposes_reason() {
        let mut agent = Agent::new(Options::default(), &DefaultHostHooks);
        let capability = PromiseCapability::new(&mut agent);
        let error = agent.throw_exception_with_static_message(ExceptionType::TypeError, "nope");
        capability.reject(&mut agent, error);
        assert_eq!(capability.promise().error(&agent), Some(error));
        assert_eq!(capability.promise().value(&agent), None);
    }
}
