// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## Notes
//!
//! - The Agent owns every module record through its [`Heap`]. Two agents
//!   never share records, counters or queues, so independent module graphs
//!   can be driven side by side.

use std::{any::Any, collections::VecDeque, rc::Rc};

use crate::{
    ecmascript::{
        builtins::{
            error::ErrorHeapData,
            promise::{PromiseCapability, PromiseReactionHandler, promise_reaction_job},
        },
        scripts_and_modules::module::module_semantics::{
            abstract_module_records::{LoadedModules, ModuleLoadPayload, ModuleRequest, Referrer},
            source_text_module_records::SourceTextModule,
        },
        types::Value,
    },
    heap::{CreateHeapData, Heap},
};

/// Default for [`Options::max_graph_depth`].
pub const DEFAULT_MAX_GRAPH_DEPTH: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Options {
    /// Print module graph internals (status transitions, component closing)
    /// to stderr as the algorithms run.
    pub print_internals: bool,
    /// Maximum depth of the depth-first traversals performed by Link and
    /// Evaluate. Deeper graphs fail with a RangeError instead of exhausting
    /// the native stack.
    pub max_graph_depth: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            print_internals: false,
            max_graph_depth: DEFAULT_MAX_GRAPH_DEPTH,
        }
    }
}

pub type JsResult<T> = std::result::Result<T, JsError>;

/// A thrown ECMAScript value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JsError(pub(crate) Value);

impl JsError {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(self) -> Value {
        self.0
    }

    /// The kind of the thrown error, if an Error object was thrown.
    pub fn kind(self, agent: &Agent) -> Option<ExceptionType> {
        match self.0 {
            Value::Error(error) => Some(agent[error].kind),
            _ => None,
        }
    }

    pub fn to_string(self, agent: &Agent) -> String {
        self.0.string_repr(agent)
    }
}

/// Opaque data that the host attaches to module records and loading
/// requests, and receives back in [`HostHooks::load_imported_module`].
pub type HostDefined = Rc<dyn Any>;

pub trait HostHooks: std::fmt::Debug {
    /// ### [16.2.1.8 HostLoadImportedModule ( referrer, moduleRequest, hostDefined, payload )](https://tc39.es/ecma262/#sec-HostLoadImportedModule)
    ///
    /// An implementation of HostLoadImportedModule must conform to the
    /// following requirements:
    ///
    /// * The host environment must perform
    ///   [`finish_loading_imported_module`](crate::ecmascript::scripts_and_modules::module::module_semantics::finish_loading_imported_module)
    ///   `(referrer, moduleRequest, payload, result)`, where result is either
    ///   the loaded Module or a thrown error, either synchronously or
    ///   asynchronously.
    /// * If this operation is called multiple times with two (referrer,
    ///   moduleRequest) pairs such that the requests are equal and it
    ///   finishes with a loaded Module, then it must finish with the same
    ///   Module each time.
    /// * The operation must treat payload as an opaque value to be passed
    ///   through to FinishLoadingImportedModule.
    ///
    /// The actual process performed is host-defined, but typically consists
    /// of performing whatever I/O operations are necessary to load the
    /// appropriate Module Record. Multiple different (referrer,
    /// moduleRequest.specifier) pairs may map to the same Module Record
    /// instance: a typical host normalizes the specifier into a canonical
    /// path and caches records by that path.
    fn load_imported_module(
        &self,
        agent: &mut Agent,
        referrer: Referrer,
        module_request: ModuleRequest,
        host_defined: Option<HostDefined>,
        payload: ModuleLoadPayload,
    );

    /// ### ExecuteModule ( \[ capability ] )
    ///
    /// Runs the body of `module` in its already initialized environment.
    ///
    /// If the module has top-level await, `capability` is `Some` and the
    /// body may suspend: the host must return immediately and later settle
    /// the capability with the body's completion. A host doing so must not
    /// return an error from this call. Otherwise the body runs to completion
    /// and its thrown error, if any, is returned.
    fn execute_module(
        &self,
        agent: &mut Agent,
        module: SourceTextModule,
        capability: Option<PromiseCapability>,
    ) -> JsResult<()>;

    /// ### [16.2.1.7 HostGetSupportedImportAttributes ( )](https://tc39.es/ecma262/#sec-hostgetsupportedimportattributes)
    ///
    /// The default implementation returns an empty list.
    fn get_supported_import_attributes(&self) -> &[&'static str] {
        &[]
    }
}

/// A pending reaction: the internal closure registered on a promise, and the
/// settled completion it is called with.
#[derive(Debug)]
pub struct Job {
    pub(crate) handler: PromiseReactionHandler,
    pub(crate) argument: JsResult<Value>,
}

impl Job {
    pub fn run(self, agent: &mut Agent) {
        promise_reaction_job(agent, self.handler, self.argument);
    }
}

/// ### [9.7 Agents](https://tc39.es/ecma262/#sec-agents)
#[derive(Debug)]
pub struct Agent {
    pub(crate) heap: Heap,
    pub(crate) options: Options,
    pub(crate) host_hooks: &'static dyn HostHooks,
    /// Reactions of settled promises, drained by [`Agent::run_jobs`].
    pub(crate) job_queue: VecDeque<Job>,
    /// ### \[\[ModuleAsyncEvaluationCount]]
    ///
    /// Initially 1. Used to assign unique incrementally increasing values
    /// (order of execution) to modules that are asynchronous or have
    /// asynchronous dependencies.
    pub(crate) module_async_evaluation_count: u32,
    /// ### \[\[LoadedModules]] of the realm
    ///
    /// Modules loaded by dynamic imports that have no referencing module.
    pub(crate) host_loaded_modules: LoadedModules,
}

impl Agent {
    pub fn new(options: Options, host_hooks: &'static dyn HostHooks) -> Self {
        Self {
            heap: Heap::new(),
            options,
            host_hooks,
            job_queue: VecDeque::new(),
            module_async_evaluation_count: 1,
            host_loaded_modules: LoadedModules::default(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// ### [5.2.3.2 Throw an Exception](https://tc39.es/ecma262/#sec-throw-an-exception)
    pub fn throw_exception_with_static_message(
        &mut self,
        kind: ExceptionType,
        message: &'static str,
    ) -> JsError {
        self.throw_exception(kind, message.to_string())
    }

    /// ### [5.2.3.2 Throw an Exception](https://tc39.es/ecma262/#sec-throw-an-exception)
    pub fn throw_exception(&mut self, kind: ExceptionType, message: String) -> JsError {
        let error = self.heap.create(ErrorHeapData::new(kind, message));
        JsError(Value::Error(error))
    }

    /// ### [16.2.1.6.1.3.4 IncrementModuleAsyncEvaluationCount ( )](https://tc39.es/ecma262/#sec-IncrementModuleAsyncEvaluationCount)
    pub(crate) fn increment_module_async_evaluation_count(&mut self) -> u32 {
        // 1. Let AR be the Agent Record of the surrounding agent.
        // 2. Let count be AR.[[ModuleAsyncEvaluationCount]].
        let count = self.module_async_evaluation_count;
        // 3. Set AR.[[ModuleAsyncEvaluationCount]] to count + 1.
        self.module_async_evaluation_count += 1;
        // 4. Return count.
        count
    }

    pub(crate) fn enqueue_job(&mut self, job: Job) {
        self.job_queue.push_back(job);
    }

    pub fn has_pending_jobs(&self) -> bool {
        !self.job_queue.is_empty()
    }

    /// Runs queued promise reactions until the queue is empty, including
    /// any reactions enqueued while running. Returns the number of jobs run.
    ///
    /// Hosts call this after settling the capability of an asynchronous
    /// module body, or after finishing a deferred module load.
    pub fn run_jobs(&mut self) -> usize {
        let mut count = 0;
        while let Some(job) = self.job_queue.pop_front() {
            job.run(self);
            count += 1;
        }
        count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionType {
    Error,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
}

impl ExceptionType {
    pub fn name(self) -> &'static str {
        match self {
            ExceptionType::Error => "Error",
            ExceptionType::RangeError => "RangeError",
            ExceptionType::ReferenceError => "ReferenceError",
            ExceptionType::SyntaxError => "SyntaxError",
            ExceptionType::TypeError => "TypeError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecmascript::execution::DefaultHostHooks;

    #[test]
    fn async_evaluation_count_starts_at_one() {
        let mut agent = Agent::new(Options::default(), &DefaultHostHooks);
        assert_eq!(agent.increment_module_async_evaluation_count(), 1);
        assert_eq!(agent.increment_module_async_evaluation_count(), 2);
    }

    #[test]
    fn thrown_errors_keep_kind_and_message() {
        let mut agent = Agent::new(Options::default(), &DefaultHostHooks);
        let error =
            agent.throw_exception_with_static_message(ExceptionType::SyntaxError, "bad import");
        assert_eq!(error.kind(&agent), Some(ExceptionType::SyntaxError));
        assert_eq!(error.to_string(&agent), "SyntaxError: bad import");
        assert_eq!(JsError::new(Value::Null).kind(&agent), None);
    }
}
