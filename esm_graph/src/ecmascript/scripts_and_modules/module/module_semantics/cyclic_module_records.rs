// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [16.2.1.6 Cyclic Module Records](https://tc39.es/ecma262/#sec-cyclic-module-records)
//!
//! The load, link and evaluate algorithms over a graph of source text
//! modules. Synthetic modules take part as leaves: they are linked and
//! evaluated through their own abstract methods.

use tracing::{debug, instrument, trace};

use super::{
    abstract_module_records::{
        LoadedModules, ModuleAbstractMethods, ModuleLoadPayload, ModuleRequest, Referrer,
    },
    source_text_module_records::SourceTextModule,
};
use crate::{
    ecmascript::{
        builtins::promise::{Promise, PromiseCapability, PromiseReactionHandler, PromiseState},
        execution::{Agent, ExceptionType, HostDefined, JsError, JsResult},
        scripts_and_modules::module::Module,
        types::Value,
    },
    heap::{CreateHeapData, Heap, indexes::GraphLoadingStateIndex},
};

/// ### \[\[Status]]
///
/// Initially new. Transitions to unlinked, linking, linked, evaluating,
/// possibly evaluating-async, evaluated (in that order) as the module
/// progresses throughout its lifecycle. evaluating-async indicates this module
/// is queued to execute on completion of its asynchronous dependencies or it
/// is a module whose \[\[HasTLA]] field is true that has been executed and is
/// pending top-level completion.
///
/// A module can also be explicitly reset from unlinked, linking or linked
/// back to unlinked with
/// [`SourceTextModule::invalidate`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CyclicModuleRecordStatus {
    #[default]
    New,
    Unlinked,
    Linking,
    Linked,
    Evaluating,
    EvaluatingAsync,
    Evaluated,
}

impl CyclicModuleRecordStatus {
    fn can_transition_to(self, next: Self) -> bool {
        use CyclicModuleRecordStatus::*;
        matches!(
            (self, next),
            (New, Unlinked)
                | (Unlinked, Unlinked)
                | (Unlinked, Linking)
                | (Linking, Linked)
                | (Linking, Unlinked)
                | (Linked, Unlinked)
                | (Linked, Evaluating)
                | (Evaluating, EvaluatingAsync)
                | (Evaluating, Evaluated)
                | (EvaluatingAsync, Evaluated)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CyclicModuleRecordStatus::New => "new",
            CyclicModuleRecordStatus::Unlinked => "unlinked",
            CyclicModuleRecordStatus::Linking => "linking",
            CyclicModuleRecordStatus::Linked => "linked",
            CyclicModuleRecordStatus::Evaluating => "evaluating",
            CyclicModuleRecordStatus::EvaluatingAsync => "evaluating-async",
            CyclicModuleRecordStatus::Evaluated => "evaluated",
        }
    }
}

/// ### \[\[AsyncEvaluationOrder]]
///
/// This field is initially set to unset, and remains unset for fully
/// synchronous modules. For modules that are either themselves asynchronous
/// or have an asynchronous dependency, it is set to an integer that
/// determines the order in which execution of pending modules is queued by
/// 16.2.1.6.1.3.4. Once the pending module is executed, the field is set to
/// done.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AsyncEvaluationOrder {
    #[default]
    Unset,
    Order(u32),
    Done,
}

#[derive(Debug, Default)]
pub(crate) struct CyclicModuleRecord {
    /// [\[\[Status\]\]](CyclicModuleRecordStatus)
    status: CyclicModuleRecordStatus,
    /// ### \[\[EvaluationError]]
    ///
    /// A throw completion representing the exception that occurred during
    /// evaluation. `None` if no exception occurred or if \[\[Status]] is not
    /// evaluated.
    evaluation_error: Option<JsError>,
    /// ### \[\[DFSIndex]]
    ///
    /// Auxiliary field used during Link and Evaluate only. If \[\[Status]] is
    /// either linking or evaluating, this non-negative number records the
    /// point at which the module was first visited during the depth-first
    /// traversal of the dependency graph.
    dfs_index: Option<u32>,
    /// ### \[\[DFSAncestorIndex]]
    ///
    /// Auxiliary field used during Link and Evaluate only. If \[\[Status]] is
    /// either linking or evaluating, this is either the module's own
    /// \[\[DFSIndex]] or that of an "earlier" module in the same strongly
    /// connected component.
    dfs_ancestor_index: Option<u32>,
    /// ### \[\[RequestedModules]]
    ///
    /// A List of the ModuleRequest Records associated with the imports in
    /// this module. The List is in source text occurrence order of the
    /// imports.
    pub(super) requested_modules: Box<[ModuleRequest]>,
    /// ### \[\[LoadedModules]]
    pub(super) loaded_modules: LoadedModules,
    /// ### \[\[CycleRoot]]
    ///
    /// The first visited module of the cycle, the root DFS ancestor of the
    /// strongly connected component. For a module not in a cycle, this would
    /// be the module itself. Once Evaluate has completed, a module's
    /// \[\[DFSAncestorIndex]] is the \[\[DFSIndex]] of its \[\[CycleRoot]].
    cycle_root: Option<SourceTextModule>,
    /// ### \[\[HasTLA]]
    ///
    /// Whether this module is individually asynchronous (for example, if it's
    /// a Source Text Module Record containing a top-level await). Having an
    /// asynchronous dependency does not mean this field is true. This field
    /// must not change after the module is parsed.
    has_tla: bool,
    /// [\[\[AsyncEvaluationOrder\]\]](AsyncEvaluationOrder)
    async_evaluation_order: AsyncEvaluationOrder,
    /// ### \[\[TopLevelCapability]]
    ///
    /// If this module is the \[\[CycleRoot]] of some cycle, and Evaluate() was
    /// called on some module in that cycle, this field contains the
    /// PromiseCapability Record for that entire evaluation. It is used to
    /// settle the Promise object that is returned from the Evaluate() abstract
    /// method. This field will be empty for any dependencies of that module,
    /// unless a top-level Evaluate() has been initiated for some of those
    /// dependencies.
    top_level_capability: Option<PromiseCapability>,
    /// ### \[\[AsyncParentModules]]
    ///
    /// If this module or a dependency has \[\[HasTLA]] true, and execution is
    /// in progress, this tracks the parent importers of this module for the
    /// top-level execution job. These parent modules will not start executing
    /// before this module has successfully completed execution.
    async_parent_modules: Vec<SourceTextModule>,
    /// ### \[\[PendingAsyncDependencies]]
    ///
    /// If this module has any asynchronous dependencies, this tracks the
    /// number of asynchronous dependency modules remaining to execute for this
    /// module. A module with asynchronous dependencies will be executed when
    /// this field reaches 0 and there are no execution errors.
    pending_async_dependencies: u32,
}

impl CyclicModuleRecord {
    pub(super) fn new(has_tla: bool, requested_modules: Box<[ModuleRequest]>) -> Self {
        Self {
            has_tla,
            requested_modules,
            ..Default::default()
        }
    }

    pub(super) fn status(&self) -> CyclicModuleRecordStatus {
        self.status
    }

    pub(super) fn has_tla(&self) -> bool {
        self.has_tla
    }

    pub(super) fn evaluation_error(&self) -> Option<JsError> {
        self.evaluation_error
    }

    pub(super) fn async_evaluation_order(&self) -> AsyncEvaluationOrder {
        self.async_evaluation_order
    }

    pub(super) fn cycle_root(&self) -> Option<SourceTextModule> {
        self.cycle_root
    }

    pub(super) fn top_level_capability(&self) -> Option<PromiseCapability> {
        self.top_level_capability
    }

    fn transition(&mut self, next: CyclicModuleRecordStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "Invalid module status transition from {:?} to {:?}",
            self.status,
            next
        );
        if !matches!(
            next,
            CyclicModuleRecordStatus::Linking | CyclicModuleRecordStatus::Evaluating
        ) {
            self.dfs_index = None;
            self.dfs_ancestor_index = None;
        }
        self.status = next;
    }

    fn set_evaluation_error(&mut self, error: JsError) {
        debug_assert!(
            self.evaluation_error.is_none(),
            "Attempted to set module [[EvaluationError]] twice"
        );
        self.evaluation_error = Some(error);
        self.transition(CyclicModuleRecordStatus::Evaluated);
    }

    fn set_dfs_index(&mut self, index: u32) {
        self.dfs_index = Some(index);
        self.dfs_ancestor_index = Some(index);
    }

    fn dfs_index(&self) -> Option<u32> {
        self.dfs_index
    }

    fn dfs_ancestor_index(&self) -> Option<u32> {
        self.dfs_ancestor_index
    }

    /// Set \[\[DFSAncestorIndex]] to min(\[\[DFSAncestorIndex]], `index`).
    fn lower_dfs_ancestor_index(&mut self, index: Option<u32>) {
        if let Some(index) = index {
            self.dfs_ancestor_index = Some(self.dfs_ancestor_index.map_or(index, |a| a.min(index)));
        }
    }
}

/// ### [Abstract Methods of Cyclic Module Records](https://tc39.es/ecma262/#table-cyclic-module-methods)
pub trait CyclicModuleAbstractMethods: Copy {
    /// ### InitializeEnvironment()
    ///
    /// Initialize the Environment Record of the module, including resolving
    /// all imported bindings, and create the module's execution context.
    fn initialize_environment(self, agent: &mut Agent) -> JsResult<()>;

    /// ### ExecuteModule(\[promiseCapability])
    ///
    /// Evaluate the module's code within its execution context. If this
    /// module has true in \[\[HasTLA]], then a PromiseCapability Record is
    /// passed as an argument, and the method is expected to resolve or reject
    /// the given capability. In this case, the method must not throw an
    /// exception, but instead reject the PromiseCapability Record if
    /// necessary.
    fn execute_module(
        self,
        agent: &mut Agent,
        promise_capability: Option<PromiseCapability>,
    ) -> JsResult<()>;
}

impl SourceTextModule {
    fn transition(self, agent: &mut Agent, next: CyclicModuleRecordStatus) {
        trace!(module = ?self, from = ?self.status(agent), to = ?next, "module status");
        self.cyclic_mut(agent).transition(next);
    }

    /// Resets the module to unlinked, dropping its environment. Used when
    /// linking fails and by [`SourceTextModule::invalidate`].
    pub(super) fn reset_to_unlinked(self, agent: &mut Agent) {
        self.transition(agent, CyclicModuleRecordStatus::Unlinked);
        Module::from(self).record_mut(agent).environment = None;
    }

    fn print_internals(self, agent: &Agent, message: std::fmt::Arguments) {
        if agent.options.print_internals {
            eprintln!("[module {:?}] {}", self.get_index(), message);
        }
    }
}

/// ### [GraphLoadingState Records](https://tc39.es/ecma262/#graphloadingstate-record)
///
/// A handle to the state of one in-flight LoadRequestedModules call. The
/// state is dropped once loading finishes, successfully or with an error;
/// a dropped state is "not loading" and ignores any further continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphLoadingState(pub(crate) GraphLoadingStateIndex);

#[derive(Debug)]
pub struct GraphLoadingStateRecord {
    /// ### \[\[PromiseCapability]]
    ///
    /// The promise to resolve when the loading process finishes.
    promise_capability: PromiseCapability,
    /// ### \[\[PendingModulesCount]]
    ///
    /// It tracks the number of pending HostLoadImportedModule calls.
    pending_modules_count: u32,
    /// ### \[\[Visited]]
    ///
    /// It is a list of the Cyclic Module Records that have been already
    /// loaded by the current loading process, to avoid infinite loops with
    /// circular dependencies.
    visited: Vec<SourceTextModule>,
    /// ### \[\[HostDefined]]
    ///
    /// It contains host-defined data to pass from the LoadRequestedModules
    /// caller to HostLoadImportedModule.
    host_defined: Option<HostDefined>,
    /// InnerModuleLoading calls that have not finished, innermost last.
    frames: Vec<LoadingFrame>,
    /// True while a call is draining `frames`. Loads the host finishes
    /// synchronously push a frame for that call to pick up.
    draining: bool,
}

/// One InnerModuleLoading call of the graph walk.
#[derive(Debug)]
struct LoadingFrame {
    module: Module,
    /// The requests of a first visit that have not been loaded yet. `None`
    /// until the frame is entered.
    requests: Option<std::vec::IntoIter<ModuleRequest>>,
}

impl GraphLoadingState {
    /// ### \[\[IsLoading]]
    ///
    /// It is true if the loading process has not finished yet, neither
    /// successfully nor with an error.
    pub fn is_loading(self, agent: &Agent) -> bool {
        agent.heap.loading_states[self.0].is_some()
    }

    fn record(self, agent: &mut Agent) -> Option<&mut GraphLoadingStateRecord> {
        agent.heap.loading_states[self.0].as_mut()
    }

    /// Ends the loading process, returning its record.
    fn finish(self, agent: &mut Agent) -> Option<GraphLoadingStateRecord> {
        agent.heap.loading_states[self.0].take()
    }
}

impl CreateHeapData<GraphLoadingStateRecord, GraphLoadingState> for Heap {
    fn create(&mut self, data: GraphLoadingStateRecord) -> GraphLoadingState {
        self.loading_states.push(Some(data));
        GraphLoadingState(GraphLoadingStateIndex::last(&self.loading_states))
    }
}

/// ### [16.2.1.6.1.1 LoadRequestedModules ( \[ hostDefined \] )](https://tc39.es/ecma262/#sec-LoadRequestedModules)
///
/// The LoadRequestedModules concrete method of a Cyclic Module Record module
/// takes optional argument hostDefined (anything) and returns a Promise. It
/// populates the \[\[LoadedModules]] of all the Module Records in the
/// dependency graph of module (most of the work is done by the auxiliary
/// function InnerModuleLoading). It takes an optional hostDefined parameter
/// that is passed to the HostLoadImportedModule hook.
#[instrument(level = "debug", skip(agent, host_defined))]
pub(crate) fn load_requested_modules(
    agent: &mut Agent,
    module: SourceTextModule,
    host_defined: Option<HostDefined>,
) -> Promise {
    // 1. If hostDefined is not present, let hostDefined be empty.
    // 2. Let pc be ! NewPromiseCapability(%Promise%).
    let pc = PromiseCapability::new(agent);
    // 3. Let state be the GraphLoadingState Record { [[IsLoading]]: true,
    //    [[PendingModulesCount]]: 1, [[Visited]]: « », [[PromiseCapability]]:
    //    pc, [[HostDefined]]: hostDefined }.
    let state = agent.heap.create(GraphLoadingStateRecord {
        promise_capability: pc,
        pending_modules_count: 1,
        visited: vec![],
        host_defined,
        frames: vec![],
        draining: false,
    });
    // 4. Perform InnerModuleLoading(state, module).
    inner_module_loading(agent, state, module.into());
    // 5. Return pc.[[Promise]].
    pc.promise()
}

/// ### [16.2.1.3.1 AllImportAttributesSupported ( attributes )](https://tc39.es/ecma262/#sec-AllImportAttributesSupported)
pub(crate) fn all_import_attributes_supported(agent: &Agent, request: &ModuleRequest) -> bool {
    // 1. Let supported be HostGetSupportedImportAttributes().
    let supported = agent.host_hooks.get_supported_import_attributes();
    // 2. For each ImportAttribute Record attribute of attributes, do
    //    a. If supported does not contain attribute.[[Key]], return false.
    // 3. Return true.
    request
        .attributes()
        .iter()
        .all(|attribute| supported.iter().any(|key| *key == attribute.key()))
}

pub(crate) fn unsupported_import_attributes_error(
    agent: &mut Agent,
    request: &ModuleRequest,
) -> JsError {
    let supported = agent.host_hooks.get_supported_import_attributes();
    let unsupported = request
        .attributes()
        .iter()
        .find(|attribute| !supported.iter().any(|key| *key == attribute.key()))
        .map_or_else(String::new, |attribute| attribute.key().to_string());
    agent.throw_exception(
        ExceptionType::SyntaxError,
        format!(
            "Unsupported import attribute '{unsupported}' for module '{}'",
            request.specifier()
        ),
    )
}

/// ### [16.2.1.6.1.1.1 InnerModuleLoading ( state, module )](https://tc39.es/ecma262/#sec-InnerModuleLoading)
///
/// The abstract operation InnerModuleLoading takes arguments state (a
/// GraphLoadingState Record) and module (a Module Record) and returns unused.
/// It is used by LoadRequestedModules to recursively perform the actual
/// loading process for module's dependency graph.
///
/// The recursion is kept on an explicit stack of frames in the state, so
/// that hosts finishing loads synchronously do not grow the native stack
/// with the depth of the graph. Frames are entered in the same depth-first
/// order as the recursive algorithm.
fn inner_module_loading(agent: &mut Agent, state: GraphLoadingState, module: Module) {
    // 1. Assert: state.[[IsLoading]] is true.
    let Some(record) = state.record(agent) else {
        return;
    };
    record.frames.push(LoadingFrame {
        module,
        requests: None,
    });
    if record.draining {
        return;
    }
    record.draining = true;
    drain_module_loading(agent, state);
    if let Some(record) = state.record(agent) {
        record.draining = false;
    }
}

fn drain_module_loading(agent: &mut Agent, state: GraphLoadingState) {
    // 2.d.iv. If state.[[IsLoading]] is false, return unused: a finished
    //         state has no frames left to pop.
    while let Some(mut frame) = state.record(agent).and_then(|record| record.frames.pop()) {
        if frame.requests.is_none() {
            frame.requests = Some(enter_module_loading(agent, state, frame.module).into_iter());
        }
        match frame.requests.as_mut().and_then(Iterator::next) {
            Some(request) => {
                let (Module::SourceText(module), Some(record)) = (frame.module, state.record(agent))
                else {
                    return;
                };
                // The frame stays below anything this request pushes.
                record.frames.push(frame);
                load_module_request(agent, state, module, request);
            }
            None => leave_module_loading(agent, state),
        }
    }
}

/// Step 2 of InnerModuleLoading: returns the requests to load when this is
/// the first visit of a new cyclic module, and none otherwise.
fn enter_module_loading(
    agent: &mut Agent,
    state: GraphLoadingState,
    module: Module,
) -> Vec<ModuleRequest> {
    // 2. If module is a Cyclic Module Record, module.[[Status]] is new, and
    //    state.[[Visited]] does not contain module, then
    let Module::SourceText(module) = module else {
        return vec![];
    };
    if module.status(agent) != CyclicModuleRecordStatus::New {
        return vec![];
    }
    // b. Let requestedModulesCount be the number of elements in
    //    module.[[RequestedModules]].
    let requested_modules = agent[module].cyclic_fields.requested_modules.clone();
    let Some(record) = state.record(agent) else {
        return vec![];
    };
    if record.visited.contains(&module) {
        return vec![];
    }
    // a. Append module to state.[[Visited]].
    record.visited.push(module);
    // c. Set state.[[PendingModulesCount]] to
    //    state.[[PendingModulesCount]] + requestedModulesCount.
    record.pending_modules_count += requested_modules.len() as u32;
    requested_modules.into_vec()
}

/// Step 2.d of InnerModuleLoading for a single request of `module`.
fn load_module_request(
    agent: &mut Agent,
    state: GraphLoadingState,
    module: SourceTextModule,
    request: ModuleRequest,
) {
    // i. If AllImportAttributesSupported(request.[[Attributes]]) is false,
    //    then
    if !all_import_attributes_supported(agent, &request) {
        // 1. Let error be ThrowCompletion(a newly created SyntaxError object).
        let error = unsupported_import_attributes_error(agent, &request);
        // 2. Perform ContinueModuleLoading(state, error).
        continue_module_loading(agent, state, Err(error));
    } else if let Some(loaded) = agent[module].cyclic_fields.loaded_modules.get(&request).copied()
    {
        // ii. Else if module.[[LoadedModules]] contains a LoadedModuleRequest
        //     Record record such that ModuleRequestsEqual(record, request) is
        //     true, then
        // 1. Perform InnerModuleLoading(state, record.[[Module]]).
        inner_module_loading(agent, state, loaded);
    } else {
        // iii. Else,
        // 1. Perform HostLoadImportedModule(module, request,
        //    state.[[HostDefined]], state).
        let host_defined = state
            .record(agent)
            .and_then(|record| record.host_defined.clone());
        trace!(referrer = ?module, specifier = request.specifier(), "load imported module");
        let host_hooks = agent.host_hooks;
        host_hooks.load_imported_module(
            agent,
            Referrer::Module(module),
            request,
            host_defined,
            ModuleLoadPayload::GraphLoadingState(state),
        );
        // 2. NOTE: HostLoadImportedModule will call
        //    FinishLoadingImportedModule, which re-enters the graph loading
        //    process through ContinueModuleLoading.
    }
}

/// Steps 3 to 6 of InnerModuleLoading, once every request of the frame has
/// been handed out.
fn leave_module_loading(agent: &mut Agent, state: GraphLoadingState) {
    let Some(record) = state.record(agent) else {
        return;
    };
    // 3. Assert: state.[[PendingModulesCount]] ≥ 1.
    debug_assert!(record.pending_modules_count >= 1);
    // 4. Set state.[[PendingModulesCount]] to state.[[PendingModulesCount]] - 1.
    record.pending_modules_count -= 1;
    // 5. If state.[[PendingModulesCount]] = 0, then
    if record.pending_modules_count == 0 {
        // a. Set state.[[IsLoading]] to false.
        let Some(record) = state.finish(agent) else {
            return;
        };
        // b. For each Cyclic Module Record loaded of state.[[Visited]], do
        for loaded in record.visited.iter().copied() {
            // i. If loaded.[[Status]] is new, set loaded.[[Status]] to unlinked.
            if loaded.status(agent) == CyclicModuleRecordStatus::New {
                loaded.transition(agent, CyclicModuleRecordStatus::Unlinked);
            }
        }
        debug!(modules = record.visited.len(), "module graph loaded");
        // c. Perform ! Call(state.[[PromiseCapability]].[[Resolve]],
        //    undefined, « undefined »).
        record.promise_capability.resolve(agent, Value::Undefined);
    }
    // 6. Return unused.
}

/// ### [16.2.1.6.1.1.2 ContinueModuleLoading ( state, moduleCompletion )](https://tc39.es/ecma262/#sec-ContinueModuleLoading)
///
/// The abstract operation ContinueModuleLoading takes arguments state (a
/// GraphLoadingState Record) and moduleCompletion (either a normal completion
/// containing a Module Record or a throw completion) and returns unused. It is
/// used to re-enter the loading process after a call to
/// HostLoadImportedModule.
pub(crate) fn continue_module_loading(
    agent: &mut Agent,
    state: GraphLoadingState,
    module_completion: JsResult<Module>,
) {
    // 1. If state.[[IsLoading]] is false, return unused.
    if !state.is_loading(agent) {
        return;
    }
    match module_completion {
        // 2. If moduleCompletion is a normal completion, then
        //    a. Perform InnerModuleLoading(state, moduleCompletion.[[Value]]).
        Ok(module) => inner_module_loading(agent, state, module),
        // 3. Else,
        Err(error) => {
            // a. Set state.[[IsLoading]] to false.
            let Some(record) = state.finish(agent) else {
                return;
            };
            debug!(error = %error.to_string(agent), "module graph failed to load");
            // b. Perform ! Call(state.[[PromiseCapability]].[[Reject]],
            //    undefined, « moduleCompletion.[[Value]] »).
            record.promise_capability.reject(agent, error);
        }
    }
    // 4. Return unused.
}

/// ### [16.2.1.6.1.2 Link ( )](https://tc39.es/ecma262/#sec-moduledeclarationlinking)
///
/// The Link concrete method of a Cyclic Module Record module takes no
/// arguments and returns either a normal completion containing unused or a
/// throw completion. On success, Link transitions this module's \[\[Status]]
/// from unlinked to linked. On failure, an exception is thrown and this
/// module's \[\[Status]] remains unlinked. (Most of the work is done by the
/// auxiliary function InnerModuleLinking.)
///
/// Strongly connected components closed before the failure stay linked.
#[instrument(level = "debug", skip(agent))]
pub(crate) fn link(agent: &mut Agent, module: SourceTextModule) -> JsResult<()> {
    // 1. Assert: module.[[Status]] is one of unlinked, linked,
    //    evaluating-async, or evaluated.
    match module.status(agent) {
        CyclicModuleRecordStatus::New => {
            return Err(agent.throw_exception_with_static_message(
                ExceptionType::TypeError,
                "Module must finish loading before it can be linked",
            ));
        }
        CyclicModuleRecordStatus::Linking | CyclicModuleRecordStatus::Evaluating => {
            return Err(agent.throw_exception_with_static_message(
                ExceptionType::TypeError,
                "Module is already being linked or evaluated",
            ));
        }
        _ => {}
    }
    // 2. Let stack be a new empty List.
    let mut stack = vec![];
    // 3. Let result be Completion(InnerModuleLinking(module, stack, 0)).
    let result = inner_module_linking(agent, module.into(), &mut stack, 0, 0);
    // 4. If result is an abrupt completion, then
    if let Err(error) = result {
        // a. For each Cyclic Module Record m of stack, do
        for m in stack {
            // i. Assert: m.[[Status]] is linking.
            debug_assert_eq!(m.status(agent), CyclicModuleRecordStatus::Linking);
            // ii. Set m.[[Status]] to unlinked.
            m.reset_to_unlinked(agent);
        }
        // b. Assert: module.[[Status]] is unlinked.
        debug_assert_eq!(module.status(agent), CyclicModuleRecordStatus::Unlinked);
        debug!(error = %error.to_string(agent), "link failed");
        // c. Return ? result.
        return Err(error);
    }
    // 5. Assert: module.[[Status]] is one of linked, evaluating-async, or
    //    evaluated.
    debug_assert!(matches!(
        module.status(agent),
        CyclicModuleRecordStatus::Linked
            | CyclicModuleRecordStatus::Evaluating
            | CyclicModuleRecordStatus::EvaluatingAsync
            | CyclicModuleRecordStatus::Evaluated
    ));
    // 6. Assert: stack is empty.
    debug_assert!(stack.is_empty());
    // 7. Return unused.
    Ok(())
}

fn graph_too_deep(agent: &mut Agent) -> JsError {
    let message = format!(
        "Module graph is deeper than the maximum of {}",
        agent.options.max_graph_depth
    );
    agent.throw_exception(ExceptionType::RangeError, message)
}

/// GetImportedModule for every request of `module`, in order.
fn required_modules(agent: &mut Agent, module: SourceTextModule) -> JsResult<Vec<Module>> {
    let record = &agent[module].cyclic_fields;
    let mut required = Vec::with_capacity(record.requested_modules.len());
    for request in record.requested_modules.iter() {
        match record.loaded_modules.get(request) {
            Some(loaded) => required.push(*loaded),
            None => {
                let message = format!("Cannot find module '{}'", request.specifier());
                return Err(agent.throw_exception(ExceptionType::TypeError, message));
            }
        }
    }
    Ok(required)
}

/// ### [16.2.1.6.1.2.1 InnerModuleLinking ( module, stack, index )](https://tc39.es/ecma262/#sec-InnerModuleLinking)
///
/// The abstract operation InnerModuleLinking takes arguments module (a Module
/// Record), stack (a List of Cyclic Module Records), and index (a
/// non-negative integer) and returns either a normal completion containing a
/// non-negative integer or a throw completion. It is used by Link to perform
/// the actual linking process for module, as well as recursively on all
/// other modules in the dependency graph. The stack and index parameters, as
/// well as a module's \[\[DFSIndex]] and \[\[DFSAncestorIndex]] fields, keep
/// track of the depth-first search (DFS) traversal. In particular,
/// \[\[DFSAncestorIndex]] is used to discover strongly connected components
/// (SCCs), such that all modules in an SCC transition to linked together.
///
/// The environments of a component are initialized when the component
/// closes, in pop order, and only then are its members marked linked.
fn inner_module_linking(
    agent: &mut Agent,
    module: Module,
    stack: &mut Vec<SourceTextModule>,
    index: u32,
    depth: u32,
) -> JsResult<u32> {
    let module = match module {
        Module::SourceText(module) => module,
        // 1. If module is not a Cyclic Module Record, then
        Module::Synthetic(module) => {
            // a. Perform ? module.Link().
            module.link(agent)?;
            // b. Return index.
            return Ok(index);
        }
    };
    // 2. If module.[[Status]] is one of linking, linked, evaluating-async, or
    //    evaluated, then
    match module.status(agent) {
        CyclicModuleRecordStatus::Linking
        | CyclicModuleRecordStatus::Linked
        | CyclicModuleRecordStatus::Evaluating
        | CyclicModuleRecordStatus::EvaluatingAsync
        | CyclicModuleRecordStatus::Evaluated => {
            // a. Return index.
            return Ok(index);
        }
        CyclicModuleRecordStatus::New => {
            return Err(agent.throw_exception_with_static_message(
                ExceptionType::TypeError,
                "Module dependency has not finished loading",
            ));
        }
        // 3. Assert: module.[[Status]] is unlinked.
        CyclicModuleRecordStatus::Unlinked => {}
    }
    if depth >= agent.options.max_graph_depth {
        return Err(graph_too_deep(agent));
    }
    // 4. Set module.[[Status]] to linking.
    module.transition(agent, CyclicModuleRecordStatus::Linking);
    // 5. Set module.[[DFSIndex]] to index.
    // 6. Set module.[[DFSAncestorIndex]] to index.
    module.cyclic_mut(agent).set_dfs_index(index);
    // 7. Set index to index + 1.
    let mut index = index + 1;
    // 8. Append module to stack.
    stack.push(module);
    // 9. For each ModuleRequest Record request of module.[[RequestedModules]], do
    //    a. Let requiredModule be GetImportedModule(module, request).
    for required_module in required_modules(agent, module)? {
        // b. Set index to ? InnerModuleLinking(requiredModule, stack, index).
        index = inner_module_linking(agent, required_module, stack, index, depth + 1)?;
        // c. If requiredModule is a Cyclic Module Record, then
        if let Module::SourceText(required_module) = required_module {
            // i. Assert: requiredModule.[[Status]] is one of linking, linked,
            //    evaluating-async, or evaluated.
            // ii. Assert: requiredModule.[[Status]] is linking if and only if
            //     stack contains requiredModule.
            debug_assert_eq!(
                required_module.status(agent) == CyclicModuleRecordStatus::Linking,
                stack.contains(&required_module)
            );
            // iii. If requiredModule.[[Status]] is linking, then
            if required_module.status(agent) == CyclicModuleRecordStatus::Linking {
                // 1. Set module.[[DFSAncestorIndex]] to
                //    min(module.[[DFSAncestorIndex]],
                //    requiredModule.[[DFSAncestorIndex]]).
                let ancestor_index = required_module.cyclic(agent).dfs_ancestor_index();
                module
                    .cyclic_mut(agent)
                    .lower_dfs_ancestor_index(ancestor_index);
            }
        }
    }
    // 11. Assert: module occurs exactly once in stack.
    debug_assert_eq!(stack.iter().filter(|m| **m == module).count(), 1);
    // 12. Assert: module.[[DFSAncestorIndex]] ≤ module.[[DFSIndex]].
    let record = module.cyclic(agent);
    debug_assert!(record.dfs_ancestor_index() <= record.dfs_index());
    // 13. If module.[[DFSAncestorIndex]] = module.[[DFSIndex]], then
    if record.dfs_ancestor_index() == record.dfs_index() {
        // a. Let done be false.
        // b. Repeat, while done is false,
        //    i. Let requiredModule be the last element of stack.
        //    ii. Remove the last element of stack.
        //    iii. Assert: requiredModule is a Cyclic Module Record.
        //    v. If requiredModule and module are the same Module Record, set
        //       done to true.
        let position = stack.iter().rposition(|m| *m == module).unwrap_or(0);
        let component: Vec<SourceTextModule> = stack.drain(position..).rev().collect();
        // Every environment of the component is initialized before any of
        // its members becomes linked.
        for m in component.iter() {
            if let Err(error) = m.initialize_environment(agent) {
                for m in component.iter() {
                    m.reset_to_unlinked(agent);
                }
                return Err(error);
            }
        }
        for m in component.iter() {
            // iv. Set requiredModule.[[Status]] to linked.
            m.transition(agent, CyclicModuleRecordStatus::Linked);
        }
        debug!(root = ?module, members = ?component, "linked strongly connected component");
        module.print_internals(
            agent,
            format_args!("linked component {:?}", component),
        );
    }
    // 14. Return index.
    Ok(index)
}

/// ### [16.2.1.6.1.3 Evaluate ( )](https://tc39.es/ecma262/#sec-moduleevaluation)
///
/// The Evaluate concrete method of a Cyclic Module Record module takes no
/// arguments and returns a Promise. Evaluate transitions this module's
/// \[\[Status]] from linked to either evaluating-async or evaluated. The
/// first time it is called on a module in a given strongly connected
/// component, Evaluate creates and returns a Promise which resolves when the
/// module has finished evaluating. This Promise is stored in the
/// \[\[TopLevelCapability]] field of the \[\[CycleRoot]] for the component.
/// Future invocations of Evaluate on any module in the component return the
/// same Promise. (Most of the work is done by the auxiliary function
/// InnerModuleEvaluation.)
#[instrument(level = "debug", skip(agent))]
pub(crate) fn evaluate(agent: &mut Agent, mut module: SourceTextModule) -> Promise {
    // 1. Assert: This call to Evaluate is not happening at the same time as
    //    another call to Evaluate within the surrounding agent.
    // 2. Assert: module.[[Status]] is one of linked, evaluating-async, or
    //    evaluated.
    match module.status(agent) {
        CyclicModuleRecordStatus::Linked => {}
        // 3. If module.[[Status]] is either evaluating-async or evaluated, then
        CyclicModuleRecordStatus::EvaluatingAsync | CyclicModuleRecordStatus::Evaluated => {
            // a. NOTE: The value of module.[[CycleRoot]] is the same across
            //    all invocations of Evaluate() on module.
            // b. Set module to module.[[CycleRoot]].
            module = module.cyclic(agent).cycle_root().unwrap_or(module);
        }
        CyclicModuleRecordStatus::Evaluating => {
            let error = agent.throw_exception_with_static_message(
                ExceptionType::TypeError,
                "Module is already being evaluated",
            );
            return Promise::new_rejected(agent, error);
        }
        CyclicModuleRecordStatus::New
        | CyclicModuleRecordStatus::Unlinked
        | CyclicModuleRecordStatus::Linking => {
            let error = agent.throw_exception_with_static_message(
                ExceptionType::TypeError,
                "Module must be linked before it can be evaluated",
            );
            return Promise::new_rejected(agent, error);
        }
    }
    // 4. If module.[[TopLevelCapability]] is not empty, then
    if let Some(capability) = module.cyclic(agent).top_level_capability() {
        // a. Return module.[[TopLevelCapability]].[[Promise]].
        return capability.promise();
    }
    // 5. Let stack be a new empty List.
    let mut stack = vec![];
    // 6. Let capability be ! NewPromiseCapability(%Promise%).
    let capability = PromiseCapability::new(agent);
    // 7. Set module.[[TopLevelCapability]] to capability.
    module.cyclic_mut(agent).top_level_capability = Some(capability);
    // 8. Let result be Completion(InnerModuleEvaluation(module, stack, 0)).
    let result = inner_module_evaluation(agent, module.into(), &mut stack, 0, 0);
    match result {
        // 9. If result is an abrupt completion, then
        Err(error) => {
            // a. For each Cyclic Module Record m of stack, do
            for m in stack {
                // i. Assert: m.[[Status]] is evaluating.
                debug_assert_eq!(m.status(agent), CyclicModuleRecordStatus::Evaluating);
                // ii. Set m.[[Status]] to evaluated.
                // iii. Set m.[[EvaluationError]] to result.
                m.cyclic_mut(agent).set_evaluation_error(error);
            }
            // b. Assert: module.[[Status]] is evaluated.
            debug_assert_eq!(module.status(agent), CyclicModuleRecordStatus::Evaluated);
            // c. Assert: module.[[EvaluationError]] and result are the same
            //    Completion Record.
            debug!(error = %error.to_string(agent), "evaluation failed");
            // d. Perform ! Call(capability.[[Reject]], undefined,
            //    « result.[[Value]] »).
            capability.reject(agent, error);
        }
        // 10. Else,
        Ok(_) => {
            // a. Assert: module.[[Status]] is either evaluating-async or
            //    evaluated.
            // b. Assert: module.[[EvaluationError]] is empty.
            // c. If module.[[Status]] is evaluated, then
            if module.status(agent) == CyclicModuleRecordStatus::Evaluated {
                // i. NOTE: This implies that evaluation of module completed
                //    synchronously.
                // ii. Assert: module.[[AsyncEvaluationOrder]] is either unset
                //     or done.
                // iii. Perform ! Call(capability.[[Resolve]], undefined,
                //      « undefined »).
                capability.resolve(agent, Value::Undefined);
            }
            // d. Assert: stack is empty.
            debug_assert!(stack.is_empty());
        }
    }
    // 11. Return capability.[[Promise]].
    capability.promise()
}

/// ### [16.2.1.5.3 EvaluateModuleSync ( module )](https://tc39.es/ecma262/#sec-EvaluateModuleSync)
///
/// Evaluates a module that is not a Cyclic Module Record, whose evaluation
/// always completes synchronously.
fn evaluate_module_sync(agent: &mut Agent, module: Module) -> JsResult<()> {
    // 1. Assert: module is not a Cyclic Module Record.
    // 2. Let promise be module.Evaluate().
    let promise = module.evaluate(agent);
    // 3. Assert: promise.[[PromiseState]] is either fulfilled or rejected.
    match promise.state(agent) {
        // 4. If promise.[[PromiseState]] is rejected, then
        //    c. Return ThrowCompletion(promise.[[PromiseResult]]).
        PromiseState::Rejected(error) => Err(error),
        // 5. Return unused.
        PromiseState::Fulfilled(_) => Ok(()),
        PromiseState::Pending => Err(agent.throw_exception_with_static_message(
            ExceptionType::TypeError,
            "Synthetic module evaluation did not complete synchronously",
        )),
    }
}

/// ### [16.2.1.6.1.3.1 InnerModuleEvaluation ( module, stack, index )](https://tc39.es/ecma262/#sec-innermoduleevaluation)
///
/// The abstract operation InnerModuleEvaluation takes arguments module (a
/// Module Record), stack (a List of Cyclic Module Records), and index (a
/// non-negative integer) and returns either a normal completion containing a
/// non-negative integer or a throw completion. It is used by Evaluate to
/// perform the actual evaluation process for module, as well as recursively
/// on all other modules in the dependency graph. The stack and index
/// parameters, as well as module's \[\[DFSIndex]] and \[\[DFSAncestorIndex]]
/// fields, are used the same way as in InnerModuleLinking.
fn inner_module_evaluation(
    agent: &mut Agent,
    module: Module,
    stack: &mut Vec<SourceTextModule>,
    index: u32,
    depth: u32,
) -> JsResult<u32> {
    let module = match module {
        Module::SourceText(module) => module,
        // 1. If module is not a Cyclic Module Record, then
        Module::Synthetic(_) => {
            // a. Perform ? EvaluateModuleSync(module).
            evaluate_module_sync(agent, module)?;
            // b. Return index.
            return Ok(index);
        }
    };
    match module.status(agent) {
        // 2. If module.[[Status]] is either evaluating-async or evaluated, then
        CyclicModuleRecordStatus::EvaluatingAsync | CyclicModuleRecordStatus::Evaluated => {
            // a. If module.[[EvaluationError]] is empty, return index.
            // b. Otherwise, return ? module.[[EvaluationError]].
            return match module.cyclic(agent).evaluation_error() {
                Some(error) => Err(error),
                None => Ok(index),
            };
        }
        // 3. If module.[[Status]] is evaluating, return index.
        CyclicModuleRecordStatus::Evaluating => return Ok(index),
        // 4. Assert: module.[[Status]] is linked.
        CyclicModuleRecordStatus::Linked => {}
        CyclicModuleRecordStatus::New
        | CyclicModuleRecordStatus::Unlinked
        | CyclicModuleRecordStatus::Linking => {
            return Err(agent.throw_exception_with_static_message(
                ExceptionType::TypeError,
                "Module dependency has not been linked",
            ));
        }
    }
    if depth >= agent.options.max_graph_depth {
        return Err(graph_too_deep(agent));
    }
    // 5. Set module.[[Status]] to evaluating.
    module.transition(agent, CyclicModuleRecordStatus::Evaluating);
    let record = module.cyclic_mut(agent);
    // 6. Set module.[[DFSIndex]] to index.
    // 7. Set module.[[DFSAncestorIndex]] to index.
    record.set_dfs_index(index);
    // 8. Set module.[[PendingAsyncDependencies]] to 0.
    record.pending_async_dependencies = 0;
    // 9. Set index to index + 1.
    let mut index = index + 1;
    // 10. Append module to stack.
    stack.push(module);
    // 11. For each ModuleRequest Record request of module.[[RequestedModules]], do
    //     a. Let requiredModule be GetImportedModule(module, request).
    for required_module in required_modules(agent, module)? {
        // b. Set index to ? InnerModuleEvaluation(requiredModule, stack, index).
        index = inner_module_evaluation(agent, required_module, stack, index, depth + 1)?;
        // c. If requiredModule is a Cyclic Module Record, then
        let Module::SourceText(mut required_module) = required_module else {
            continue;
        };
        // i. Assert: requiredModule.[[Status]] is one of evaluating,
        //    evaluating-async, or evaluated.
        // ii. Assert: requiredModule.[[Status]] is evaluating if and only if
        //     stack contains requiredModule.
        debug_assert_eq!(
            required_module.status(agent) == CyclicModuleRecordStatus::Evaluating,
            stack.contains(&required_module)
        );
        if required_module.status(agent) == CyclicModuleRecordStatus::Evaluating {
            // iii. If requiredModule.[[Status]] is evaluating, then
            // 1. Set module.[[DFSAncestorIndex]] to
            //    min(module.[[DFSAncestorIndex]],
            //    requiredModule.[[DFSAncestorIndex]]).
            let ancestor_index = required_module.cyclic(agent).dfs_ancestor_index();
            module
                .cyclic_mut(agent)
                .lower_dfs_ancestor_index(ancestor_index);
        } else {
            // iv. Else,
            // 1. Set requiredModule to requiredModule.[[CycleRoot]].
            required_module = required_module
                .cyclic(agent)
                .cycle_root()
                .unwrap_or(required_module);
            // 2. Assert: requiredModule.[[Status]] is either evaluating-async
            //    or evaluated.
            // 3. If requiredModule.[[EvaluationError]] is not empty, return ?
            //    requiredModule.[[EvaluationError]].
            if let Some(error) = required_module.cyclic(agent).evaluation_error() {
                return Err(error);
            }
        }
        // v. If requiredModule.[[AsyncEvaluationOrder]] is an integer, then
        if let AsyncEvaluationOrder::Order(_) = required_module.cyclic(agent).async_evaluation_order()
        {
            // 1. Set module.[[PendingAsyncDependencies]] to
            //    module.[[PendingAsyncDependencies]] + 1.
            module.cyclic_mut(agent).pending_async_dependencies += 1;
            // 2. Append module to requiredModule.[[AsyncParentModules]].
            required_module
                .cyclic_mut(agent)
                .async_parent_modules
                .push(module);
        }
    }
    let record = module.cyclic(agent);
    // 12. If module.[[PendingAsyncDependencies]] > 0 or module.[[HasTLA]] is
    //     true, then
    if record.pending_async_dependencies > 0 || record.has_tla() {
        // a. Assert: module.[[AsyncEvaluationOrder]] is unset.
        debug_assert_eq!(record.async_evaluation_order(), AsyncEvaluationOrder::Unset);
        let pending = record.pending_async_dependencies;
        // b. Set module.[[AsyncEvaluationOrder]] to
        //    IncrementModuleAsyncEvaluationCount().
        let order = agent.increment_module_async_evaluation_count();
        module.cyclic_mut(agent).async_evaluation_order = AsyncEvaluationOrder::Order(order);
        debug!(module = ?module, order, pending, "module entered async evaluation");
        module.print_internals(
            agent,
            format_args!("async evaluation order {order}, {pending} pending dependencies"),
        );
        // c. If module.[[PendingAsyncDependencies]] = 0, perform
        //    ExecuteAsyncModule(module).
        if pending == 0 {
            execute_async_module(agent, module);
        }
    } else {
        // 13. Else,
        //     a. Perform ? module.ExecuteModule().
        module.execute_module(agent, None)?;
    }
    // 14. Assert: module occurs exactly once in stack.
    debug_assert_eq!(stack.iter().filter(|m| **m == module).count(), 1);
    // 15. Assert: module.[[DFSAncestorIndex]] ≤ module.[[DFSIndex]].
    let record = module.cyclic(agent);
    debug_assert!(record.dfs_ancestor_index() <= record.dfs_index());
    // 16. If module.[[DFSAncestorIndex]] = module.[[DFSIndex]], then
    if record.dfs_ancestor_index() == record.dfs_index() {
        // a. Let done be false.
        let mut done = false;
        let mut component = vec![];
        // b. Repeat, while done is false,
        while !done {
            // i. Let requiredModule be the last element of stack.
            // ii. Remove the last element of stack.
            let Some(required_module) = stack.pop() else {
                break;
            };
            // iii. Assert: requiredModule is a Cyclic Module Record.
            // iv. Assert: requiredModule.[[AsyncEvaluationOrder]] is either an
            //     integer or unset.
            match required_module.cyclic(agent).async_evaluation_order() {
                // v. If requiredModule.[[AsyncEvaluationOrder]] is unset, set
                //    requiredModule.[[Status]] to evaluated.
                AsyncEvaluationOrder::Unset => {
                    required_module.transition(agent, CyclicModuleRecordStatus::Evaluated)
                }
                // vi. Otherwise, set requiredModule.[[Status]] to
                //     evaluating-async.
                _ => required_module.transition(agent, CyclicModuleRecordStatus::EvaluatingAsync),
            }
            // vii. If requiredModule and module are the same Module Record,
            //      set done to true.
            done = required_module == module;
            // viii. Set requiredModule.[[CycleRoot]] to module.
            required_module.cyclic_mut(agent).cycle_root = Some(module);
            component.push(required_module);
        }
        debug!(root = ?module, members = ?component, "evaluated strongly connected component");
        module.print_internals(
            agent,
            format_args!("evaluated component {:?}", component),
        );
    }
    // 17. Return index.
    Ok(index)
}

/// ### [16.2.1.6.1.3.2 ExecuteAsyncModule ( module )](https://tc39.es/ecma262/#sec-execute-async-module)
///
/// The abstract operation ExecuteAsyncModule takes argument module (a Cyclic
/// Module Record) and returns unused.
fn execute_async_module(agent: &mut Agent, module: SourceTextModule) {
    // 1. Assert: module.[[Status]] is either evaluating or evaluating-async.
    debug_assert!(matches!(
        module.status(agent),
        CyclicModuleRecordStatus::Evaluating | CyclicModuleRecordStatus::EvaluatingAsync
    ));
    // 2. Assert: module.[[HasTLA]] is true.
    debug_assert!(module.cyclic(agent).has_tla());
    // 3. Let capability be ! NewPromiseCapability(%Promise%).
    let capability = PromiseCapability::new(agent);
    // 4. Let fulfilledClosure be a new Abstract Closure with no parameters
    //    that captures module and performs the following steps when called:
    //    a. Perform AsyncModuleExecutionFulfilled(module).
    //    b. Return undefined.
    // 5. Let onFulfilled be CreateBuiltinFunction(fulfilledClosure, 0, "", « »).
    // 6. Let rejectedClosure be a new Abstract Closure with parameters
    //    (error) that captures module and performs the following steps when
    //    called:
    //    a. Perform AsyncModuleExecutionRejected(module, error).
    //    b. Return undefined.
    // 7. Let onRejected be CreateBuiltinFunction(rejectedClosure, 0, "", « »).
    // 8. Perform PerformPromiseThen(capability.[[Promise]], onFulfilled,
    //    onRejected).
    capability
        .promise()
        .perform_then(agent, PromiseReactionHandler::AsyncModule(module));
    // 9. Perform ! module.ExecuteModule(capability).
    if let Err(error) = module.execute_module(agent, Some(capability)) {
        capability.reject(agent, error);
    }
    // 10. Return unused.
}

/// ### [16.2.1.6.1.3.3 GatherAvailableAncestors ( module, execList )](https://tc39.es/ecma262/#sec-gather-available-ancestors)
///
/// When an asynchronous execution for a root module is fulfilled, this
/// function determines the list of modules which are able to synchronously
/// execute together on this completion, populating them in execList.
fn gather_available_ancestors(
    agent: &mut Agent,
    module: SourceTextModule,
    exec_list: &mut Vec<SourceTextModule>,
) {
    let mut worklist = vec![module];
    while let Some(module) = worklist.pop() {
        let parents = module.cyclic(agent).async_parent_modules.clone();
        // 1. For each Cyclic Module Record m of module.[[AsyncParentModules]], do
        for m in parents {
            // a. If execList does not contain m and
            //    m.[[CycleRoot]].[[EvaluationError]] is empty, then
            let cycle_root = m.cyclic(agent).cycle_root().unwrap_or(m);
            if exec_list.contains(&m) || cycle_root.cyclic(agent).evaluation_error().is_some() {
                continue;
            }
            let record = m.cyclic_mut(agent);
            // i. Assert: m.[[Status]] is evaluating-async.
            // ii. Assert: m.[[EvaluationError]] is empty.
            // iii. Assert: m.[[AsyncEvaluationOrder]] is an integer.
            debug_assert_eq!(record.status(), CyclicModuleRecordStatus::EvaluatingAsync);
            debug_assert!(matches!(
                record.async_evaluation_order(),
                AsyncEvaluationOrder::Order(_)
            ));
            // iv. Assert: m.[[PendingAsyncDependencies]] > 0.
            debug_assert!(record.pending_async_dependencies > 0);
            // v. Set m.[[PendingAsyncDependencies]] to
            //    m.[[PendingAsyncDependencies]] - 1.
            record.pending_async_dependencies = record.pending_async_dependencies.saturating_sub(1);
            // vi. If m.[[PendingAsyncDependencies]] = 0, then
            if record.pending_async_dependencies == 0 {
                let has_tla = record.has_tla();
                // 1. Append m to execList.
                exec_list.push(m);
                // 2. If m.[[HasTLA]] is false, perform
                //    GatherAvailableAncestors(m, execList).
                if !has_tla {
                    worklist.push(m);
                }
            }
        }
    }
    // 2. Return unused.
}

/// ### [16.2.1.6.1.3.4 AsyncModuleExecutionFulfilled ( module )](https://tc39.es/ecma262/#sec-async-module-execution-fulfilled)
///
/// The abstract operation AsyncModuleExecutionFulfilled takes argument module
/// (a Cyclic Module Record) and returns unused.
pub(crate) fn async_module_execution_fulfilled(agent: &mut Agent, module: SourceTextModule) {
    // 1. If module.[[Status]] is evaluated, then
    if module.status(agent) == CyclicModuleRecordStatus::Evaluated {
        // a. Assert: module.[[EvaluationError]] is not empty.
        debug_assert!(module.cyclic(agent).evaluation_error().is_some());
        // b. Return unused.
        return;
    }
    // 2. Assert: module.[[Status]] is evaluating-async.
    // 3. Assert: module.[[AsyncEvaluationOrder]] is an integer.
    // 4. Assert: module.[[EvaluationError]] is empty.
    debug_assert_eq!(module.status(agent), CyclicModuleRecordStatus::EvaluatingAsync);
    debug!(module = ?module, "async module execution fulfilled");
    // 5. Set module.[[AsyncEvaluationOrder]] to done.
    module.cyclic_mut(agent).async_evaluation_order = AsyncEvaluationOrder::Done;
    // 6. Set module.[[Status]] to evaluated.
    module.transition(agent, CyclicModuleRecordStatus::Evaluated);
    // 7. If module.[[TopLevelCapability]] is not empty, then
    if let Some(capability) = module.cyclic(agent).top_level_capability() {
        // a. Assert: module.[[CycleRoot]] and module are the same Module Record.
        debug_assert_eq!(module.cyclic(agent).cycle_root(), Some(module));
        // b. Perform ! Call(module.[[TopLevelCapability]].[[Resolve]],
        //    undefined, « undefined »).
        capability.resolve(agent, Value::Undefined);
    }
    // 8. Let execList be a new empty List.
    let mut exec_list = vec![];
    // 9. Perform GatherAvailableAncestors(module, execList).
    gather_available_ancestors(agent, module, &mut exec_list);
    // 10. Assert: All elements of execList have their
    //     [[AsyncEvaluationOrder]] field set to an integer,
    //     [[PendingAsyncDependencies]] field set to 0, and [[EvaluationError]]
    //     field set to empty.
    // 11. Let sortedExecList be a List whose elements are the elements of
    //     execList, sorted by their [[AsyncEvaluationOrder]] field in
    //     ascending order.
    exec_list.sort_by_key(|m| match m.cyclic(agent).async_evaluation_order() {
        AsyncEvaluationOrder::Order(order) => order,
        _ => u32::MAX,
    });
    // 12. For each Cyclic Module Record m of sortedExecList, do
    for m in exec_list {
        // a. If m.[[Status]] is evaluated, then
        if m.status(agent) == CyclicModuleRecordStatus::Evaluated {
            // i. Assert: m.[[EvaluationError]] is not empty.
            debug_assert!(m.cyclic(agent).evaluation_error().is_some());
        } else if m.cyclic(agent).has_tla() {
            // b. Else if m.[[HasTLA]] is true, then
            //    i. Perform ExecuteAsyncModule(m).
            execute_async_module(agent, m);
        } else {
            // c. Else,
            // i. Let result be m.ExecuteModule().
            match m.execute_module(agent, None) {
                // ii. If result is an abrupt completion, then
                //     1. Perform AsyncModuleExecutionRejected(m, result.[[Value]]).
                Err(error) => async_module_execution_rejected(agent, m, error),
                // iii. Else,
                Ok(()) => {
                    // 1. Set m.[[AsyncEvaluationOrder]] to done.
                    m.cyclic_mut(agent).async_evaluation_order = AsyncEvaluationOrder::Done;
                    // 2. Set m.[[Status]] to evaluated.
                    m.transition(agent, CyclicModuleRecordStatus::Evaluated);
                    // 3. If m.[[TopLevelCapability]] is not empty, then
                    if let Some(capability) = m.cyclic(agent).top_level_capability() {
                        // a. Assert: m.[[CycleRoot]] and m are the same Module Record.
                        debug_assert_eq!(m.cyclic(agent).cycle_root(), Some(m));
                        // b. Perform ! Call(m.[[TopLevelCapability]].[[Resolve]],
                        //    undefined, « undefined »).
                        capability.resolve(agent, Value::Undefined);
                    }
                }
            }
        }
    }
    // 13. Return unused.
}

/// ### [16.2.1.6.1.3.5 AsyncModuleExecutionRejected ( module, error )](https://tc39.es/ecma262/#sec-async-module-execution-rejected)
///
/// The abstract operation AsyncModuleExecutionRejected takes arguments module
/// (a Cyclic Module Record) and error (an ECMAScript language value) and
/// returns unused.
pub(crate) fn async_module_execution_rejected(
    agent: &mut Agent,
    module: SourceTextModule,
    error: JsError,
) {
    // 1. If module.[[Status]] is evaluated, then
    if module.status(agent) == CyclicModuleRecordStatus::Evaluated {
        // a. Assert: module.[[EvaluationError]] is not empty.
        debug_assert!(module.cyclic(agent).evaluation_error().is_some());
        // b. Return unused.
        return;
    }
    // 2. Assert: module.[[Status]] is evaluating-async.
    // 3. Assert: module.[[AsyncEvaluationOrder]] is an integer.
    // 4. Assert: module.[[EvaluationError]] is empty.
    debug_assert_eq!(module.status(agent), CyclicModuleRecordStatus::EvaluatingAsync);
    debug!(module = ?module, error = %error.to_string(agent), "async module execution rejected");
    // 5. Set module.[[EvaluationError]] to ThrowCompletion(error).
    // 6. Set module.[[Status]] to evaluated.
    trace!(module = ?module, from = ?CyclicModuleRecordStatus::EvaluatingAsync, to = ?CyclicModuleRecordStatus::Evaluated, "module status");
    let record = module.cyclic_mut(agent);
    record.set_evaluation_error(error);
    // 7. Set module.[[AsyncEvaluationOrder]] to done.
    record.async_evaluation_order = AsyncEvaluationOrder::Done;
    // 8. NOTE: module.[[AsyncEvaluationOrder]] is set to done for symmetry
    //    with AsyncModuleExecutionFulfilled. In InnerModuleEvaluation, the
    //    value of a module's [[AsyncEvaluationOrder]] internal slot is unused
    //    when its [[EvaluationError]] internal slot is not empty.
    // 9. For each Cyclic Module Record m of module.[[AsyncParentModules]], do
    let parents = record.async_parent_modules.clone();
    for m in parents {
        // a. Perform AsyncModuleExecutionRejected(m, error).
        async_module_execution_rejected(agent, m, error);
    }
    // 10. If module.[[TopLevelCapability]] is not empty, then
    if let Some(capability) = module.cyclic(agent).top_level_capability() {
        // a. Assert: module.[[CycleRoot]] and module are the same Module Record.
        debug_assert_eq!(module.cyclic(agent).cycle_root(), Some(module));
        // b. Perform ! Call(module.[[TopLevelCapability]].[[Reject]],
        //    undefined, « error »).
        capability.reject(agent, error);
    }
    // 11. Return unused.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lattice_moves_forward() {
        use CyclicModuleRecordStatus::*;
        assert!(New.can_transition_to(Unlinked));
        assert!(Linking.can_transition_to(Linked));
        assert!(Evaluating.can_transition_to(EvaluatingAsync));
        assert!(EvaluatingAsync.can_transition_to(Evaluated));
        assert!(!Evaluated.can_transition_to(Unlinked));
        assert!(!Linked.can_transition_to(Linking));
        assert!(!New.can_transition_to(Linking));
    }

    #[test]
    fn leaving_a_traversal_clears_dfs_indices() {
        let mut record = CyclicModuleRecord::new(false, Box::default());
        record.transition(CyclicModuleRecordStatus::Unlinked);
        record.transition(CyclicModuleRecordStatus::Linking);
        record.set_dfs_index(3);
        record.lower_dfs_ancestor_index(Some(1));
        record.lower_dfs_ancestor_index(Some(2));
        assert_eq!(record.dfs_index(), Some(3));
        assert_eq!(record.dfs_ancestor_index(), Some(1));
        record.transition(CyclicModuleRecordStatus::Linked);
        assert_eq!(record.dfs_index(), None);
        assert_eq!(record.dfs_ancestor_index(), None);
    }
}
