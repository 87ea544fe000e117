// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [16.2.1 Module Semantics](https://tc39.es/ecma262/#sec-module-semantics)

pub mod abstract_module_records;
pub mod cyclic_module_records;
pub mod module_unit;
pub mod source_text_module_records;
pub mod synthetic_module_records;

use abstract_module_records::{
    ExportResolution, ModuleAbstractMethods, ModuleLoadPayload, ModuleRequest, Referrer,
};
use cyclic_module_records::{
    CyclicModuleRecordStatus, all_import_attributes_supported, continue_module_loading,
    unsupported_import_attributes_error,
};
use tracing::{debug, instrument};

use super::Module;
use crate::ecmascript::{
    builtins::{
        module::{ModuleNamespace, module_namespace_create},
        promise::{Promise, PromiseCapability, PromiseReactionHandler},
    },
    execution::{Agent, ExceptionType, HostDefined, JsError, JsResult},
    types::Value,
};

/// ### [16.2.1.11 FinishLoadingImportedModule ( referrer, moduleRequest, payload, result )](https://tc39.es/ecma262/#sec-FinishLoadingImportedModule)
///
/// The abstract operation FinishLoadingImportedModule takes arguments
/// referrer (a Script Record, a Cyclic Module Record, or a Realm Record),
/// moduleRequest (a ModuleRequest Record), payload (a GraphLoadingState
/// Record or a PromiseCapability Record), and result (either a normal
/// completion containing a Module Record or a throw completion) and returns
/// unused.
///
/// Hosts call this exactly once for every
/// [`HostHooks::load_imported_module`](crate::ecmascript::execution::HostHooks::load_imported_module)
/// call, with the arguments they were given.
pub fn finish_loading_imported_module(
    agent: &mut Agent,
    referrer: Referrer,
    module_request: &ModuleRequest,
    payload: ModuleLoadPayload,
    result: JsResult<Module>,
) {
    // 1. If result is a normal completion, then
    let result = result.map(|module| {
        let loaded_modules = match referrer {
            Referrer::Module(referrer) => referrer.loaded_modules_mut(agent),
            Referrer::Host => &mut agent.host_loaded_modules,
        };
        // a. If referrer.[[LoadedModules]] contains a LoadedModuleRequest
        //    Record record such that ModuleRequestsEqual(record,
        //    moduleRequest) is true, then
        //    i. Assert: record.[[Module]] and result.[[Value]] are the same
        //       Module Record.
        // b. Else,
        //    i. Append the LoadedModuleRequest Record { [[Specifier]]:
        //       moduleRequest.[[Specifier]], [[Attributes]]:
        //       moduleRequest.[[Attributes]], [[Module]]: result.[[Value]] }
        //       to referrer.[[LoadedModules]].
        let cached = *loaded_modules
            .entry(module_request.clone())
            .or_insert(module);
        if cached != module {
            debug!(
                specifier = module_request.specifier(),
                "host loaded a different module for a cached request"
            );
        }
        cached
    });
    match payload {
        // 2. If payload is a GraphLoadingState Record, then
        //    a. Perform ContinueModuleLoading(payload, result).
        ModuleLoadPayload::GraphLoadingState(state) => {
            continue_module_loading(agent, state, result)
        }
        // 3. Else,
        //    a. Perform ContinueDynamicImport(payload, result).
        ModuleLoadPayload::DynamicImport(capability) => {
            continue_dynamic_import(agent, capability, result)
        }
    }
    // 4. Return unused.
}

/// ### [16.2.1.13 GetModuleNamespace ( module )](https://tc39.es/ecma262/#sec-getmodulenamespace)
///
/// The abstract operation GetModuleNamespace takes argument module (an
/// instance of a concrete subclass of Module Record) and returns a Module
/// Namespace Object. It retrieves the Module Namespace Object representing
/// module's exports, lazily creating it the first time it was requested, and
/// storing it in module.\[\[Namespace]] for future retrieval.
///
/// Names exported ambiguously through `export *` are left out of the
/// namespace. An exported name that cannot be resolved at all means the
/// graph is inconsistent, and is reported as a SyntaxError.
#[instrument(level = "debug", skip(agent))]
pub fn get_module_namespace(agent: &mut Agent, module: Module) -> JsResult<ModuleNamespace> {
    // 1. Assert: If module is a Cyclic Module Record, then module.[[Status]]
    //    is not new or unlinked.
    let unlinked = module.as_source_text().is_some_and(|m| {
        matches!(
            m.status(agent),
            CyclicModuleRecordStatus::New | CyclicModuleRecordStatus::Unlinked
        )
    });
    if unlinked {
        return Err(agent.throw_exception_with_static_message(
            ExceptionType::TypeError,
            "Cannot create the namespace of a module that has not been linked",
        ));
    }
    // 2. Let namespace be module.[[Namespace]].
    // 3. If namespace is empty, then
    if let Some(namespace) = module.namespace(agent) {
        // 4. Return namespace.
        return Ok(namespace);
    }
    // a. Let exportedNames be module.GetExportedNames().
    let exported_names = module.exported_names(agent);
    // b. Let unambiguousNames be a new empty List.
    let mut unambiguous_names = Vec::with_capacity(exported_names.len());
    // c. For each element name of exportedNames, do
    for name in exported_names {
        // i. Let resolution be module.ResolveExport(name).
        match module.resolve(agent, &name) {
            // ii. If resolution is a ResolvedBinding Record, append name to
            //     unambiguousNames.
            ExportResolution::Resolved(_) => unambiguous_names.push(name),
            ExportResolution::Ambiguous => {}
            ExportResolution::NotFound => {
                return Err(agent.throw_exception(
                    ExceptionType::SyntaxError,
                    format!("Exported name '{name}' cannot be resolved"),
                ));
            }
        }
    }
    // d. Set namespace to ModuleNamespaceCreate(module, unambiguousNames).
    let namespace = module_namespace_create(agent, module, unambiguous_names);
    debug!(module = ?module, exports = namespace.exports(agent).len(), "created module namespace");
    // 4. Return namespace.
    Ok(namespace)
}

/// ### [13.3.10.1.1 EvaluateImportCall ( specifierExpression \[ , optionsExpression \] )](https://tc39.es/ecma262/#sec-evaluate-import-call)
///
/// The part of `import()` that follows evaluating its arguments: loads the
/// requested module and its dependencies, links and evaluates it, and
/// settles the returned promise with the module's namespace.
///
/// Hosts run [`Agent::run_jobs`] to drive the import to completion.
pub fn import_dynamically(
    agent: &mut Agent,
    referrer: Referrer,
    module_request: ModuleRequest,
    host_defined: Option<HostDefined>,
) -> Promise {
    // 8. Let promiseCapability be ! NewPromiseCapability(%Promise%).
    let promise_capability = PromiseCapability::new(agent);
    // 10.g. If AllImportAttributesSupported(attributes) is false, then
    if !all_import_attributes_supported(agent, &module_request) {
        // i. Let completion be ThrowCompletion(a newly created SyntaxError
        //    object).
        let error = unsupported_import_attributes_error(agent, &module_request);
        // ii. IfAbruptRejectPromise(completion, promiseCapability).
        promise_capability.reject(agent, error);
        return promise_capability.promise();
    }
    let cached = match referrer {
        Referrer::Module(m) => m.loaded_module(agent, &module_request),
        Referrer::Host => agent.host_loaded_modules.get(&module_request).copied(),
    };
    if let Some(module) = cached {
        continue_dynamic_import(agent, promise_capability, Ok(module));
    } else {
        // 12. Perform HostLoadImportedModule(referrer, moduleRequest, empty,
        //     promiseCapability).
        let host_hooks = agent.host_hooks;
        host_hooks.load_imported_module(
            agent,
            referrer,
            module_request,
            host_defined,
            ModuleLoadPayload::DynamicImport(promise_capability),
        );
    }
    // 13. Return promiseCapability.[[Promise]].
    promise_capability.promise()
}

/// ### [16.2.1.12 ContinueDynamicImport ( promiseCapability, moduleCompletion )](https://tc39.es/ecma262/#sec-ContinueDynamicImport)
///
/// The abstract operation ContinueDynamicImport takes arguments
/// promiseCapability (a PromiseCapability Record) and moduleCompletion
/// (either a normal completion containing a Module Record or a throw
/// completion) and returns unused. It completes the process of a dynamic
/// import originally started by an import() call, resolving or rejecting the
/// promise returned by that call as appropriate.
pub(crate) fn continue_dynamic_import(
    agent: &mut Agent,
    promise_capability: PromiseCapability,
    module_completion: JsResult<Module>,
) {
    // 1. If moduleCompletion is an abrupt completion, then
    let module = match module_completion {
        Ok(module) => module,
        Err(error) => {
            // a. Perform ! Call(promiseCapability.[[Reject]], undefined,
            //    « moduleCompletion.[[Value]] »).
            promise_capability.reject(agent, error);
            // b. Return unused.
            return;
        }
    };
    // 2. Let module be moduleCompletion.[[Value]].
    // 3. Let loadPromise be module.LoadRequestedModules().
    let load_promise = module.load_requested_modules(agent, None);
    // 8. Perform PerformPromiseThen(loadPromise, linkAndEvaluate, onRejected).
    load_promise.perform_then(
        agent,
        PromiseReactionHandler::DynamicImportLoad {
            capability: promise_capability,
            module,
        },
    );
    // 9. Return unused.
}

/// The linkAndEvaluateClosure and rejectedClosure of ContinueDynamicImport,
/// called when the loadPromise settles.
pub(crate) fn dynamic_import_loaded(
    agent: &mut Agent,
    promise_capability: PromiseCapability,
    module: Module,
    argument: JsResult<Value>,
) {
    // 4. Let rejectedClosure be a new Abstract Closure with parameters
    //    (reason) that captures promiseCapability and performs the following
    //    steps when called:
    //    a. Perform ! Call(promiseCapability.[[Reject]], undefined, « reason »).
    if let Err(error) = argument {
        promise_capability.reject(agent, error);
        return;
    }
    // 6. Let linkAndEvaluateClosure be a new Abstract Closure with no
    //    parameters that captures module, promiseCapability, and onRejected
    //    and performs the following steps when called:
    // a. Let link be Completion(module.Link()).
    // b. If link is an abrupt completion, then
    if let Err(error) = module.link(agent) {
        // i. Perform ! Call(promiseCapability.[[Reject]], undefined,
        //    « link.[[Value]] »).
        promise_capability.reject(agent, error);
        // ii. Return NormalCompletion(undefined).
        return;
    }
    // c. Let evaluatePromise be module.Evaluate().
    let evaluate_promise = module.evaluate(agent);
    // f. Perform PerformPromiseThen(evaluatePromise, onFulfilled, onRejected).
    evaluate_promise.perform_then(
        agent,
        PromiseReactionHandler::DynamicImportEvaluate {
            capability: promise_capability,
            module,
        },
    );
    // g. Return unused.
}

/// The fulfilledClosure and rejectedClosure of ContinueDynamicImport, called
/// when the evaluatePromise settles.
pub(crate) fn dynamic_import_evaluated(
    agent: &mut Agent,
    promise_capability: PromiseCapability,
    module: Module,
    argument: JsResult<Value>,
) {
    let result: Result<ModuleNamespace, JsError> =
        argument.and_then(|_| get_module_namespace(agent, module));
    match result {
        // d. Let fulfilledClosure be a new Abstract Closure with no parameters
        //    that captures module and promiseCapability and performs the
        //    following steps when called:
        //    i. Let namespace be GetModuleNamespace(module).
        //    ii. Perform ! Call(promiseCapability.[[Resolve]], undefined,
        //        « namespace »).
        Ok(namespace) => promise_capability.resolve(agent, Value::Namespace(namespace)),
        Err(error) => promise_capability.reject(agent, error),
    }
}
