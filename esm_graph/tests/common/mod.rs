// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory host for driving module graphs from tests.
//!
//! Specifiers are used as-is as the module's identity. Module bodies have no
//! code: running one records its specifier, initializes every declared
//! binding that is still uninitialized to a string naming the binding, and
//! completes. Tests can make a body throw, hold an asynchronous body until
//! they settle it, or defer a load until they finish it.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use ahash::{AHashMap, AHashSet};
use esm_graph::ecmascript::{
    builtins::promise::{Promise, PromiseCapability, PromiseState},
    execution::{Agent, ExceptionType, HostDefined, HostHooks, JsResult, Options},
    scripts_and_modules::module::{
        Module,
        module_semantics::{
            abstract_module_records::{
                ModuleAbstractMethods, ModuleLoadPayload, ModuleRequest, Referrer,
            },
            finish_loading_imported_module,
            source_text_module_records::{SourceTextModule, parse_module},
            synthetic_module_records::SyntheticModule,
        },
    },
    types::Value,
};

#[derive(Debug, Clone)]
enum Source {
    Text(&'static str),
    Synthetic(Vec<(&'static str, Value)>),
}

#[derive(Debug)]
struct PendingLoad {
    referrer: Referrer,
    request: ModuleRequest,
    payload: ModuleLoadPayload,
}

#[derive(Debug, Default)]
pub struct TestHost {
    supported_attributes: &'static [&'static str],
    sources: RefCell<AHashMap<&'static str, Source>>,
    modules: RefCell<AHashMap<String, Module>>,
    names: RefCell<AHashMap<Module, String>>,
    load_counts: RefCell<AHashMap<String, u32>>,
    loads: RefCell<Vec<String>>,
    deferred: RefCell<AHashSet<String>>,
    pending_loads: RefCell<Vec<PendingLoad>>,
    throwing: RefCell<AHashSet<String>>,
    held: RefCell<AHashSet<String>>,
    held_capabilities: RefCell<Vec<(String, PromiseCapability)>>,
    executed: RefCell<Vec<String>>,
    max_graph_depth: Cell<Option<u32>>,
}

impl TestHost {
    pub fn new() -> &'static Self {
        Box::leak(Box::default())
    }

    pub fn with_supported_attributes(attributes: &'static [&'static str]) -> &'static Self {
        Box::leak(Box::new(Self {
            supported_attributes: attributes,
            ..Default::default()
        }))
    }

    pub fn agent(&'static self) -> Agent {
        let mut options = Options::default();
        if let Some(depth) = self.max_graph_depth.get() {
            options.max_graph_depth = depth;
        }
        Agent::new(options, self)
    }

    pub fn set_max_graph_depth(&self, depth: u32) {
        self.max_graph_depth.set(Some(depth));
    }

    /// Registers a source text module.
    pub fn add(&self, specifier: &'static str, source_text: &'static str) -> &Self {
        self.sources
            .borrow_mut()
            .insert(specifier, Source::Text(source_text));
        self
    }

    /// Registers a synthetic module with the given exports.
    pub fn add_synthetic(&self, specifier: &'static str, exports: &[(&'static str, Value)]) -> &Self {
        self.sources
            .borrow_mut()
            .insert(specifier, Source::Synthetic(exports.to_vec()));
        self
    }

    /// Loads of `specifier` stay pending until [`TestHost::finish_loads`].
    pub fn defer(&self, specifier: &str) -> &Self {
        self.deferred.borrow_mut().insert(specifier.to_string());
        self
    }

    /// The body of `specifier` throws.
    pub fn throw_in(&self, specifier: &str) -> &Self {
        self.throwing.borrow_mut().insert(specifier.to_string());
        self
    }

    /// The asynchronous body of `specifier` stays suspended until
    /// [`TestHost::settle`].
    pub fn hold(&self, specifier: &str) -> &Self {
        self.held.borrow_mut().insert(specifier.to_string());
        self
    }

    /// Returns the record for `specifier`, creating it on first use.
    pub fn module(&self, agent: &mut Agent, specifier: &str) -> JsResult<Module> {
        if let Some(module) = self.modules.borrow().get(specifier).copied() {
            return Ok(module);
        }
        let source = self.sources.borrow().get(specifier).cloned();
        let module: Module = match source {
            Some(Source::Text(source_text)) => match parse_module(agent, source_text, None) {
                Ok(module) => module.into(),
                Err(errors) => {
                    return Err(agent.throw_exception(
                        ExceptionType::SyntaxError,
                        format!("{specifier}: {errors:?}"),
                    ));
                }
            },
            Some(Source::Synthetic(exports)) => {
                SyntheticModule::new(agent, exports.iter().copied(), None).into()
            }
            None => {
                return Err(agent.throw_exception(
                    ExceptionType::TypeError,
                    format!("Cannot find module '{specifier}'"),
                ));
            }
        };
        self.modules
            .borrow_mut()
            .insert(specifier.to_string(), module);
        self.names
            .borrow_mut()
            .insert(module, specifier.to_string());
        Ok(module)
    }

    /// Returns the source text record for `specifier`.
    pub fn source_text(&self, agent: &mut Agent, specifier: &str) -> SourceTextModule {
        self.module(agent, specifier)
            .unwrap()
            .as_source_text()
            .unwrap()
    }

    pub fn name_of(&self, module: Module) -> String {
        self.names
            .borrow()
            .get(&module)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of host loads requested for `specifier`.
    pub fn load_count(&self, specifier: &str) -> u32 {
        self.load_counts
            .borrow()
            .get(specifier)
            .copied()
            .unwrap_or(0)
    }

    /// Specifiers of every host load, in the order they were requested.
    pub fn loads(&self) -> Vec<String> {
        self.loads.borrow().clone()
    }

    pub fn pending_load_count(&self) -> usize {
        self.pending_loads.borrow().len()
    }

    /// Specifiers of the bodies that have run, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// Completes every deferred load, then runs the queued jobs.
    pub fn finish_loads(&self, agent: &mut Agent) {
        self.deferred.borrow_mut().clear();
        let pending = std::mem::take(&mut *self.pending_loads.borrow_mut());
        for load in pending {
            let result = self.module(agent, load.request.specifier());
            finish_loading_imported_module(agent, load.referrer, &load.request, load.payload, result);
        }
        agent.run_jobs();
    }

    /// Settles the held body of `specifier`, then runs the queued jobs.
    pub fn settle(&self, agent: &mut Agent, specifier: &str, fulfill: bool) {
        let position = self
            .held_capabilities
            .borrow()
            .iter()
            .position(|(name, _)| name == specifier)
            .unwrap_or_else(|| panic!("{specifier} has no suspended body"));
        let (_, capability) = self.held_capabilities.borrow_mut().remove(position);
        if fulfill {
            capability.resolve(agent, Value::Undefined);
        } else {
            let error = agent.throw_exception(ExceptionType::Error, format!("{specifier} rejected"));
            capability.reject(agent, error);
        }
        agent.run_jobs();
    }

    fn initialize_declarations(&self, agent: &mut Agent, module: SourceTextModule) -> JsResult<()> {
        let Some(env) = module.environment(agent) else {
            return Ok(());
        };
        let uninitialized: Vec<String> = env
            .binding_names(agent)
            .filter(|name| !env.is_initialized(agent, name))
            .map(str::to_string)
            .collect();
        for name in uninitialized {
            let value = Value::from_str(agent, &name);
            env.initialize_binding(agent, &name, value)?;
        }
        Ok(())
    }
}

impl HostHooks for TestHost {
    fn load_imported_module(
        &self,
        agent: &mut Agent,
        referrer: Referrer,
        module_request: ModuleRequest,
        _host_defined: Option<HostDefined>,
        payload: ModuleLoadPayload,
    ) {
        let specifier = module_request.specifier().to_string();
        *self
            .load_counts
            .borrow_mut()
            .entry(specifier.clone())
            .or_default() += 1;
        self.loads.borrow_mut().push(specifier.clone());
        let deferred = self.deferred.borrow().contains(&specifier);
        if deferred {
            self.pending_loads.borrow_mut().push(PendingLoad {
                referrer,
                request: module_request,
                payload,
            });
            return;
        }
        let result = self.module(agent, &specifier);
        finish_loading_imported_module(agent, referrer, &module_request, payload, result);
    }

    fn execute_module(
        &self,
        agent: &mut Agent,
        module: SourceTextModule,
        capability: Option<PromiseCapability>,
    ) -> JsResult<()> {
        let name = self.name_of(module.into());
        self.executed.borrow_mut().push(name.clone());
        let throws = self.throwing.borrow().contains(&name);
        let result = if throws {
            Err(agent.throw_exception(ExceptionType::Error, format!("{name} threw")))
        } else {
            self.initialize_declarations(agent, module)
        };
        let Some(capability) = capability else {
            return result;
        };
        match result {
            Err(error) => capability.reject(agent, error),
            Ok(()) => {
                let held = self.held.borrow().contains(&name);
                if held {
                    self.held_capabilities
                        .borrow_mut()
                        .push((name, capability));
                } else {
                    capability.resolve(agent, Value::Undefined);
                }
            }
        }
        Ok(())
    }

    fn get_supported_import_attributes(&self) -> &[&'static str] {
        self.supported_attributes
    }
}

/// Loads the graph of `specifier`, and runs jobs until loading settles.
pub fn load(agent: &mut Agent, host: &TestHost, specifier: &str) -> (SourceTextModule, Promise) {
    let module = host.source_text(agent, specifier);
    let promise = module.load_requested_modules(agent, None);
    agent.run_jobs();
    (module, promise)
}

/// Loads and links the graph of `specifier`, panicking on failure.
pub fn link(agent: &mut Agent, host: &TestHost, specifier: &str) -> SourceTextModule {
    let (module, promise) = load(agent, host, specifier);
    assert_eq!(
        promise.state(agent),
        PromiseState::Fulfilled(Value::Undefined),
        "loading {specifier} failed"
    );
    if let Err(error) = module.link(agent) {
        panic!("linking {specifier} failed: {}", error.to_string(agent));
    }
    module
}

/// Evaluates `module` and runs the queued jobs.
pub fn evaluate(agent: &mut Agent, module: SourceTextModule) -> Promise {
    let promise = module.evaluate(agent);
    agent.run_jobs();
    promise
}

/// The kind and message of a rejected promise.
pub fn rejection(agent: &Agent, promise: Promise) -> (Option<ExceptionType>, String) {
    match promise.state(agent) {
        PromiseState::Rejected(error) => (error.kind(agent), error.to_string(agent)),
        state => panic!("expected a rejected promise, got {state:?}"),
    }
}

/// A readable rendering of a binding or export value.
pub fn show(agent: &Agent, value: Value) -> String {
    value.string_repr(agent)
}
