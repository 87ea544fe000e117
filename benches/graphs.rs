// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synthetic module graphs and an in-memory host that serves them.

use std::cell::RefCell;

use ahash::AHashMap;
use esm_graph::{
    Agent, Options,
    ecmascript::{
        builtins::promise::{Promise, PromiseCapability},
        execution::{ExceptionType, HostDefined, HostHooks, JsResult},
        scripts_and_modules::module::{
            Module,
            module_semantics::{
                abstract_module_records::{
                    ModuleAbstractMethods, ModuleLoadPayload, ModuleRequest, Referrer,
                },
                finish_loading_imported_module,
                module_unit::{DeclarationKind, ModuleUnit},
                source_text_module_records::SourceTextModule,
            },
        },
        types::Value,
    },
};

fn name(index: usize) -> String {
    format!("m{index}")
}

/// Units keyed by specifier, with `"m0"` as the entry.
pub type Graph = AHashMap<String, ModuleUnit>;

/// `m0` imports `m1`, which imports `m2`, and so on.
pub fn deep_chain(length: usize) -> Graph {
    (0..length)
        .map(|i| {
            let mut builder = ModuleUnit::builder().export_declaration("value", DeclarationKind::Const);
            if i + 1 < length {
                builder = builder.import(name(i + 1).as_str(), "value", "next");
            }
            (name(i), builder.build())
        })
        .collect()
}

/// `m0` imports every one of `width` leaves.
pub fn wide_fan(width: usize) -> Graph {
    let mut entry = ModuleUnit::builder();
    let mut graph = Graph::default();
    for i in 1..=width {
        entry = entry.import(name(i).as_str(), "value", &format!("value{i}"));
        graph.insert(
            name(i),
            ModuleUnit::builder()
                .export_declaration("value", DeclarationKind::Let)
                .build(),
        );
    }
    graph.insert(name(0), entry.build());
    graph
}

/// A single cycle through `size` modules, each importing the next one's
/// binding.
pub fn large_cycle(size: usize) -> Graph {
    (0..size)
        .map(|i| {
            let unit = ModuleUnit::builder()
                .import(name((i + 1) % size).as_str(), "value", "next")
                .export_declaration("value", DeclarationKind::Let)
                .build();
            (name(i), unit)
        })
        .collect()
}

/// Every module exports its own binding and `export *`s from the next
/// `fanout` modules, wrapping around.
pub fn star_web(size: usize, fanout: usize) -> Graph {
    (0..size)
        .map(|i| {
            let mut builder =
                ModuleUnit::builder().export_declaration(&format!("own{i}"), DeclarationKind::Const);
            for step in 1..=fanout {
                builder = builder.export_star_from(name((i + step) % size).as_str());
            }
            (name(i), builder.build())
        })
        .collect()
}

/// Serves the units of a [`Graph`] and completes every body immediately.
#[derive(Debug, Default)]
pub struct GraphHost {
    graph: Graph,
    modules: RefCell<AHashMap<String, SourceTextModule>>,
}

impl GraphHost {
    pub fn new(graph: Graph) -> &'static Self {
        Box::leak(Box::new(Self {
            graph,
            modules: RefCell::default(),
        }))
    }

    /// A fresh agent with none of the graph's modules created yet.
    pub fn agent(&'static self) -> Agent {
        self.modules.borrow_mut().clear();
        let options = Options {
            max_graph_depth: 100_000,
            ..Default::default()
        };
        Agent::new(options, self)
    }

    pub fn module(&self, agent: &mut Agent, specifier: &str) -> Option<SourceTextModule> {
        if let Some(module) = self.modules.borrow().get(specifier).copied() {
            return Some(module);
        }
        let unit = self.graph.get(specifier)?.clone();
        let module = SourceTextModule::new(agent, unit, None);
        self.modules
            .borrow_mut()
            .insert(specifier.to_string(), module);
        Some(module)
    }

    /// Creates an agent and loads the whole graph of the entry module.
    pub fn loaded(&'static self) -> (Agent, SourceTextModule) {
        let mut agent = self.agent();
        let entry = self.entry(&mut agent);
        let promise = entry.load_requested_modules(&mut agent, None);
        agent.run_jobs();
        assert_fulfilled(&agent, promise);
        (agent, entry)
    }

    /// Creates an agent and loads and links the whole graph.
    pub fn linked(&'static self) -> (Agent, SourceTextModule) {
        let (mut agent, entry) = self.loaded();
        entry.link(&mut agent).expect("graph failed to link");
        (agent, entry)
    }

    pub fn entry(&self, agent: &mut Agent) -> SourceTextModule {
        self.module(agent, "m0").expect("graph has no entry module")
    }
}

pub fn assert_fulfilled(agent: &Agent, promise: Promise) {
    assert!(
        promise.value(agent).is_some(),
        "expected a fulfilled promise, got {:?}",
        promise.state(agent)
    );
}

impl HostHooks for GraphHost {
    fn load_imported_module(
        &self,
        agent: &mut Agent,
        referrer: Referrer,
        module_request: ModuleRequest,
        _host_defined: Option<HostDefined>,
        payload: ModuleLoadPayload,
    ) {
        let result = match self.module(agent, module_request.specifier()) {
            Some(module) => Ok(Module::from(module)),
            None => Err(agent.throw_exception(
                ExceptionType::TypeError,
                format!("Cannot find module '{}'", module_request.specifier()),
            )),
        };
        finish_loading_imported_module(agent, referrer, &module_request, payload, result);
    }

    fn execute_module(
        &self,
        agent: &mut Agent,
        module: SourceTextModule,
        capability: Option<PromiseCapability>,
    ) -> JsResult<()> {
        if let Some(env) = module.environment(agent) {
            let names: Vec<String> = env
                .binding_names(agent)
                .filter(|name| !env.is_initialized(agent, name))
                .map(str::to_string)
                .collect();
            for name in names {
                env.initialize_binding(agent, &name, Value::Undefined)?;
            }
        }
        if let Some(capability) = capability {
            capability.resolve(agent, Value::Undefined);
        }
        Ok(())
    }
}
