// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [Synthetic Module Records](https://tc39.es/ecma262/#sec-synthetic-module-records)
//!
//! A Synthetic Module Record is used to represent information about a module
//! that is defined by the host. Its exported names are statically defined at
//! creation, while their corresponding values can change over time using
//! [`SyntheticModule::set_export`]. It has no imports or dependencies.

use std::ops::{Index, IndexMut};

use tracing::trace;

use super::abstract_module_records::{
    ExportResolution, ModuleAbstractMethods, ModuleRecord, ResolveSet, ResolvedBinding,
    ResolvedBindingName,
};
use crate::{
    ecmascript::{
        builtins::promise::Promise,
        execution::{Agent, ExceptionType, HostDefined, JsResult, ModuleEnvironment},
        scripts_and_modules::module::Module,
        types::Value,
    },
    heap::{CreateHeapData, Heap, indexes::SyntheticModuleIndex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntheticModule(pub(crate) SyntheticModuleIndex);

#[derive(Debug)]
pub struct SyntheticModuleRecord {
    pub(crate) abstract_fields: ModuleRecord,
    /// ### \[\[ExportNames]]
    ///
    /// The names of the exports of the module. This list does not contain
    /// duplicates.
    export_names: Box<[Box<str>]>,
    /// The values the exports hold once the module is evaluated, by index in
    /// `export_names`.
    values: Box<[Value]>,
    /// The promise returned by the first Evaluate() call.
    evaluation: Option<Promise>,
}

impl SyntheticModule {
    /// ### [CreateSyntheticModule ( exportNames, evaluationSteps, realm, hostDefined )](https://tc39.es/ecma262/#sec-create-synthetic-module-record)
    ///
    /// Creates a module exporting each of `exports` with the given value.
    /// When a name is repeated, the last value given for it wins.
    pub fn new<'a>(
        agent: &mut Agent,
        exports: impl IntoIterator<Item = (&'a str, Value)>,
        host_defined: Option<HostDefined>,
    ) -> Self {
        let mut export_names: Vec<Box<str>> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        for (name, value) in exports {
            match export_names.iter().position(|n| n.as_ref() == name) {
                Some(index) => values[index] = value,
                None => {
                    export_names.push(name.into());
                    values.push(value);
                }
            }
        }
        agent.heap.create(SyntheticModuleRecord {
            abstract_fields: ModuleRecord::new(host_defined),
            export_names: export_names.into_boxed_slice(),
            values: values.into_boxed_slice(),
            evaluation: None,
        })
    }

    /// ### \[\[ExportNames]]
    pub fn export_names(self, agent: &Agent) -> &[Box<str>] {
        &agent[self].export_names
    }

    /// ### \[\[Environment]]
    pub fn environment(self, agent: &Agent) -> Option<ModuleEnvironment> {
        agent[self].abstract_fields.environment
    }

    /// Whether Evaluate() has been called on this module.
    pub fn is_evaluated(self, agent: &Agent) -> bool {
        agent[self].evaluation.is_some()
    }

    /// ### [SetSyntheticModuleExport ( module, exportName, exportValue )](https://tc39.es/ecma262/#sec-setsyntheticmoduleexport)
    ///
    /// Updates the value of an export. Once the module is evaluated the new
    /// value is observable through every importer and namespace; before
    /// that, it replaces the value evaluation will write.
    pub fn set_export(self, agent: &mut Agent, export_name: &str, export_value: Value) -> JsResult<()> {
        // 1. Assert: module.[[ExportNames]] contains exportName.
        let Some(index) = agent[self]
            .export_names
            .iter()
            .position(|n| n.as_ref() == export_name)
        else {
            return Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("Synthetic module does not export '{export_name}'"),
            ));
        };
        agent[self].values[index] = export_value;
        if !self.is_evaluated(agent) {
            return Ok(());
        }
        // 2. Let envRec be module.[[Environment]].
        // 3. Assert: envRec is not empty.
        let Some(env) = self.environment(agent) else {
            return Ok(());
        };
        // 4. Perform envRec.SetMutableBinding(exportName, exportValue, true).
        env.set_mutable_binding(agent, export_name, export_value)
    }
}

impl ModuleAbstractMethods for SyntheticModule {
    /// ### [LoadRequestedModules ( )](https://tc39.es/ecma262/#sec-smr-LoadRequestedModules)
    fn load_requested_modules(
        self,
        agent: &mut Agent,
        _host_defined: Option<HostDefined>,
    ) -> Promise {
        // 1. Return ! PromiseResolve(%Promise%, undefined).
        Promise::new_resolved(agent, Value::Undefined)
    }

    /// ### [GetExportedNames ( )](https://tc39.es/ecma262/#sec-smr-getexportednames)
    fn get_exported_names(self, agent: &Agent, _export_star_set: &mut Vec<Module>) -> Vec<Box<str>> {
        // 1. Return module.[[ExportNames]].
        agent[self].export_names.to_vec()
    }

    /// ### [ResolveExport ( exportName )](https://tc39.es/ecma262/#sec-smr-resolveexport)
    fn resolve_export(
        self,
        agent: &Agent,
        export_name: &str,
        _resolve_set: &mut ResolveSet,
    ) -> ExportResolution {
        // 1. If module.[[ExportNames]] does not contain exportName, return null.
        if !agent[self]
            .export_names
            .iter()
            .any(|n| n.as_ref() == export_name)
        {
            return ExportResolution::NotFound;
        }
        // 2. Return ResolvedBinding Record { [[Module]]: module,
        //    [[BindingName]]: exportName }.
        ExportResolution::Resolved(ResolvedBinding {
            module: self.into(),
            binding_name: ResolvedBindingName::Binding(export_name.into()),
        })
    }

    /// ### [Link ( )](https://tc39.es/ecma262/#sec-smr-Link)
    fn link(self, agent: &mut Agent) -> JsResult<()> {
        if self.environment(agent).is_some() {
            return Ok(());
        }
        // 1. Let realm be module.[[Realm]].
        // 2. Let env be NewModuleEnvironment(realm.[[GlobalEnv]]).
        let env = ModuleEnvironment::new(agent, self.into());
        // 3. Set module.[[Environment]] to env.
        agent[self].abstract_fields.environment = Some(env);
        // 4. For each String exportName of module.[[ExportNames]], do
        for i in 0..agent[self].export_names.len() {
            let export_name = agent[self].export_names[i].clone();
            // a. Perform ! env.CreateMutableBinding(exportName, false).
            env.create_mutable_binding(agent, &export_name);
            // b. Perform ! env.InitializeBinding(exportName, undefined).
            env.initialize_binding(agent, &export_name, Value::Undefined)?;
        }
        trace!(module = ?self, "linked synthetic module");
        // 5. Return unused.
        Ok(())
    }

    /// ### [Evaluate ( )](https://tc39.es/ecma262/#sec-smr-Evaluate)
    fn evaluate(self, agent: &mut Agent) -> Promise {
        if let Some(promise) = agent[self].evaluation {
            return promise;
        }
        let Some(env) = self.environment(agent) else {
            let error = agent.throw_exception_with_static_message(
                ExceptionType::TypeError,
                "Module must be linked before it can be evaluated",
            );
            return Promise::new_rejected(agent, error);
        };
        // 8. Let steps be module.[[EvaluationSteps]].
        // 9. Let result be Completion(steps(module)).
        let mut result = Ok(());
        for i in 0..agent[self].export_names.len() {
            let export_name = agent[self].export_names[i].clone();
            let value = agent[self].values[i];
            result = env.set_mutable_binding(agent, &export_name, value);
            if result.is_err() {
                break;
            }
        }
        // 11. Let pc be ! NewPromiseCapability(%Promise%).
        // 12. IfAbruptRejectPromise(result, pc).
        // 13. Perform ! Call(pc.[[Resolve]], undefined, « undefined »).
        let promise = match result {
            Ok(()) => Promise::new_resolved(agent, Value::Undefined),
            Err(error) => Promise::new_rejected(agent, error),
        };
        agent[self].evaluation = Some(promise);
        // 14. Return pc.[[Promise]].
        promise
    }
}

impl Index<SyntheticModule> for Agent {
    type Output = SyntheticModuleRecord;

    fn index(&self, index: SyntheticModule) -> &Self::Output {
        &self.heap.synthetic_modules[index.0]
    }
}

impl IndexMut<SyntheticModule> for Agent {
    fn index_mut(&mut self, index: SyntheticModule) -> &mut Self::Output {
        &mut self.heap.synthetic_modules[index.0]
    }
}

impl CreateHeapData<SyntheticModuleRecord, SyntheticModule> for Heap {
    fn create(&mut self, data: SyntheticModuleRecord) -> SyntheticModule {
        self.synthetic_modules.push(data);
        SyntheticModule(SyntheticModuleIndex::last(&self.synthetic_modules))
    }
}
