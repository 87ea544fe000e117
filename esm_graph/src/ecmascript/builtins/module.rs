// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [10.4.6 Module Namespace Exotic Objects](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects)
//!
//! A module namespace exotic object is an exotic object that exposes the
//! bindings exported from an ECMAScript Module. There is a one-to-one
//! correspondence between the String-keyed own properties of a module
//! namespace exotic object and the binding names exported by the Module. The
//! exported bindings include any bindings that are indirectly exported using
//! `export *` export items.

use std::ops::Index;

use crate::{
    ecmascript::{
        execution::{Agent, ExceptionType, JsResult},
        scripts_and_modules::module::{
            Module,
            module_semantics::{
                abstract_module_records::{ExportResolution, ResolvedBindingName},
                get_module_namespace,
            },
        },
        types::Value,
    },
    heap::{CreateHeapData, Heap, indexes::ModuleNamespaceIndex},
};

/// Value of the namespace's `%Symbol.toStringTag%` property.
pub const MODULE_NAMESPACE_TO_STRING_TAG: &str = "Module";

#[derive(Debug)]
pub struct ModuleNamespaceHeapData {
    /// ### \[\[Module]]
    ///
    /// The Module Record whose exports this namespace exposes.
    module: Module,
    /// ### \[\[Exports]]
    ///
    /// A List whose elements are the String values of the exported names
    /// exposed as own properties of this object, sorted by code point.
    exports: Box<[Box<str>]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleNamespace(pub(crate) ModuleNamespaceIndex);

impl ModuleNamespace {
    /// ### \[\[Module]]
    pub fn module(self, agent: &Agent) -> Module {
        agent[self].module
    }

    /// ### \[\[Exports]]
    pub fn exports(self, agent: &Agent) -> &[Box<str>] {
        &agent[self].exports
    }

    /// ### [10.4.6.7 \[\[HasProperty\]\] ( P )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-hasproperty-p)
    pub fn has_export(self, agent: &Agent, name: &str) -> bool {
        // 2. Let exports be O.[[Exports]].
        // 3. If exports contains P, return true.
        // 4. Return false.
        agent[self].exports.iter().any(|export| export.as_ref() == name)
    }

    /// ### [10.4.6.8 \[\[Get\]\] ( P, Receiver )](https://tc39.es/ecma262/#sec-module-namespace-exotic-objects-get-p-receiver)
    ///
    /// Reads the current value of the export `name`. Returns `None` if the
    /// namespace has no such export.
    pub fn get(self, agent: &mut Agent, name: &str) -> JsResult<Option<Value>> {
        // 2. Let exports be O.[[Exports]].
        // 3. If exports does not contain P, return undefined.
        if !self.has_export(agent, name) {
            return Ok(None);
        }
        // 4. Let m be O.[[Module]].
        let m = self.module(agent);
        // 5. Let binding be m.ResolveExport(P).
        // 6. Assert: binding is a ResolvedBinding Record.
        let ExportResolution::Resolved(binding) = m.resolve(agent, name) else {
            return Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("Export '{name}' can no longer be resolved"),
            ));
        };
        // 7. Let targetModule be binding.[[Module]].
        // 8. Assert: targetModule is not undefined.
        let target_module = binding.module;
        let binding_name = match binding.binding_name {
            // 9. If binding.[[BindingName]] is namespace, then
            ResolvedBindingName::Namespace => {
                // a. Return GetModuleNamespace(targetModule).
                let namespace = get_module_namespace(agent, target_module)?;
                return Ok(Some(Value::Namespace(namespace)));
            }
            ResolvedBindingName::Binding(binding_name) => binding_name,
        };
        // 10. Let targetEnv be targetModule.[[Environment]].
        // 11. If targetEnv is empty, throw a ReferenceError exception.
        let Some(target_env) = target_module.environment(agent) else {
            return Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("Cannot access '{name}' before its module is linked"),
            ));
        };
        // 12. Return ? targetEnv.GetBindingValue(binding.[[BindingName]], true).
        target_env
            .get_binding_value(agent, &binding_name)
            .map(Some)
    }
}

/// ### [10.4.6.12 ModuleNamespaceCreate ( module, exports )](https://tc39.es/ecma262/#sec-modulenamespacecreate)
///
/// The abstract operation ModuleNamespaceCreate takes arguments module (a
/// Module Record) and exports (a List of Strings) and returns a module
/// namespace exotic object. It is used to specify the creation of new module
/// namespace exotic objects.
pub(crate) fn module_namespace_create(
    agent: &mut Agent,
    module: Module,
    mut exports: Vec<Box<str>>,
) -> ModuleNamespace {
    // 1. Assert: module.[[Namespace]] is empty.
    debug_assert!(module.namespace(agent).is_none());
    // 6. Let sortedExports be a List whose elements are the elements of
    //    exports, sorted by code point.
    exports.sort();
    exports.dedup();
    // 2. Let internalSlotsList be the internal slots listed in Table 33.
    // 3. Let M be MakeBasicObject(internalSlotsList).
    // 4. Set M's essential internal methods to the definitions specified in 10.4.6.
    // 5. Set M.[[Module]] to module.
    // 7. Set M.[[Exports]] to sortedExports.
    let namespace = agent.heap.create(ModuleNamespaceHeapData {
        module,
        exports: exports.into_boxed_slice(),
    });
    // 8. Create own properties of M corresponding to the definitions in 28.3.
    // 9. Set module.[[Namespace]] to M.
    module.record_mut(agent).namespace = Some(namespace);
    // 10. Return M.
    namespace
}

impl Index<ModuleNamespace> for Agent {
    type Output = ModuleNamespaceHeapData;

    fn index(&self, index: ModuleNamespace) -> &Self::Output {
        &self.heap.module_namespaces[index.0]
    }
}

impl CreateHeapData<ModuleNamespaceHeapData, ModuleNamespace> for Heap {
    fn create(&mut self, data: ModuleNamespaceHeapData) -> ModuleNamespace {
        self.module_namespaces.push(data);
        ModuleNamespace(ModuleNamespaceIndex::last(&self.module_namespaces))
    }
}
