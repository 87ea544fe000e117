// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::{Index, IndexMut};

use ahash::AHashMap;

use crate::{
    ecmascript::{
        execution::{Agent, ExceptionType, JsResult},
        scripts_and_modules::module::Module,
        types::Value,
    },
    heap::{CreateHeapData, Heap, indexes::ModuleEnvironmentIndex},
};

#[derive(Debug, Clone)]
enum Binding {
    /// A binding created by the module's own declarations. `value` is `None`
    /// while the binding is uninitialized.
    Local { value: Option<Value>, mutable: bool },
    /// An immutable indirect binding to `binding_name` in the environment of
    /// `module`.
    Import {
        module: Module,
        binding_name: Box<str>,
    },
}

#[derive(Debug)]
pub struct ModuleEnvironmentRecord {
    module: Module,
    bindings: AHashMap<Box<str>, Binding>,
}

/// ### [9.1.1.5 Module Environment Records](https://tc39.es/ecma262/#sec-module-environment-records)
/// A Module Environment Record is a Declarative Environment Record that is
/// used to represent the outer scope of an ECMAScript Module. In additional to
/// normal mutable and immutable bindings, Module Environment Records also
/// provide immutable import bindings which are bindings that provide indirect
/// access to a target binding that exists in another Environment Record.
///
/// Reads through an import binding always observe the current value of the
/// target binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleEnvironment(pub(crate) ModuleEnvironmentIndex);

impl ModuleEnvironment {
    /// ### [9.1.2.6 NewModuleEnvironment ( E )](https://tc39.es/ecma262/#sec-newmoduleenvironment)
    pub(crate) fn new(agent: &mut Agent, module: Module) -> Self {
        agent.heap.create(ModuleEnvironmentRecord {
            module,
            bindings: AHashMap::default(),
        })
    }

    /// The module whose outermost scope this environment is.
    pub fn module(self, agent: &Agent) -> Module {
        agent[self].module
    }

    /// ### [9.1.1.1.1 HasBinding ( N )](https://tc39.es/ecma262/#sec-declarative-environment-records-hasbinding-n)
    pub fn has_binding(self, agent: &Agent, name: &str) -> bool {
        agent[self].bindings.contains_key(name)
    }

    /// Names of every binding in this environment, in no particular order.
    pub fn binding_names(self, agent: &Agent) -> impl Iterator<Item = &str> {
        agent[self].bindings.keys().map(|name| name.as_ref())
    }

    /// Returns true if `name` is a local binding that has been initialized,
    /// or an import binding.
    pub fn is_initialized(self, agent: &Agent, name: &str) -> bool {
        match agent[self].bindings.get(name) {
            Some(Binding::Local { value, .. }) => value.is_some(),
            Some(Binding::Import { .. }) => true,
            None => false,
        }
    }

    /// ### [9.1.1.1.2 CreateMutableBinding ( N, D )](https://tc39.es/ecma262/#sec-declarative-environment-records-createmutablebinding-n-d)
    pub(crate) fn create_mutable_binding(self, agent: &mut Agent, name: &str) {
        // 1. Assert: envRec does not already have a binding for N.
        debug_assert!(!self.has_binding(agent, name));
        // 2. Create a mutable binding in envRec for N and record that it is
        //    uninitialized.
        agent[self].bindings.insert(
            name.into(),
            Binding::Local {
                value: None,
                mutable: true,
            },
        );
    }

    /// ### [9.1.1.1.3 CreateImmutableBinding ( N, S )](https://tc39.es/ecma262/#sec-declarative-environment-records-createimmutablebinding-n-s)
    pub(crate) fn create_immutable_binding(self, agent: &mut Agent, name: &str) {
        debug_assert!(!self.has_binding(agent, name));
        agent[self].bindings.insert(
            name.into(),
            Binding::Local {
                value: None,
                mutable: false,
            },
        );
    }

    /// ### [9.1.1.5.5 CreateImportBinding ( N, M, N2 )](https://tc39.es/ecma262/#sec-createimportbinding)
    ///
    /// Creates a new initialized immutable indirect binding for the name N.
    /// A binding must not already exist in this Environment Record for N. N2
    /// is the name of a binding that exists in M's Module Environment Record.
    /// Accesses to the value of the new binding will indirectly access the
    /// bound value of the target binding.
    pub(crate) fn create_import_binding(
        self,
        agent: &mut Agent,
        name: &str,
        module: Module,
        binding_name: &str,
    ) {
        debug_assert!(!self.has_binding(agent, name));
        agent[self].bindings.insert(
            name.into(),
            Binding::Import {
                module,
                binding_name: binding_name.into(),
            },
        );
    }

    /// ### [9.1.1.1.4 InitializeBinding ( N, V )](https://tc39.es/ecma262/#sec-declarative-environment-records-initializebinding-n-v)
    ///
    /// Sets the value of an uninitialized local binding. Engines call this
    /// when the declaration of `name` is evaluated.
    pub fn initialize_binding(self, agent: &mut Agent, name: &str, value: Value) -> JsResult<()> {
        match agent[self].bindings.get_mut(name) {
            Some(Binding::Local { value: slot, .. }) if slot.is_none() => {
                *slot = Some(value);
                Ok(())
            }
            Some(_) => Err(agent.throw_exception(
                ExceptionType::TypeError,
                format!("Binding '{name}' is already initialized"),
            )),
            None => Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("{name} is not defined"),
            )),
        }
    }

    /// ### [9.1.1.1.5 SetMutableBinding ( N, V, S )](https://tc39.es/ecma262/#sec-declarative-environment-records-setmutablebinding-n-v-s)
    ///
    /// Module code is always strict: assigning to an uninitialized binding is
    /// a ReferenceError and assigning to an immutable or import binding is a
    /// TypeError.
    pub fn set_mutable_binding(self, agent: &mut Agent, name: &str, value: Value) -> JsResult<()> {
        match agent[self].bindings.get_mut(name) {
            Some(Binding::Local {
                value: Some(slot),
                mutable: true,
            }) => {
                *slot = value;
                Ok(())
            }
            Some(Binding::Local { value: None, .. }) => Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("Cannot access '{name}' before initialization"),
            )),
            Some(_) => Err(agent.throw_exception(
                ExceptionType::TypeError,
                format!("Assignment to constant variable '{name}'"),
            )),
            None => Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("{name} is not defined"),
            )),
        }
    }

    /// ### [9.1.1.5.1 GetBindingValue ( N, S )](https://tc39.es/ecma262/#sec-module-environment-records-getbindingvalue-n-s)
    pub fn get_binding_value(self, agent: &mut Agent, name: &str) -> JsResult<Value> {
        // 1. Assert: S is true.
        // 2. Assert: envRec has a binding for N.
        let Some(binding) = agent[self].bindings.get(name) else {
            return Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("{name} is not defined"),
            ));
        };
        match binding {
            // 3. If the binding for N is an indirect binding, then
            Binding::Import {
                module,
                binding_name,
            } => {
                // a. Let M and N2 be the indirection values provided when this
                //    binding for N was created.
                let module = *module;
                let binding_name = binding_name.clone();
                // b. Let targetEnv be M.[[Environment]].
                // c. If targetEnv is empty, throw a ReferenceError exception.
                let Some(target_env) = module.environment(agent) else {
                    return Err(agent.throw_exception(
                        ExceptionType::ReferenceError,
                        format!("Cannot access '{name}' before its module is linked"),
                    ));
                };
                // d. Return ? targetEnv.GetBindingValue(N2, true).
                target_env.get_binding_value(agent, &binding_name)
            }
            // 4. If the binding for N in envRec is an uninitialized binding,
            //    throw a ReferenceError exception.
            Binding::Local { value: None, .. } => Err(agent.throw_exception(
                ExceptionType::ReferenceError,
                format!("Cannot access '{name}' before initialization"),
            )),
            // 5. Return the value currently bound to N in envRec.
            Binding::Local {
                value: Some(value), ..
            } => Ok(*value),
        }
    }
}

impl Index<ModuleEnvironment> for Agent {
    type Output = ModuleEnvironmentRecord;

    fn index(&self, index: ModuleEnvironment) -> &Self::Output {
        &self.heap.environments[index.0]
    }
}

impl IndexMut<ModuleEnvironment> for Agent {
    fn index_mut(&mut self, index: ModuleEnvironment) -> &mut Self::Output {
        &mut self.heap.environments[index.0]
    }
}

impl CreateHeapData<ModuleEnvironmentRecord, ModuleEnvironment> for Heap {
    fn create(&mut self, data: ModuleEnvironmentRecord) -> ModuleEnvironment {
        self.environments.push(data);
        ModuleEnvironment(ModuleEnvironmentIndex::last(&self.environments))
    }
}
