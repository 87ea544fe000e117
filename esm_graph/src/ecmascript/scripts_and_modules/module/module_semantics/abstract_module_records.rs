// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [16.2.1.5 Abstract Module Records](https://tc39.es/ecma262/#sec-abstract-module-records)

use ahash::{AHashMap, AHashSet};

use super::{cyclic_module_records::GraphLoadingState, source_text_module_records::SourceTextModule};
use crate::ecmascript::{
    builtins::{module::ModuleNamespace, promise::{Promise, PromiseCapability}},
    execution::{Agent, HostDefined, JsResult, ModuleEnvironment},
    scripts_and_modules::module::Module,
};

/// The fields shared by every kind of Module Record.
#[derive(Debug, Default)]
pub struct ModuleRecord {
    /// ### \[\[Environment]]
    ///
    /// The Environment Record containing the top level bindings for this
    /// module. This field is set when the module is linked.
    pub(crate) environment: Option<ModuleEnvironment>,
    /// ### \[\[Namespace]]
    ///
    /// The Module Namespace Object (28.3) if one has been created for this
    /// module.
    pub(crate) namespace: Option<ModuleNamespace>,
    /// ### \[\[HostDefined]]
    ///
    /// Field reserved for use by host environments that need to associate
    /// additional information with a module.
    pub(crate) host_defined: Option<HostDefined>,
}

impl ModuleRecord {
    pub(crate) fn new(host_defined: Option<HostDefined>) -> Self {
        Self {
            environment: None,
            namespace: None,
            host_defined,
        }
    }
}

/// ### [ImportAttribute Records](https://tc39.es/ecma262/#table-importattribute-fields)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportAttribute {
    /// ### \[\[Key]]
    key: Box<str>,
    /// ### \[\[Value]]
    value: Box<str>,
}

impl ImportAttribute {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// ### [ModuleRequest Records](https://tc39.es/ecma262/#table-modulerequest-fields)
///
/// A ModuleRequest Record represents the request to import a module with given
/// import attributes. Attributes are kept sorted by key, which makes the
/// derived equality match ModuleRequestsEqual: two requests are equal when
/// their specifiers are equal and they carry the same attributes, regardless
/// of the order those were written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRequest {
    /// ### \[\[Specifier]]
    ///
    /// The module specifier.
    specifier: Box<str>,
    /// ### \[\[Attributes]]
    ///
    /// The import attributes.
    attributes: Box<[ImportAttribute]>,
}

impl ModuleRequest {
    pub fn new(specifier: &str) -> Self {
        Self {
            specifier: specifier.into(),
            attributes: Box::default(),
        }
    }

    /// Creates a request with import attributes. If a key is repeated, its
    /// first value wins.
    pub fn with_attributes<'a>(
        specifier: &str,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut list: Vec<ImportAttribute> = Vec::new();
        for (key, value) in attributes {
            if list.iter().any(|attribute| &*attribute.key == key) {
                continue;
            }
            list.push(ImportAttribute {
                key: key.into(),
                value: value.into(),
            });
        }
        list.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            specifier: specifier.into(),
            attributes: list.into_boxed_slice(),
        }
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn attributes(&self) -> &[ImportAttribute] {
        &self.attributes
    }

    /// The value of the attribute `key`, if present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| &*attribute.key == key)
            .map(|attribute| attribute.value())
    }
}

impl From<&str> for ModuleRequest {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// ### \[\[LoadedModules]]
///
/// A map from the ModuleRequest Records used by a module (or a realm) to the
/// Module Records they were loaded as. The map does not contain two different
/// entries whose keys are ModuleRequestsEqual.
pub type LoadedModules = AHashMap<ModuleRequest, Module>;

/// ### \[\[BindingName]]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedBindingName {
    /// A binding in the Environment Record of the resolved module.
    Binding(Box<str>),
    /// The export is the namespace object of the resolved module, with no
    /// local binding in any module.
    Namespace,
}

/// ### [ResolvedBinding Record](https://tc39.es/ecma262/#resolvedbinding-record)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedBinding {
    /// ### \[\[Module]]
    pub module: Module,
    /// ### \[\[BindingName]]
    pub binding_name: ResolvedBindingName,
}

/// The result of ResolveExport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportResolution {
    Resolved(ResolvedBinding),
    /// Multiple `export *` sources provide different bindings for the name.
    Ambiguous,
    /// No binding was found, or the request is circular.
    NotFound,
}

impl ExportResolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ExportResolution::Resolved(_))
    }

    pub fn into_resolved(self) -> Option<ResolvedBinding> {
        match self {
            ExportResolution::Resolved(binding) => Some(binding),
            _ => None,
        }
    }
}

/// The resolveSet of ResolveExport: the (module, exportName) pairs already
/// being resolved. Reaching a pair twice means the request is circular.
pub type ResolveSet = AHashSet<(Module, Box<str>)>;

/// The referrer of a module load: the module whose import is being loaded,
/// or the host itself for dynamic imports issued with no active module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Referrer {
    Module(SourceTextModule),
    Host,
}

impl Referrer {
    /// The module that issued the request, if any.
    pub fn module(self) -> Option<SourceTextModule> {
        match self {
            Referrer::Module(m) => Some(m),
            Referrer::Host => None,
        }
    }
}

/// The payload that HostLoadImportedModule must pass back to
/// FinishLoadingImportedModule unchanged. Hosts should treat it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleLoadPayload {
    /// A static import discovered by LoadRequestedModules.
    GraphLoadingState(GraphLoadingState),
    /// A dynamic `import()`.
    DynamicImport(PromiseCapability),
}

/// ### [Abstract Methods of Module Records](https://tc39.es/ecma262/#table-abstract-methods-of-module-records)
pub trait ModuleAbstractMethods: Copy {
    /// ### LoadRequestedModules(\[hostDefined])
    ///
    /// Prepares the module for linking by recursively loading all its
    /// dependencies, and returns a promise.
    fn load_requested_modules(
        self,
        agent: &mut Agent,
        host_defined: Option<HostDefined>,
    ) -> Promise;

    /// ### GetExportedNames(\[exportStarSet])
    ///
    /// Return a list of all names that are either directly or indirectly
    /// exported from this module.
    ///
    /// LoadRequestedModules must have completed successfully prior to
    /// invoking this method.
    fn get_exported_names(self, agent: &Agent, export_star_set: &mut Vec<Module>) -> Vec<Box<str>>;

    /// ### ResolveExport(exportName \[, resolveSet])
    ///
    /// Return the binding of a name exported by this module. Bindings are
    /// represented by a ResolvedBinding Record, of the form { \[\[Module]]:
    /// Module Record, \[\[BindingName]]: String | NAMESPACE }. If the export
    /// is a Module Namespace Object without a direct binding in any module,
    /// \[\[BindingName]] will be set to NAMESPACE. Return NotFound if the name
    /// cannot be resolved, or Ambiguous if multiple bindings were found.
    ///
    /// Each time this operation is called with a specific exportName,
    /// resolveSet pair as arguments it must return the same result.
    ///
    /// LoadRequestedModules must have completed successfully prior to
    /// invoking this method.
    fn resolve_export(
        self,
        agent: &Agent,
        export_name: &str,
        resolve_set: &mut ResolveSet,
    ) -> ExportResolution;

    /// ### Link()
    ///
    /// Prepare the module for evaluation by transitively resolving all module
    /// dependencies and creating a Module Environment Record.
    ///
    /// LoadRequestedModules must have completed successfully prior to
    /// invoking this method.
    fn link(self, agent: &mut Agent) -> JsResult<()>;

    /// ### Evaluate()
    ///
    /// Returns a promise for the evaluation of this module and its
    /// dependencies, resolving on successful evaluation or if it has already
    /// been evaluated successfully, and rejecting for an evaluation error or
    /// if it has already been evaluated unsuccessfully. If the promise is
    /// rejected, hosts are expected to handle the promise rejection and
    /// rethrow the evaluation error.
    ///
    /// Link must have completed successfully prior to invoking this method.
    fn evaluate(self, agent: &mut Agent) -> Promise;
}

/// ### [16.2.1.10 GetImportedModule ( referrer, request )](https://tc39.es/ecma262/#sec-GetImportedModule)
///
/// Returns `None` if the request has not been loaded. After a successful
/// LoadRequestedModules this only happens for requests the referrer does not
/// make.
pub(crate) fn get_imported_module(
    agent: &Agent,
    referrer: SourceTextModule,
    request: &ModuleRequest,
) -> Option<Module> {
    // 1. Let records be a List consisting of each LoadedModuleRequest Record
    //    r of referrer.[[LoadedModules]] such that ModuleRequestsEqual(r,
    //    request) is true.
    // 2. Assert: records has exactly one element, since LoadRequestedModules
    //    has completed successfully on referrer prior to invoking this
    //    abstract operation.
    // 3. Let record be the sole element of records.
    // 4. Return record.[[Module]].
    referrer.loaded_module(agent, request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_with_reordered_attributes_are_equal() {
        let a = ModuleRequest::with_attributes("./data.json", [("type", "json"), ("mode", "x")]);
        let b = ModuleRequest::with_attributes("./data.json", [("mode", "x"), ("type", "json")]);
        assert_eq!(a, b);
        assert_eq!(a.attributes()[0].key(), "mode");
        assert_ne!(a, ModuleRequest::new("./data.json"));
        assert_eq!(a.attribute("type"), Some("json"));
    }

    #[test]
    fn repeated_attribute_keys_keep_first_value() {
        let request = ModuleRequest::with_attributes("./a.js", [("type", "json"), ("type", "css")]);
        assert_eq!(request.attributes().len(), 1);
        assert_eq!(request.attribute("type"), Some("json"));
    }
}
