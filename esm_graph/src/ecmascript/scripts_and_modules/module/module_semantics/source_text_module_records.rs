// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [16.2.1.7 Source Text Module Records](https://tc39.es/ecma262/#sec-source-text-module-records)

use std::ops::{Index, IndexMut};

use oxc_diagnostics::OxcDiagnostic;
use tracing::trace;

use super::{
    abstract_module_records::{
        ExportResolution, LoadedModules, ModuleAbstractMethods, ModuleRecord, ModuleRequest,
        ResolveSet, ResolvedBinding, ResolvedBindingName, get_imported_module,
    },
    cyclic_module_records::{
        AsyncEvaluationOrder, CyclicModuleAbstractMethods, CyclicModuleRecord,
        CyclicModuleRecordStatus, evaluate, link, load_requested_modules,
    },
    get_module_namespace,
    module_unit::{DeclarationKind, ModuleUnit, parse_module_unit},
};
use crate::{
    ecmascript::{
        builtins::promise::{Promise, PromiseCapability},
        execution::{Agent, ExceptionType, HostDefined, JsError, JsResult, ModuleEnvironment},
        scripts_and_modules::module::Module,
        types::Value,
    },
    heap::{CreateHeapData, Heap, indexes::SourceTextModuleIndex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceTextModule(pub(crate) SourceTextModuleIndex);

#[derive(Debug)]
pub struct SourceTextModuleRecord {
    pub(crate) abstract_fields: ModuleRecord,
    pub(crate) cyclic_fields: CyclicModuleRecord,
    /// The import, export and declaration records of the module's source
    /// text: \[\[ImportEntries]], \[\[LocalExportEntries]],
    /// \[\[IndirectExportEntries]] and \[\[StarExportEntries]].
    unit: ModuleUnit,
}

impl SourceTextModule {
    /// Creates a Source Text Module Record from already extracted module
    /// records. The module starts out new; it has to be loaded with
    /// LoadRequestedModules before it can be linked.
    pub fn new(agent: &mut Agent, unit: ModuleUnit, host_defined: Option<HostDefined>) -> Self {
        let cyclic_fields = CyclicModuleRecord::new(
            unit.has_top_level_await(),
            unit.requested_modules().into(),
        );
        agent.heap.create(SourceTextModuleRecord {
            abstract_fields: ModuleRecord::new(host_defined),
            cyclic_fields,
            unit,
        })
    }

    pub(crate) fn get_index(self) -> usize {
        self.0.into_index()
    }

    pub(super) fn cyclic(self, agent: &Agent) -> &CyclicModuleRecord {
        &agent[self].cyclic_fields
    }

    pub(super) fn cyclic_mut(self, agent: &mut Agent) -> &mut CyclicModuleRecord {
        &mut agent[self].cyclic_fields
    }

    /// The module's import, export and declaration records.
    pub fn unit(self, agent: &Agent) -> &ModuleUnit {
        &agent[self].unit
    }

    /// [\[\[Status\]\]](CyclicModuleRecordStatus)
    pub fn status(self, agent: &Agent) -> CyclicModuleRecordStatus {
        self.cyclic(agent).status()
    }

    /// ### \[\[EvaluationError]]
    pub fn evaluation_error(self, agent: &Agent) -> Option<JsError> {
        self.cyclic(agent).evaluation_error()
    }

    /// ### \[\[HasTLA]]
    pub fn has_top_level_await(self, agent: &Agent) -> bool {
        self.cyclic(agent).has_tla()
    }

    /// ### \[\[AsyncEvaluationOrder]]
    ///
    /// The position of this module in the queue of asynchronous executions.
    /// `None` while unset, and again once its execution is done.
    pub fn async_evaluation_order(self, agent: &Agent) -> Option<u32> {
        match self.cyclic(agent).async_evaluation_order() {
            AsyncEvaluationOrder::Order(order) => Some(order),
            AsyncEvaluationOrder::Unset | AsyncEvaluationOrder::Done => None,
        }
    }

    /// ### \[\[CycleRoot]]
    pub fn cycle_root(self, agent: &Agent) -> Option<SourceTextModule> {
        self.cyclic(agent).cycle_root()
    }

    /// ### \[\[RequestedModules]]
    pub fn requested_modules(self, agent: &Agent) -> &[ModuleRequest] {
        &self.cyclic(agent).requested_modules
    }

    /// The module `request` was loaded as, if it has been loaded.
    pub fn loaded_module(self, agent: &Agent, request: &ModuleRequest) -> Option<Module> {
        self.cyclic(agent).loaded_modules.get(request).copied()
    }

    pub(crate) fn loaded_modules_mut(self, agent: &mut Agent) -> &mut LoadedModules {
        &mut self.cyclic_mut(agent).loaded_modules
    }

    /// ### \[\[Environment]]
    pub fn environment(self, agent: &Agent) -> Option<ModuleEnvironment> {
        Module::from(self).environment(agent)
    }

    /// Resets an unlinked, linking or linked module back to unlinked,
    /// dropping its environment so that the next Link creates a new one.
    /// Modules that have started evaluating cannot be reset.
    pub fn invalidate(self, agent: &mut Agent) -> JsResult<()> {
        match self.status(agent) {
            CyclicModuleRecordStatus::Unlinked
            | CyclicModuleRecordStatus::Linking
            | CyclicModuleRecordStatus::Linked => {
                self.reset_to_unlinked(agent);
                Ok(())
            }
            status => Err(agent.throw_exception(
                ExceptionType::TypeError,
                format!("Cannot invalidate a module that is {}", status.as_str()),
            )),
        }
    }
}

/// ### [16.2.1.7.1 ParseModule ( sourceText, realm, hostDefined )](https://tc39.es/ecma262/#sec-parsemodule)
///
/// The abstract operation ParseModule takes arguments sourceText
/// (ECMAScript source text), realm (a Realm Record), and hostDefined
/// (anything) and returns a Source Text Module Record or a non-empty List of
/// SyntaxError objects. It creates a Source Text Module Record based upon
/// the result of parsing sourceText as a Module.
pub fn parse_module(
    agent: &mut Agent,
    source_text: &str,
    host_defined: Option<HostDefined>,
) -> Result<SourceTextModule, Vec<OxcDiagnostic>> {
    // 1. Let body be ParseText(sourceText, Module).
    // 2. If body is a List of errors, return body.
    // 3. Let requestedModules be the ModuleRequests of body.
    // 4. Let importEntries be ImportEntries of body.
    // ...
    // 11. Let exportEntries be ExportEntries of body.
    let unit = parse_module_unit(source_text)?;
    // 13. Return Source Text Module Record { [[Realm]]: realm, [[Environment]]:
    //     empty, [[Namespace]]: empty, [[CycleRoot]]: empty, [[HasTLA]]:
    //     async, [[AsyncEvaluationOrder]]: unset, [[TopLevelCapability]]:
    //     empty, [[AsyncParentModules]]: « », [[PendingAsyncDependencies]]:
    //     empty, [[Status]]: new, [[EvaluationError]]: empty, [[HostDefined]]:
    //     hostDefined, [[ECMAScriptCode]]: body, [[Context]]: empty,
    //     [[ImportMeta]]: empty, [[RequestedModules]]: requestedModules,
    //     [[LoadedModules]]: « », [[ImportEntries]]: importEntries,
    //     [[LocalExportEntries]]: localExportEntries,
    //     [[IndirectExportEntries]]: indirectExportEntries,
    //     [[StarExportEntries]]: starExportEntries, [[DFSIndex]]: empty,
    //     [[DFSAncestorIndex]]: empty }.
    Ok(SourceTextModule::new(agent, unit, host_defined))
}

impl ModuleAbstractMethods for SourceTextModule {
    fn load_requested_modules(
        self,
        agent: &mut Agent,
        host_defined: Option<HostDefined>,
    ) -> Promise {
        load_requested_modules(agent, self, host_defined)
    }

    /// ### [16.2.1.7.2.1 GetExportedNames ( \[ exportStarSet \] )](https://tc39.es/ecma262/#sec-getexportednames)
    ///
    /// The GetExportedNames concrete method of a Source Text Module Record
    /// module takes optional argument exportStarSet (a List of Source Text
    /// Module Records) and returns a List of Strings.
    ///
    /// GetExportedNames does not filter out or throw an exception for names
    /// that have ambiguous star export bindings.
    fn get_exported_names(self, agent: &Agent, export_star_set: &mut Vec<Module>) -> Vec<Box<str>> {
        // 1. Assert: module.[[Status]] is not new.
        // 2. If exportStarSet is not present, set exportStarSet to a new empty List.
        // 3. If exportStarSet contains module, then
        if export_star_set.contains(&self.into()) {
            // a. Assert: We've reached the starting point of an export * circularity.
            // b. Return a new empty List.
            return vec![];
        }
        // 4. Append module to exportStarSet.
        export_star_set.push(self.into());
        let unit = self.unit(agent);
        // 5. Let exportedNames be a new empty List.
        let mut exported_names: Vec<Box<str>> = Vec::with_capacity(
            unit.local_export_entries().len() + unit.indirect_export_entries().len(),
        );
        // 6. For each ExportEntry Record e of module.[[LocalExportEntries]], do
        //    a. Assert: module provides the direct binding for this export.
        //    b. Assert: e.[[ExportName]] is not null.
        //    c. Append e.[[ExportName]] to exportedNames.
        // 7. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
        //    a. Assert: module imports a specific binding for this export.
        //    b. Assert: e.[[ExportName]] is not null.
        //    c. Append e.[[ExportName]] to exportedNames.
        let own_names = unit
            .local_export_entries()
            .iter()
            .map(|e| e.export_name())
            .chain(unit.indirect_export_entries().iter().map(|e| e.export_name()));
        for name in own_names {
            if !exported_names.iter().any(|n| n.as_ref() == name) {
                exported_names.push(name.into());
            }
        }
        // 8. For each ExportEntry Record e of module.[[StarExportEntries]], do
        for request in unit.star_export_entries() {
            // a. Assert: e.[[ModuleRequest]] is not null.
            // b. Let requestedModule be GetImportedModule(module, e.[[ModuleRequest]]).
            let Some(requested_module) = get_imported_module(agent, self, request) else {
                continue;
            };
            // c. Let starNames be requestedModule.GetExportedNames(exportStarSet).
            let star_names = requested_module.get_exported_names(agent, export_star_set);
            // d. For each element n of starNames, do
            for n in star_names {
                // i. If n is not "default", then
                //    1. If exportedNames does not contain n, then
                if n.as_ref() != "default" && !exported_names.contains(&n) {
                    // a. Append n to exportedNames.
                    exported_names.push(n);
                }
            }
        }
        // 9. Return exportedNames.
        exported_names
    }

    /// ### [16.2.1.7.2.2 ResolveExport ( exportName \[ , resolveSet \] )](https://tc39.es/ecma262/#sec-resolveexport)
    ///
    /// The ResolveExport concrete method of a Source Text Module Record
    /// module takes argument exportName (a String) and optional argument
    /// resolveSet (a List of Records with fields \[\[Module]] (a Module
    /// Record) and \[\[ExportName]] (a String)) and returns a ResolvedBinding
    /// Record, null, or ambiguous.
    ///
    /// ResolveExport attempts to resolve an imported binding to the actual
    /// defining module and local binding name. The defining module may be
    /// the module represented by the Module Record this method was invoked on
    /// or some other module that is imported by that module. The parameter
    /// resolveSet is used to detect unresolved circular import/export paths.
    /// If a pair consisting of specific Module Record and exportName is
    /// reached that is already in resolveSet, an import circularity has been
    /// encountered. Before recursively calling ResolveExport, a pair
    /// consisting of module and exportName is added to resolveSet.
    fn resolve_export(
        self,
        agent: &Agent,
        export_name: &str,
        resolve_set: &mut ResolveSet,
    ) -> ExportResolution {
        // 1. Assert: module.[[Status]] is not new.
        // 2. If resolveSet is not present, set resolveSet to a new empty List.
        // 3. For each Record { [[Module]], [[ExportName]] } r of resolveSet, do
        //    a. If module and r.[[Module]] are the same Module Record and
        //       exportName is r.[[ExportName]], then
        //       i. Assert: This is a circular import request.
        //       ii. Return null.
        // 4. Append the Record { [[Module]]: module, [[ExportName]]:
        //    exportName } to resolveSet.
        if !resolve_set.insert((self.into(), export_name.into())) {
            return ExportResolution::NotFound;
        }
        let unit = self.unit(agent);
        // 5. For each ExportEntry Record e of module.[[LocalExportEntries]], do
        for e in unit.local_export_entries() {
            // a. If e.[[ExportName]] is exportName, then
            if e.export_name() == export_name {
                // i. Assert: module provides the direct binding for this export.
                // ii. Return ResolvedBinding Record { [[Module]]: module,
                //     [[BindingName]]: e.[[LocalName]] }.
                return ExportResolution::Resolved(ResolvedBinding {
                    module: self.into(),
                    binding_name: ResolvedBindingName::Binding(e.local_name().into()),
                });
            }
        }
        // 6. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
        for e in unit.indirect_export_entries() {
            // a. If e.[[ExportName]] is exportName, then
            if e.export_name() != export_name {
                continue;
            }
            // i. Assert: e.[[ModuleRequest]] is not null.
            // ii. Let importedModule be GetImportedModule(module,
            //     e.[[ModuleRequest]]).
            let Some(imported_module) = get_imported_module(agent, self, e.module_request())
            else {
                return ExportResolution::NotFound;
            };
            return match e.import_name() {
                // iii. If e.[[ImportName]] is all, then
                None => {
                    // 1. Assert: module does not provide the direct binding
                    //    for this export.
                    // 2. Return ResolvedBinding Record { [[Module]]:
                    //    importedModule, [[BindingName]]: namespace }.
                    ExportResolution::Resolved(ResolvedBinding {
                        module: imported_module,
                        binding_name: ResolvedBindingName::Namespace,
                    })
                }
                // iv. Else,
                Some(import_name) => {
                    // 1. Assert: module imports a specific binding for this
                    //    export.
                    // 2. Return importedModule.ResolveExport(e.[[ImportName]],
                    //    resolveSet).
                    imported_module.resolve_export(agent, import_name, resolve_set)
                }
            };
        }
        // 7. If exportName is "default", then
        if export_name == "default" {
            // a. Assert: A default export was not explicitly defined by this
            //    module.
            // b. Return null.
            // c. NOTE: A default export cannot be provided by an export * from
            //    "mod" declaration.
            return ExportResolution::NotFound;
        }
        // 8. Let starResolution be null.
        let mut star_resolution: Option<ResolvedBinding> = None;
        // 9. For each ExportEntry Record e of module.[[StarExportEntries]], do
        for request in unit.star_export_entries() {
            // a. Assert: e.[[ModuleRequest]] is not null.
            // b. Let importedModule be GetImportedModule(module, e.[[ModuleRequest]]).
            let Some(imported_module) = get_imported_module(agent, self, request) else {
                continue;
            };
            // c. Let resolution be importedModule.ResolveExport(exportName,
            //    resolveSet).
            let resolution = match imported_module.resolve_export(agent, export_name, resolve_set)
            {
                // d. If resolution is ambiguous, return ambiguous.
                ExportResolution::Ambiguous => return ExportResolution::Ambiguous,
                ExportResolution::NotFound => continue,
                // e. If resolution is not null, then
                //    i. Assert: resolution is a ResolvedBinding Record.
                ExportResolution::Resolved(resolution) => resolution,
            };
            // ii. If starResolution is null, then
            //     1. Set starResolution to resolution.
            // iii. Else,
            //     1. Assert: There is more than one * import that includes
            //        the requested name.
            //     2. If resolution.[[Module]] and starResolution.[[Module]]
            //        are not the same Module Record, return ambiguous.
            //     3. If resolution.[[BindingName]] is not
            //        starResolution.[[BindingName]], return ambiguous.
            if star_resolution
                .as_ref()
                .is_some_and(|star_resolution| *star_resolution != resolution)
            {
                return ExportResolution::Ambiguous;
            }
            if star_resolution.is_none() {
                star_resolution = Some(resolution);
            }
        }
        // 10. Return starResolution.
        match star_resolution {
            Some(resolution) => ExportResolution::Resolved(resolution),
            None => ExportResolution::NotFound,
        }
    }

    fn link(self, agent: &mut Agent) -> JsResult<()> {
        link(agent, self)
    }

    fn evaluate(self, agent: &mut Agent) -> Promise {
        evaluate(agent, self)
    }
}

fn unresolvable_export_error(
    agent: &mut Agent,
    resolution: &ExportResolution,
    request: &ModuleRequest,
    name: &str,
) -> JsError {
    let message = match resolution {
        ExportResolution::Ambiguous => format!(
            "The requested module '{}' contains conflicting star exports for name '{name}'",
            request.specifier()
        ),
        _ => format!(
            "The requested module '{}' does not provide an export named '{name}'",
            request.specifier()
        ),
    };
    agent.throw_exception(ExceptionType::SyntaxError, message)
}

impl CyclicModuleAbstractMethods for SourceTextModule {
    /// ### [16.2.1.7.3.1 InitializeEnvironment ( )](https://tc39.es/ecma262/#sec-source-text-module-record-initialize-environment)
    ///
    /// The InitializeEnvironment concrete method of a Source Text Module
    /// Record module takes no arguments and returns either a normal
    /// completion containing unused or a throw completion.
    fn initialize_environment(self, agent: &mut Agent) -> JsResult<()> {
        let module = Module::from(self);
        // 1. For each ExportEntry Record e of module.[[IndirectExportEntries]], do
        for i in 0..self.unit(agent).indirect_export_entries().len() {
            let e = &self.unit(agent).indirect_export_entries()[i];
            // a. Assert: e.[[ExportName]] is not null.
            // b. Let resolution be module.ResolveExport(e.[[ExportName]]).
            let resolution = module.resolve(agent, e.export_name());
            // c. If resolution is either null or ambiguous, throw a
            //    SyntaxError exception.
            if !resolution.is_resolved() {
                let request = e.module_request().clone();
                let name = e.import_name().unwrap_or(e.export_name()).to_string();
                return Err(unresolvable_export_error(agent, &resolution, &request, &name));
            }
            // d. Assert: resolution is a ResolvedBinding Record.
        }
        // 2. Assert: All named exports from module are resolvable.
        // 3. Let realm be module.[[Realm]].
        // 4. Assert: realm is not undefined.
        // 5. Let env be NewModuleEnvironment(realm.[[GlobalEnv]]).
        debug_assert!(self.environment(agent).is_none());
        let env = ModuleEnvironment::new(agent, module);
        // 6. Set module.[[Environment]] to env.
        module.record_mut(agent).environment = Some(env);
        // 7. For each ImportEntry Record in of module.[[ImportEntries]], do
        for i in 0..self.unit(agent).import_entries().len() {
            let entry = &self.unit(agent).import_entries()[i];
            let request = entry.module_request().clone();
            let import_name = entry.import_name().map(Box::<str>::from);
            let local_name: Box<str> = entry.local_name().into();
            // a. Let importedModule be GetImportedModule(module, in.[[ModuleRequest]]).
            let Some(imported_module) = get_imported_module(agent, self, &request) else {
                return Err(agent.throw_exception(
                    ExceptionType::TypeError,
                    format!("Cannot find module '{}'", request.specifier()),
                ));
            };
            let namespace_module = match import_name {
                // b. If in.[[ImportName]] is NAMESPACE-OBJECT, then
                None => imported_module,
                // c. Else,
                Some(import_name) => {
                    // i. Let resolution be importedModule.ResolveExport(in.[[ImportName]]).
                    let resolution = imported_module.resolve(agent, &import_name);
                    match resolution {
                        // iii. If resolution.[[BindingName]] is namespace, then
                        ExportResolution::Resolved(ResolvedBinding {
                            module: target,
                            binding_name: ResolvedBindingName::Namespace,
                        }) => target,
                        // iv. Else,
                        //     1. Perform env.CreateImportBinding(in.[[LocalName]],
                        //        resolution.[[Module]], resolution.[[BindingName]]).
                        ExportResolution::Resolved(ResolvedBinding {
                            module: target,
                            binding_name: ResolvedBindingName::Binding(binding_name),
                        }) => {
                            env.create_import_binding(agent, &local_name, target, &binding_name);
                            continue;
                        }
                        // ii. If resolution is either null or ambiguous, throw
                        //     a SyntaxError exception.
                        _ => {
                            return Err(unresolvable_export_error(
                                agent,
                                &resolution,
                                &request,
                                &import_name,
                            ));
                        }
                    }
                }
            };
            // 1. Let namespace be GetModuleNamespace(importedModule).
            let namespace = get_module_namespace(agent, namespace_module)?;
            // 2. Perform ! env.CreateImmutableBinding(in.[[LocalName]], true).
            env.create_immutable_binding(agent, &local_name);
            // 3. Perform ! env.InitializeBinding(in.[[LocalName]], namespace).
            env.initialize_binding(agent, &local_name, Value::Namespace(namespace))?;
        }
        // 19. Let varDeclarations be the VarScopedDeclarations of code.
        // 22. Let lexDeclarations be the LexicallyScopedDeclarations of code.
        for i in 0..self.unit(agent).declarations().len() {
            let declaration = &self.unit(agent).declarations()[i];
            let kind = declaration.kind();
            let name: Box<str> = declaration.name().into();
            if env.has_binding(agent, &name) {
                continue;
            }
            match kind {
                // 21. For each element d of varDeclarations, do
                //     a. For each element dn of the BoundNames of d, do
                //        i. If declaredVarNames does not contain dn, then
                DeclarationKind::Var | DeclarationKind::Function => {
                    // 1. Perform ! env.CreateMutableBinding(dn, false).
                    env.create_mutable_binding(agent, &name);
                    // 2. Perform ! env.InitializeBinding(dn, undefined).
                    env.initialize_binding(agent, &name, Value::Undefined)?;
                }
                // 24. For each element d of lexDeclarations, do
                //     a. For each element dn of the BoundNames of d, do
                //        i. If IsConstantDeclaration of d is true, then
                //           1. Perform ! env.CreateImmutableBinding(dn, true).
                DeclarationKind::Const => env.create_immutable_binding(agent, &name),
                //        ii. Else,
                //            1. Perform ! env.CreateMutableBinding(dn, false).
                DeclarationKind::Let | DeclarationKind::Class => {
                    env.create_mutable_binding(agent, &name)
                }
            }
        }
        trace!(module = ?self, "initialized module environment");
        // 26. Return unused.
        Ok(())
    }

    /// ### [16.2.1.7.3.2 ExecuteModule ( \[ capability \] )](https://tc39.es/ecma262/#sec-source-text-module-record-execute-module)
    ///
    /// The ExecuteModule concrete method of a Source Text Module Record
    /// module takes optional argument capability (a PromiseCapability Record)
    /// and returns either a normal completion containing unused or a throw
    /// completion.
    fn execute_module(
        self,
        agent: &mut Agent,
        capability: Option<PromiseCapability>,
    ) -> JsResult<()> {
        // 5. Assert: module has been linked and declarations in its module
        //    environment have been instantiated.
        debug_assert!(self.environment(agent).is_some());
        // 9. If module.[[HasTLA]] is false, then
        //    a. Assert: capability is not present.
        // 10. Else,
        //     a. Assert: capability is a PromiseCapability Record.
        debug_assert_eq!(capability.is_some(), self.has_top_level_await(agent));
        trace!(module = ?self, is_async = capability.is_some(), "execute module");
        let host_hooks = agent.host_hooks;
        host_hooks.execute_module(agent, self, capability)
    }
}

impl Index<SourceTextModule> for Agent {
    type Output = SourceTextModuleRecord;

    fn index(&self, index: SourceTextModule) -> &Self::Output {
        &self.heap.source_text_modules[index.0]
    }
}

impl IndexMut<SourceTextModule> for Agent {
    fn index_mut(&mut self, index: SourceTextModule) -> &mut Self::Output {
        &mut self.heap.source_text_modules[index.0]
    }
}

impl CreateHeapData<SourceTextModuleRecord, SourceTextModule> for Heap {
    fn create(&mut self, data: SourceTextModuleRecord) -> SourceTextModule {
        self.source_text_modules.push(data);
        SourceTextModule(SourceTextModuleIndex::last(&self.source_text_modules))
    }
}
