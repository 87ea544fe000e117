// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ## [16.2 Modules](https://tc39.es/ecma262/#sec-modules)

pub mod module_semantics;

use module_semantics::{
    abstract_module_records::{
        ExportResolution, ModuleAbstractMethods, ModuleRecord, ResolveSet,
    },
    source_text_module_records::SourceTextModule,
    synthetic_module_records::SyntheticModule,
};

use crate::ecmascript::{
    builtins::{module::ModuleNamespace, promise::Promise},
    execution::{Agent, HostDefined, JsResult, ModuleEnvironment},
};

/// A Module Record of any kind.
///
/// The set of module kinds is closed: source text modules take part in the
/// cyclic link and evaluate algorithms, synthetic modules are leaves with a
/// fixed list of exports provided by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    SourceText(SourceTextModule),
    Synthetic(SyntheticModule),
}

impl Module {
    pub(crate) fn record(self, agent: &Agent) -> &ModuleRecord {
        match self {
            Module::SourceText(m) => &agent[m].abstract_fields,
            Module::Synthetic(m) => &agent[m].abstract_fields,
        }
    }

    pub(crate) fn record_mut(self, agent: &mut Agent) -> &mut ModuleRecord {
        match self {
            Module::SourceText(m) => &mut agent[m].abstract_fields,
            Module::Synthetic(m) => &mut agent[m].abstract_fields,
        }
    }

    /// ### \[\[Environment]]
    pub fn environment(self, agent: &Agent) -> Option<ModuleEnvironment> {
        self.record(agent).environment
    }

    /// ### \[\[Namespace]]
    ///
    /// The namespace object of this module, if one has been created.
    pub fn namespace(self, agent: &Agent) -> Option<ModuleNamespace> {
        self.record(agent).namespace
    }

    /// ### \[\[HostDefined]]
    pub fn host_defined(self, agent: &Agent) -> Option<HostDefined> {
        self.record(agent).host_defined.clone()
    }

    pub fn as_source_text(self) -> Option<SourceTextModule> {
        match self {
            Module::SourceText(m) => Some(m),
            Module::Synthetic(_) => None,
        }
    }

    pub fn as_synthetic(self) -> Option<SyntheticModule> {
        match self {
            Module::Synthetic(m) => Some(m),
            Module::SourceText(_) => None,
        }
    }

    /// Every name this module exports, including names reached through
    /// `export *`. Ambiguous names are not filtered out.
    pub fn exported_names(self, agent: &Agent) -> Vec<Box<str>> {
        self.get_exported_names(agent, &mut Vec::new())
    }

    /// Resolves `export_name` to the module and binding that provide it.
    pub fn resolve(self, agent: &Agent, export_name: &str) -> ExportResolution {
        self.resolve_export(agent, export_name, &mut ResolveSet::default())
    }
}

impl ModuleAbstractMethods for Module {
    fn load_requested_modules(
        self,
        agent: &mut Agent,
        host_defined: Option<HostDefined>,
    ) -> Promise {
        match self {
            Module::SourceText(m) => m.load_requested_modules(agent, host_defined),
            Module::Synthetic(m) => m.load_requested_modules(agent, host_defined),
        }
    }

    fn get_exported_names(self, agent: &Agent, export_star_set: &mut Vec<Module>) -> Vec<Box<str>> {
        match self {
            Module::SourceText(m) => m.get_exported_names(agent, export_star_set),
            Module::Synthetic(m) => m.get_exported_names(agent, export_star_set),
        }
    }

    fn resolve_export(
        self,
        agent: &Agent,
        export_name: &str,
        resolve_set: &mut ResolveSet,
    ) -> ExportResolution {
        match self {
            Module::SourceText(m) => m.resolve_export(agent, export_name, resolve_set),
            Module::Synthetic(m) => m.resolve_export(agent, export_name, resolve_set),
        }
    }

    fn link(self, agent: &mut Agent) -> JsResult<()> {
        match self {
            Module::SourceText(m) => m.link(agent),
            Module::Synthetic(m) => m.link(agent),
        }
    }

    fn evaluate(self, agent: &mut Agent) -> Promise {
        match self {
            Module::SourceText(m) => m.evaluate(agent),
            Module::Synthetic(m) => m.evaluate(agent),
        }
    }
}

impl From<SourceTextModule> for Module {
    fn from(value: SourceTextModule) -> Self {
        Module::SourceText(value)
    }
}

impl From<SyntheticModule> for Module {
    fn from(value: SyntheticModule) -> Self {
        Module::Synthetic(value)
    }
}
