// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The arena that owns every record of an [`Agent`](crate::Agent).
//!
//! Records never move and are never freed while the agent lives: handles
//! such as [`Module`](crate::ecmascript::scripts_and_modules::module::Module)
//! are plain indexes into the vectors below and stay valid for the lifetime
//! of the heap that created them.

pub mod indexes;

use crate::ecmascript::{
    builtins::{
        error::ErrorHeapData, module::ModuleNamespaceHeapData, promise::PromiseHeapData,
    },
    execution::environments::ModuleEnvironmentRecord,
    scripts_and_modules::module::module_semantics::{
        cyclic_module_records::GraphLoadingStateRecord,
        source_text_module_records::SourceTextModuleRecord,
        synthetic_module_records::SyntheticModuleRecord,
    },
    types::StringHeapData,
};

#[derive(Debug, Default)]
pub struct Heap {
    pub(crate) environments: Vec<ModuleEnvironmentRecord>,
    pub(crate) errors: Vec<ErrorHeapData>,
    /// GraphLoadingState Records of in-flight LoadRequestedModules calls.
    /// Finished states are taken out, leaving `None` behind.
    pub(crate) loading_states: Vec<Option<GraphLoadingStateRecord>>,
    pub(crate) module_namespaces: Vec<ModuleNamespaceHeapData>,
    pub(crate) promises: Vec<PromiseHeapData>,
    pub(crate) source_text_modules: Vec<SourceTextModuleRecord>,
    pub(crate) strings: Vec<StringHeapData>,
    pub(crate) synthetic_modules: Vec<SyntheticModuleRecord>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of module records, of any kind, allocated in this heap.
    pub fn module_count(&self) -> usize {
        self.source_text_modules.len() + self.synthetic_modules.len()
    }
}

pub trait CreateHeapData<T, F> {
    /// Allocates the given data in the heap and returns a handle to it.
    fn create(&mut self, data: T) -> F;
}
