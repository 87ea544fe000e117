// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{
    Agent, ExceptionType, JsResult,
    agent::{HostDefined, HostHooks},
};
use crate::ecmascript::{
    builtins::promise::PromiseCapability,
    scripts_and_modules::module::module_semantics::{
        abstract_module_records::{ModuleLoadPayload, ModuleRequest, Referrer},
        finish_loading_imported_module,
        source_text_module_records::SourceTextModule,
    },
    types::Value,
};

/// Host hooks for an agent that only ever sees modules created up front.
///
/// Every import fails to load, module bodies have no observable effect and
/// asynchronous bodies complete immediately.
#[derive(Debug)]
pub struct DefaultHostHooks;

impl HostHooks for DefaultHostHooks {
    fn load_imported_module(
        &self,
        agent: &mut Agent,
        referrer: Referrer,
        module_request: ModuleRequest,
        _host_defined: Option<HostDefined>,
        payload: ModuleLoadPayload,
    ) {
        let error = agent.throw_exception(
            ExceptionType::TypeError,
            format!("Cannot load module '{}'", module_request.specifier()),
        );
        finish_loading_imported_module(agent, referrer, &module_request, payload, Err(error));
    }

    fn execute_module(
        &self,
        agent: &mut Agent,
        _module: SourceTextModule,
        capability: Option<PromiseCapability>,
    ) -> JsResult<()> {
        if let Some(capability) = capability {
            capability.resolve(agent, Value::Undefined);
        }
        Ok(())
    }
}
