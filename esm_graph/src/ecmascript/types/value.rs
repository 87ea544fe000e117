// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::HeapString;
use crate::ecmascript::{
    builtins::{
        error::Error,
        module::{MODULE_NAMESPACE_TO_STRING_TAG, ModuleNamespace},
    },
    execution::Agent,
};

/// ### [6.1 ECMAScript Language Types](https://tc39.es/ecma262/#sec-ecmascript-language-types)
///
/// The subset of language values that module linking and evaluation moves
/// around: whatever a module body stores into its bindings, the namespace
/// objects handed out for `import * as ns`, and thrown errors.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(HeapString),
    /// A Module Namespace Exotic Object.
    Namespace(ModuleNamespace),
    /// An Error object.
    Error(Error),
}

impl Value {
    pub fn from_str(agent: &mut Agent, data: &str) -> Self {
        Self::String(HeapString::from_str(agent, data))
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Human readable rendering of the value, used by hosts when reporting
    /// uncaught exceptions.
    pub fn string_repr(self, agent: &Agent) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(value) => value.to_string(),
            Value::Number(value) => value.to_string(),
            Value::String(string) => string.as_str(agent).to_string(),
            Value::Namespace(_) => format!("[object {MODULE_NAMESPACE_TO_STRING_TAG}]"),
            Value::Error(error) => {
                let data = &agent[error];
                format!("{}: {}", data.kind.name(), data.message)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<HeapString> for Value {
    fn from(value: HeapString) -> Self {
        Self::String(value)
    }
}

impl From<ModuleNamespace> for Value {
    fn from(value: ModuleNamespace) -> Self {
        Self::Namespace(value)
    }
}

impl From<Error> for Value {
    fn from(value: Error) -> Self {
        Self::Error(value)
    }
}
