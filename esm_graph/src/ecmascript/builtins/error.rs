// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::Index;

use crate::{
    ecmascript::execution::{Agent, ExceptionType},
    heap::{CreateHeapData, Heap, indexes::ErrorIndex},
};

#[derive(Debug, Clone)]
pub struct ErrorHeapData {
    pub(crate) kind: ExceptionType,
    pub(crate) message: String,
}

impl ErrorHeapData {
    pub(crate) fn new(kind: ExceptionType, message: String) -> Self {
        Self { kind, message }
    }
}

/// ### [20.5 Error Objects](https://tc39.es/ecma262/#sec-error-objects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Error(pub(crate) ErrorIndex);

impl Error {
    pub fn kind(self, agent: &Agent) -> ExceptionType {
        agent[self].kind
    }

    pub fn message(self, agent: &Agent) -> &str {
        &agent[self].message
    }
}

impl Index<Error> for Agent {
    type Output = ErrorHeapData;

    fn index(&self, index: Error) -> &Self::Output {
        &self.heap.errors[index.0]
    }
}

impl CreateHeapData<ErrorHeapData, Error> for Heap {
    fn create(&mut self, data: ErrorHeapData) -> Error {
        self.errors.push(data);
        Error(ErrorIndex::last(&self.errors))
    }
}
