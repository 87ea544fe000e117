// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ops::Index;

use crate::{
    ecmascript::execution::Agent,
    heap::{CreateHeapData, Heap, indexes::StringIndex},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringHeapData {
    pub(crate) data: Box<str>,
}

/// A string value allocated in the agent's heap.
///
/// Strings are not interned: two handles with equal contents may still be
/// distinct. Compare contents through [`HeapString::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapString(pub(crate) StringIndex);

impl HeapString {
    pub fn from_str(agent: &mut Agent, data: &str) -> Self {
        agent.heap.create(StringHeapData { data: data.into() })
    }

    pub fn as_str(self, agent: &Agent) -> &str {
        &agent[self].data
    }
}

impl Index<HeapString> for Agent {
    type Output = StringHeapData;

    fn index(&self, index: HeapString) -> &Self::Output {
        &self.heap.strings[index.0]
    }
}

impl CreateHeapData<StringHeapData, HeapString> for Heap {
    fn create(&mut self, data: StringHeapData) -> HeapString {
        self.strings.push(data);
        HeapString(StringIndex::last(&self.strings))
    }
}
