// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # esm_graph
//!
//! Loading, linking and evaluation of ECMAScript module graphs.
//!
//! The crate owns the module records and the graph algorithms of
//! [16.2.1 Module Semantics](https://tc39.es/ecma262/#sec-module-semantics).
//! Everything that needs a real engine (fetching source text, running module
//! bodies) is delegated to the embedder through
//! [`HostHooks`](ecmascript::execution::agent::HostHooks).

pub mod ecmascript;
pub mod heap;

pub use ecmascript::execution::{Agent, DefaultHostHooks, JsError, JsResult, Options};
pub use heap::Heap;
