// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ### [9.1 Environment Records](https://tc39.es/ecma262/#sec-environment-records)
//!
//! Only the outermost scope of a module is modelled here. Function and block
//! scopes belong to whatever engine executes the module bodies.

mod module_environment;

pub use module_environment::ModuleEnvironment;
pub use module_environment::ModuleEnvironmentRecord;
