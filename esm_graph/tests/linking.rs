// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::{TestHost, link, load};
use esm_graph::ecmascript::{
    execution::ExceptionType,
    scripts_and_modules::module::module_semantics::{
        abstract_module_records::ModuleAbstractMethods,
        cyclic_module_records::CyclicModuleRecordStatus,
    },
    types::Value,
};

#[test]
fn two_module_cycle_links_together() {
    let host = TestHost::new();
    host.add("a", "import { b } from 'b'; export let a = 1;")
        .add("b", "import { a } from 'a'; export let b = 2;");
    let mut agent = host.agent();

    let a = link(&mut agent, host, "a");
    let b = host.source_text(&mut agent, "b");
    assert_eq!(a.status(&agent), CyclicModuleRecordStatus::Linked);
    assert_eq!(b.status(&agent), CyclicModuleRecordStatus::Linked);

    let a_env = a.environment(&agent).unwrap();
    let b_env = b.environment(&agent).unwrap();
    assert!(a_env.has_binding(&agent, "b"));
    assert!(b_env.has_binding(&agent, "a"));
    // Imports of `let` bindings are in their temporal dead zone until the
    // exporting module runs.
    let error = a_env.get_binding_value(&mut agent, "b").unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::ReferenceError));

    b_env.initialize_binding(&mut agent, "b", Value::Number(2.0)).unwrap();
    assert_eq!(a_env.get_binding_value(&mut agent, "b").unwrap(), Value::Number(2.0));
}

#[test]
fn linking_twice_is_a_no_op() {
    let host = TestHost::new();
    host.add("main", "import { x } from 'dep';")
        .add("dep", "export var x;");
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    let env = main.environment(&agent);
    main.link(&mut agent).unwrap();
    assert_eq!(main.environment(&agent), env);
}

#[test]
fn unresolvable_import_resets_the_whole_stack() {
    let host = TestHost::new();
    host.add("a", "import 'b'; export const a = 1;")
        .add("b", "import 'a'; import { nope } from 'c';")
        .add("c", "export const c = 3;");
    let mut agent = host.agent();

    let (a, _) = load(&mut agent, host, "a");
    let error = a.link(&mut agent).unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::SyntaxError));
    assert!(error.to_string(&agent).contains("nope"));

    let b = host.source_text(&mut agent, "b");
    let c = host.source_text(&mut agent, "c");
    for module in [a, b] {
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::Unlinked);
        assert!(module.environment(&agent).is_none());
    }
    // "c" closed its own component before the failure and stays linked.
    assert_eq!(c.status(&agent), CyclicModuleRecordStatus::Linked);
    assert!(c.environment(&agent).is_some());
}

#[test]
fn ambiguous_import_is_a_syntax_error() {
    let host = TestHost::new();
    host.add("main", "import { x } from 'both';")
        .add("both", "export * from 'left'; export * from 'right';")
        .add("left", "export const x = 1;")
        .add("right", "export const x = 2;");
    let mut agent = host.agent();

    let (main, _) = load(&mut agent, host, "main");
    let error = main.link(&mut agent).unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::SyntaxError));
    assert!(error.to_string(&agent).contains("conflicting star exports"));
}

#[test]
fn unresolvable_indirect_export_fails_link() {
    let host = TestHost::new();
    host.add("main", "export { missing } from 'dep';")
        .add("dep", "export const present = 1;");
    let mut agent = host.agent();

    let (main, _) = load(&mut agent, host, "main");
    let error = main.link(&mut agent).unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::SyntaxError));
    assert_eq!(main.status(&agent), CyclicModuleRecordStatus::Unlinked);
}

#[test]
fn invalidated_module_links_again() {
    let host = TestHost::new();
    host.add("main", "import { value } from 'config';")
        .add_synthetic("config", &[("value", Value::Number(1.0))]);
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    main.invalidate(&mut agent).unwrap();
    assert_eq!(main.status(&agent), CyclicModuleRecordStatus::Unlinked);
    main.link(&mut agent).unwrap();
    assert_eq!(main.status(&agent), CyclicModuleRecordStatus::Linked);
}

#[test]
fn linking_before_loading_is_a_type_error() {
    let host = TestHost::new();
    host.add("main", "export {};");
    let mut agent = host.agent();
    let main = host.source_text(&mut agent, "main");
    let error = main.link(&mut agent).unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::TypeError));
    assert_eq!(main.status(&agent), CyclicModuleRecordStatus::New);
}

#[test]
fn deep_graphs_fail_with_a_range_error() {
    let host = TestHost::new();
    host.set_max_graph_depth(2);
    host.add("m0", "import 'm1';")
        .add("m1", "import 'm2';")
        .add("m2", "import 'm3';")
        .add("m3", "import 'm4';")
        .add("m4", "export {};");
    let mut agent = host.agent();

    let (m0, _) = load(&mut agent, host, "m0");
    let error = m0.link(&mut agent).unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::RangeError));
    for name in ["m0", "m1", "m2", "m3", "m4"] {
        let module = host.source_text(&mut agent, name);
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::Unlinked, "{name}");
    }
}

#[test]
fn graph_depth_limit_counts_the_entry_module() {
    let host = TestHost::new();
    host.set_max_graph_depth(3);
    host.add("shallow0", "import 'shallow1';")
        .add("shallow1", "import 'shallow2';")
        .add("shallow2", "export {};")
        .add("deep0", "import 'deep1';")
        .add("deep1", "import 'deep2';")
        .add("deep2", "import 'deep3';")
        .add("deep3", "export {};");
    let mut agent = host.agent();

    let shallow = link(&mut agent, host, "shallow0");
    assert_eq!(shallow.status(&agent), CyclicModuleRecordStatus::Linked);

    let (deep, _) = load(&mut agent, host, "deep0");
    let error = deep.link(&mut agent).unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::RangeError));
    assert_eq!(deep.status(&agent), CyclicModuleRecordStatus::Unlinked);
}

#[test]
fn namespace_imports_hold_the_namespace() {
    let host = TestHost::new();
    host.add("main", "import * as dep from 'dep'; export { dep };")
        .add("dep", "export const x = 1;");
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    let env = main.environment(&agent).unwrap();
    let Value::Namespace(namespace) = env.get_binding_value(&mut agent, "dep").unwrap() else {
        panic!("expected a namespace");
    };
    let dep = host.module(&mut agent, "dep").unwrap();
    assert_eq!(namespace.module(&agent), dep);
    assert_eq!(dep.namespace(&agent), Some(namespace));
    let error = env
        .set_mutable_binding(&mut agent, "dep", Value::Null)
        .unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::TypeError));
}
