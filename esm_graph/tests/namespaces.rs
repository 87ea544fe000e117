// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::{TestHost, evaluate, link, load, show};
use esm_graph::ecmascript::{
    execution::ExceptionType,
    scripts_and_modules::module::{
        Module,
        module_semantics::{
            abstract_module_records::ExportResolution, get_module_namespace,
        },
    },
    types::Value,
};

fn export_names(agent: &esm_graph::Agent, module: Module) -> Vec<String> {
    let namespace = module.namespace(agent).unwrap();
    namespace
        .exports(agent)
        .iter()
        .map(|name| name.to_string())
        .collect()
}

#[test]
fn namespace_is_created_once_and_sorted_by_code_point() {
    let host = TestHost::new();
    host.add(
        "main",
        "export const zeta = 1, Alpha = 2, beta = 3, \u{e9}t\u{e9} = 4; export default 5;",
    );
    let mut agent = host.agent();

    let main = Module::from(link(&mut agent, host, "main"));
    let first = get_module_namespace(&mut agent, main).unwrap();
    let second = get_module_namespace(&mut agent, main).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        export_names(&agent, main),
        ["Alpha", "beta", "default", "zeta", "\u{e9}t\u{e9}"]
    );
}

#[test]
fn ambiguous_star_exports_are_left_out() {
    let host = TestHost::new();
    host.add("main", "export * from 'left'; export * from 'right'; export const own = 0;")
        .add("left", "export const shared = 1, onlyLeft = 2;")
        .add("right", "export const shared = 3, onlyRight = 4;");
    let mut agent = host.agent();

    let main = Module::from(link(&mut agent, host, "main"));
    assert_eq!(main.resolve(&agent, "shared"), ExportResolution::Ambiguous);
    assert!(main.resolve(&agent, "onlyLeft").is_resolved());

    get_module_namespace(&mut agent, main).unwrap();
    assert_eq!(
        export_names(&agent, main),
        ["onlyLeft", "onlyRight", "own"]
    );
}

#[test]
fn same_binding_through_two_stars_is_not_ambiguous() {
    let host = TestHost::new();
    host.add("main", "export * from 'left'; export * from 'right';")
        .add("left", "export * from 'base';")
        .add("right", "export { value } from 'base';")
        .add("base", "export const value = 1;");
    let mut agent = host.agent();

    let main = Module::from(link(&mut agent, host, "main"));
    let base = host.module(&mut agent, "base").unwrap();
    let resolution = main.resolve(&agent, "value").into_resolved().unwrap();
    assert_eq!(resolution.module, base);
    get_module_namespace(&mut agent, main).unwrap();
    assert_eq!(export_names(&agent, main), ["value"]);
}

#[test]
fn cyclic_star_exports_terminate() {
    let host = TestHost::new();
    host.add("a", "export * from 'b'; export const fromA = 1;")
        .add("b", "export * from 'a'; export const fromB = 2;");
    let mut agent = host.agent();

    let a = Module::from(link(&mut agent, host, "a"));
    assert_eq!(a.resolve(&agent, "missing"), ExportResolution::NotFound);
    get_module_namespace(&mut agent, a).unwrap();
    assert_eq!(export_names(&agent, a), ["fromA", "fromB"]);
}

#[test]
fn namespace_reads_follow_live_bindings() {
    let host = TestHost::new();
    host.add("main", "export let counter; export { answer } from 'config'; export * as config from 'config';")
        .add_synthetic("config", &[("answer", Value::Number(1.0))]);
    let mut agent = host.agent();

    let main_record = link(&mut agent, host, "main");
    let main = Module::from(main_record);
    let namespace = get_module_namespace(&mut agent, main).unwrap();

    // Before evaluation `counter` is in its temporal dead zone.
    let error = namespace.get(&mut agent, "counter").unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::ReferenceError));

    evaluate(&mut agent, main_record);
    let counter = namespace.get(&mut agent, "counter").unwrap().unwrap();
    assert_eq!(show(&agent, counter), "counter");
    assert_eq!(
        namespace.get(&mut agent, "answer").unwrap(),
        Some(Value::Number(1.0))
    );

    let config = host.module(&mut agent, "config").unwrap();
    config
        .as_synthetic()
        .unwrap()
        .set_export(&mut agent, "answer", Value::Number(2.0))
        .unwrap();
    assert_eq!(
        namespace.get(&mut agent, "answer").unwrap(),
        Some(Value::Number(2.0))
    );

    let Some(Value::Namespace(inner)) = namespace.get(&mut agent, "config").unwrap() else {
        panic!("expected a namespace");
    };
    assert_eq!(inner.module(&agent), config);
    assert!(namespace.has_export(&agent, "config"));
    assert_eq!(namespace.get(&mut agent, "nothing").unwrap(), None);
    assert_eq!(show(&agent, Value::Namespace(inner)), "[object Module]");
}

#[test]
fn unlinked_modules_have_no_namespace() {
    let host = TestHost::new();
    host.add("main", "export const x = 1;");
    let mut agent = host.agent();

    let (main, _) = load(&mut agent, host, "main");
    let error = get_module_namespace(&mut agent, main.into()).unwrap_err();
    assert_eq!(error.kind(&agent), Some(ExceptionType::TypeError));
    assert_eq!(Module::from(main).namespace(&agent), None);
}
