// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::{TestHost, evaluate, link, load, rejection, show};
use esm_graph::ecmascript::{
    builtins::promise::PromiseState,
    execution::ExceptionType,
    scripts_and_modules::module::module_semantics::{
        abstract_module_records::ModuleAbstractMethods,
        cyclic_module_records::CyclicModuleRecordStatus,
    },
    types::Value,
};

#[test]
fn acyclic_graph_runs_dependencies_first_and_once() {
    let host = TestHost::new();
    host.add("main", "import 'a'; import 'b';")
        .add("a", "import 'shared';")
        .add("b", "import 'shared'; import 'a';")
        .add("shared", "export {};");
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    let first = evaluate(&mut agent, main);
    assert_eq!(first.state(&agent), PromiseState::Fulfilled(Value::Undefined));
    assert_eq!(host.executed(), ["shared", "a", "b", "main"]);

    let second = evaluate(&mut agent, main);
    assert_eq!(second, first);
    assert_eq!(host.executed().len(), 4);
    for name in ["main", "a", "b", "shared"] {
        let module = host.source_text(&mut agent, name);
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::Evaluated);
    }
}

#[test]
fn bodies_initialize_bindings_seen_by_importers() {
    let host = TestHost::new();
    host.add("main", "import { greeting } from 'dep'; export { greeting as renamed };")
        .add("dep", "export const greeting = 'hello';");
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    evaluate(&mut agent, main);
    let env = main.environment(&agent).unwrap();
    let value = env.get_binding_value(&mut agent, "greeting").unwrap();
    assert_eq!(show(&agent, value), "greeting");
}

#[test]
fn cycle_with_throwing_member_marks_every_member_evaluated() {
    let host = TestHost::new();
    host.add("a", "import 'b'; export {};")
        .add("b", "import 'a'; export {};")
        .throw_in("b");
    let mut agent = host.agent();

    let a = link(&mut agent, host, "a");
    let promise = evaluate(&mut agent, a);
    let (kind, message) = rejection(&agent, promise);
    assert_eq!(kind, Some(ExceptionType::Error));
    assert_eq!(message, "Error: b threw");

    let b = host.source_text(&mut agent, "b");
    for module in [a, b] {
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::Evaluated);
        assert_eq!(module.evaluation_error(&agent), promise.error(&agent));
    }
    assert_eq!(host.executed(), ["b"]);

    // Evaluating again replays the stored error without running bodies.
    assert_eq!(a.evaluate(&mut agent), promise);
    let again = b.evaluate(&mut agent);
    assert_eq!(again.error(&agent), promise.error(&agent));
    assert_eq!(host.executed(), ["b"]);
}

#[test]
fn failed_dependency_is_reported_to_a_later_importer() {
    let host = TestHost::new();
    host.add("broken", "export {};")
        .add("user", "import 'broken';")
        .throw_in("broken");
    let mut agent = host.agent();

    let broken = link(&mut agent, host, "broken");
    let first = evaluate(&mut agent, broken);
    assert!(first.error(&agent).is_some());

    let user = link(&mut agent, host, "user");
    let second = evaluate(&mut agent, user);
    assert_eq!(second.error(&agent), first.error(&agent));
    assert_eq!(user.status(&agent), CyclicModuleRecordStatus::Evaluated);
    assert_eq!(host.executed(), ["broken"]);
}

#[test]
fn evaluating_an_unlinked_module_rejects() {
    let host = TestHost::new();
    host.add("main", "export {};");
    let mut agent = host.agent();
    let (main, _) = load(&mut agent, host, "main");
    let promise = main.evaluate(&mut agent);
    assert_eq!(rejection(&agent, promise).0, Some(ExceptionType::TypeError));
    assert_eq!(main.status(&agent), CyclicModuleRecordStatus::Unlinked);
    assert!(host.executed().is_empty());
}

#[test]
fn top_level_await_defers_importers_until_it_settles() {
    let host = TestHost::new();
    host.add("a", "await 0; export const a = 1;")
        .add("b", "import { a } from 'a'; export const b = a;")
        .add("c", "import { b } from 'b';")
        .hold("a");
    let mut agent = host.agent();

    let c = link(&mut agent, host, "c");
    let promise = evaluate(&mut agent, c);
    assert!(promise.is_pending(&agent));
    assert_eq!(host.executed(), ["a"]);

    let a = host.source_text(&mut agent, "a");
    let b = host.source_text(&mut agent, "b");
    assert!(a.has_top_level_await(&agent));
    for module in [a, b, c] {
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::EvaluatingAsync);
    }
    let orders: Vec<_> = [a, b, c]
        .iter()
        .map(|m| m.async_evaluation_order(&agent).unwrap())
        .collect();
    assert!(orders[0] < orders[1] && orders[1] < orders[2], "{orders:?}");

    host.settle(&mut agent, "a", true);
    assert_eq!(promise.state(&agent), PromiseState::Fulfilled(Value::Undefined));
    assert_eq!(host.executed(), ["a", "b", "c"]);
    for module in [a, b, c] {
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::Evaluated);
        assert_eq!(module.async_evaluation_order(&agent), None);
    }
}

#[test]
fn rejected_top_level_await_stops_importers() {
    let host = TestHost::new();
    host.add("a", "await 0;")
        .add("b", "import 'a';")
        .add("c", "import 'b';")
        .hold("a");
    let mut agent = host.agent();

    let c = link(&mut agent, host, "c");
    let promise = evaluate(&mut agent, c);
    host.settle(&mut agent, "a", false);

    let (kind, message) = rejection(&agent, promise);
    assert_eq!(kind, Some(ExceptionType::Error));
    assert_eq!(message, "Error: a rejected");
    assert_eq!(host.executed(), ["a"]);
    for name in ["a", "b", "c"] {
        let module = host.source_text(&mut agent, name);
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::Evaluated);
        assert_eq!(module.evaluation_error(&agent), promise.error(&agent));
    }
}

#[test]
fn sibling_async_modules_release_their_shared_parent_once() {
    let host = TestHost::new();
    host.add("main", "import 'left'; import 'right';")
        .add("left", "await 0;")
        .add("right", "await 0;")
        .hold("left")
        .hold("right");
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    let promise = evaluate(&mut agent, main);
    assert_eq!(host.executed(), ["left", "right"]);

    host.settle(&mut agent, "right", true);
    assert!(promise.is_pending(&agent));
    assert_eq!(host.executed(), ["left", "right"]);

    host.settle(&mut agent, "left", true);
    assert_eq!(promise.state(&agent), PromiseState::Fulfilled(Value::Undefined));
    assert_eq!(host.executed(), ["left", "right", "main"]);
}

#[test]
fn ready_parents_run_in_async_evaluation_order() {
    // "first" and "second" both wait only on "slow"; "first" was visited
    // first and therefore runs first once "slow" settles.
    let host = TestHost::new();
    host.add("main", "import 'first'; import 'second';")
        .add("first", "import 'slow';")
        .add("second", "import 'slow';")
        .add("slow", "await 0;")
        .hold("slow");
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    let promise = evaluate(&mut agent, main);
    host.settle(&mut agent, "slow", true);
    assert_eq!(promise.state(&agent), PromiseState::Fulfilled(Value::Undefined));
    assert_eq!(host.executed(), ["slow", "first", "second", "main"]);
}

#[test]
fn async_cycle_completes_through_its_root() {
    let host = TestHost::new();
    host.add("a", "import 'b'; await 0;")
        .add("b", "import 'a';")
        .hold("a");
    let mut agent = host.agent();

    let a = link(&mut agent, host, "a");
    let b = host.source_text(&mut agent, "b");
    let promise = evaluate(&mut agent, a);
    // "b" only depends on "a", which is still being visited, so "b" runs
    // synchronously before "a" starts.
    assert_eq!(host.executed(), ["b", "a"]);
    assert_eq!(b.status(&agent), CyclicModuleRecordStatus::Evaluated);
    assert_eq!(a.status(&agent), CyclicModuleRecordStatus::EvaluatingAsync);
    assert_eq!(b.cycle_root(&agent), Some(a));
    // Every member of the component hands out the root's promise.
    assert_eq!(b.evaluate(&mut agent), promise);

    host.settle(&mut agent, "a", true);
    assert_eq!(promise.state(&agent), PromiseState::Fulfilled(Value::Undefined));
}

#[test]
fn rejected_async_cycle_leaves_members_that_already_ran_without_error() {
    let host = TestHost::new();
    host.add("a", "import 'b'; await 0;")
        .add("b", "import 'a';")
        .hold("a");
    let mut agent = host.agent();

    let a = link(&mut agent, host, "a");
    let b = host.source_text(&mut agent, "b");
    let promise = evaluate(&mut agent, a);
    assert_eq!(host.executed(), ["b", "a"]);

    host.settle(&mut agent, "a", false);
    let (kind, message) = rejection(&agent, promise);
    assert_eq!(kind, Some(ExceptionType::Error));
    assert_eq!(message, "Error: a rejected");
    assert_eq!(a.status(&agent), CyclicModuleRecordStatus::Evaluated);
    assert_eq!(a.evaluation_error(&agent), promise.error(&agent));
    // "b" finished its synchronous body before the root rejected, so only
    // the root records the error. Evaluating "b" again still reports it
    // through the root's promise.
    assert_eq!(b.status(&agent), CyclicModuleRecordStatus::Evaluated);
    assert_eq!(b.evaluation_error(&agent), None);
    assert_eq!(b.evaluate(&mut agent), promise);
}

#[test]
fn evaluating_a_dependency_first_reuses_its_result() {
    let host = TestHost::new();
    host.add("main", "import 'dep';")
        .add("dep", "await 0;")
        .hold("dep");
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    let dep = host.source_text(&mut agent, "dep");
    let dep_promise = evaluate(&mut agent, dep);
    let main_promise = evaluate(&mut agent, main);
    assert!(dep_promise.is_pending(&agent));
    assert!(main_promise.is_pending(&agent));

    host.settle(&mut agent, "dep", true);
    assert_eq!(dep_promise.value(&agent), Some(Value::Undefined));
    assert_eq!(main_promise.value(&agent), Some(Value::Undefined));
    assert_eq!(host.executed(), ["dep", "main"]);
}

#[test]
fn synthetic_dependencies_are_evaluated_synchronously() {
    let host = TestHost::new();
    host.add("main", "import { answer } from 'config'; export { answer };")
        .add_synthetic("config", &[("answer", Value::Number(42.0))]);
    let mut agent = host.agent();

    let main = link(&mut agent, host, "main");
    let env = main.environment(&agent).unwrap();
    assert_eq!(env.get_binding_value(&mut agent, "answer").unwrap(), Value::Undefined);
    let promise = evaluate(&mut agent, main);
    assert_eq!(promise.value(&agent), Some(Value::Undefined));
    assert_eq!(
        env.get_binding_value(&mut agent, "answer").unwrap(),
        Value::Number(42.0)
    );
    assert_eq!(host.executed(), ["main"]);
}

#[test]
fn deep_graphs_fail_evaluation_with_a_range_error() {
    // Linking the tail first keeps every link traversal within the limit,
    // while evaluating from the head walks the whole chain.
    let host = TestHost::new();
    host.set_max_graph_depth(3);
    host.add("m0", "import 'm1';")
        .add("m1", "import 'm2';")
        .add("m2", "import 'm3';")
        .add("m3", "import 'm4';")
        .add("m4", "export {};");
    let mut agent = host.agent();

    link(&mut agent, host, "m2");
    let m0 = link(&mut agent, host, "m0");
    let promise = evaluate(&mut agent, m0);
    assert_eq!(rejection(&agent, promise).0, Some(ExceptionType::RangeError));
    assert!(host.executed().is_empty());
    for name in ["m0", "m1", "m2"] {
        let module = host.source_text(&mut agent, name);
        assert_eq!(module.status(&agent), CyclicModuleRecordStatus::Evaluated, "{name}");
    }
    let m3 = host.source_text(&mut agent, "m3");
    assert_eq!(m3.status(&agent), CyclicModuleRecordStatus::Linked);
}
