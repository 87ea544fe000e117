// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use esm_graph::ecmascript::scripts_and_modules::module::module_semantics::{
    abstract_module_records::ModuleAbstractMethods, get_module_namespace,
};

mod graphs;

use graphs::{GraphHost, assert_fulfilled, deep_chain, large_cycle, star_web, wide_fan};

macro_rules! bench_graphs {
    ($($label:literal => $graph:expr,)*) => {
        fn bench_loading(c: &mut Criterion) {
            $(
                {
                    let host = GraphHost::new($graph);
                    c.bench_function(concat!($label, " (Loading)"), move |b| {
                        b.iter_batched(
                            || {
                                let mut agent = host.agent();
                                let entry = host.entry(&mut agent);
                                (agent, entry)
                            },
                            |(mut agent, entry)| {
                                let promise = entry.load_requested_modules(&mut agent, None);
                                agent.run_jobs();
                                assert_fulfilled(&agent, promise);
                            },
                            BatchSize::PerIteration,
                        )
                    });
                }
            )*
        }

        fn bench_linking(c: &mut Criterion) {
            $(
                {
                    let host = GraphHost::new($graph);
                    c.bench_function(concat!($label, " (Linking)"), move |b| {
                        b.iter_batched(
                            || host.loaded(),
                            |(mut agent, entry)| entry.link(&mut agent).unwrap(),
                            BatchSize::PerIteration,
                        )
                    });
                }
            )*
        }

        fn bench_evaluation(c: &mut Criterion) {
            $(
                {
                    let host = GraphHost::new($graph);
                    c.bench_function(concat!($label, " (Evaluation)"), move |b| {
                        b.iter_batched(
                            || host.linked(),
                            |(mut agent, entry)| {
                                let promise = entry.evaluate(&mut agent);
                                agent.run_jobs();
                                assert_fulfilled(&agent, promise);
                            },
                            BatchSize::PerIteration,
                        )
                    });
                }
            )*
        }
    };
}

bench_graphs!(
    "deep chain of 500" => deep_chain(500),
    "fan of 1000 leaves" => wide_fan(1000),
    "cycle of 500" => large_cycle(500),
);

fn bench_namespaces(c: &mut Criterion) {
    let host = GraphHost::new(star_web(200, 3));
    c.bench_function("star web of 200 (Namespace)", move |b| {
        b.iter_batched(
            || host.linked(),
            |(mut agent, entry)| get_module_namespace(&mut agent, entry.into()).unwrap(),
            BatchSize::PerIteration,
        )
    });
}

criterion_group!(
    benches,
    bench_loading,
    bench_linking,
    bench_evaluation,
    bench_namespaces
);
criterion_main!(benches);
