//! Trampoline throughput: plain loops, signal-heavy loops and deep nesting.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rebound::{load, Vm};

fn bench_repeat(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeat");

    for passes in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(passes));
        let source = format!("n: 0 repeat {} [n: n + 1]", passes);
        let block = load(&source).expect("bench source loads");

        group.bench_with_input(BenchmarkId::new("increment", passes), &passes, |bencher, _| {
            bencher.iter(|| {
                let mut vm = Vm::new();
                black_box(vm.eval_block(block.clone()).expect("bench source runs"))
            })
        });
    }

    group.finish();
}

fn bench_signals(c: &mut Criterion) {
    let mut group = c.benchmark_group("signals");
    let continue_source = load("count-up i 1000 [if even? i [continue/with i] i]").expect("loads");
    let break_source = load("repeat 500 [repeat 10 [break]]").expect("loads");

    group.bench_function("continue_with", |bencher| {
        bencher.iter(|| {
            let mut vm = Vm::new();
            black_box(vm.eval_block(continue_source.clone()).expect("runs"))
        })
    });
    group.bench_function("nested_break", |bencher| {
        bencher.iter(|| {
            let mut vm = Vm::new();
            black_box(vm.eval_block(break_source.clone()).expect("runs"))
        })
    });

    group.finish();
}

fn bench_nesting(c: &mut Criterion) {
    let mut group = c.benchmark_group("nesting");

    for depth in [100usize, 1_000, 10_000] {
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let block = load(&source).expect("nested source loads");

        group.bench_with_input(BenchmarkId::new("groups", depth), &depth, |bencher, _| {
            bencher.iter(|| {
                let mut vm = Vm::new();
                black_box(vm.eval_block(block.clone()).expect("nested source runs"))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_repeat, bench_signals, bench_nesting);
criterion_main!(benches);
