//! Binding cache benchmarks
//!
//! Measures the cached access paths against first-use resolution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pygch::{BindingCache, GcFlag, Host, Member, SimHost, ALL_GENERATIONS};

fn warm_cache() -> BindingCache<SimHost> {
    let mut cache = BindingCache::new(SimHost::initialized());
    for member in Member::ALL {
        cache.ensure_member_imported(member).unwrap();
    }
    for flag in GcFlag::ALL {
        cache.get_flag(flag).unwrap();
    }
    cache
}

fn bench_cached_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_access");

    group.bench_function("get_flag", |b| {
        let mut cache = warm_cache();
        b.iter(|| black_box(cache.get_flag(black_box(GcFlag::DebugLeak)).unwrap()))
    });

    group.bench_function("isenabled", |b| {
        let mut cache = warm_cache();
        b.iter(|| black_box(cache.isenabled().unwrap()))
    });

    group.bench_function("garbage", |b| {
        let mut cache = warm_cache();
        b.iter(|| black_box(cache.garbage().unwrap().epoch()))
    });

    group.finish();
}

fn bench_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect");

    for generation in [ALL_GENERATIONS, 0, 2].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(generation),
            generation,
            |b, &generation| {
                let mut cache = warm_cache();
                b.iter(|| {
                    cache.host().seed_garbage(0, 8);
                    black_box(cache.collect(generation).unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_rebind_after_restart(c: &mut Criterion) {
    let mut group = c.benchmark_group("restart");

    group.bench_function("teardown_and_rebind", |b| {
        let mut cache = warm_cache();
        b.iter(|| {
            cache.guarded_teardown().unwrap();
            cache.host().initialize();
            black_box(cache.isenabled().unwrap())
        });
    });

    group.bench_function("invalidate_only", |b| {
        let mut cache = warm_cache();
        b.iter(|| {
            cache.invalidate();
            black_box(cache.ensure_module_imported().is_ok())
        });
    });

    group.finish();
}

fn bench_pending_error_guard(c: &mut Criterion) {
    c.bench_function("collect_with_pending_error", |b| {
        let mut cache = warm_cache();
        b.iter(|| {
            cache.host().raise("RuntimeError", "stale");
            black_box(cache.collect(0).unwrap())
        });
    });

    c.bench_function("clear_error", |b| {
        let cache = warm_cache();
        b.iter(|| cache.host().clear_error());
    });
}

criterion_group!(
    benches,
    bench_cached_access,
    bench_collect,
    bench_rebind_after_restart,
    bench_pending_error_guard,
);
criterion_main!(benches);
