#![cfg(feature = "memory-store")]

use futures::executor::block_on;
use rs_tenant_context::{
    MapClaims, MemoryStore, OrganizationId, ResolverBuilder, TenantId, TenantMetadata,
    TenantStatus,
};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

const REPEATS: usize = 5;

fn benchmark_sync<F>(name: &str, iterations: usize, mut op: F)
where
    F: FnMut(),
{
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        for _ in 0..iterations {
            op();
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / iterations as f64;
    let ops_per_sec = iterations as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (iters={iterations}, repeats={REPEATS})"
    );
}

fn benchmark_parallel<F>(name: &str, threads: usize, iterations_per_thread: usize, op_factory: F)
where
    F: Fn() -> Box<dyn FnMut() + Send> + Send + Sync + 'static,
{
    let op_factory = Arc::new(op_factory);
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        let mut joins = Vec::with_capacity(threads);
        for _ in 0..threads {
            let factory = Arc::clone(&op_factory);
            joins.push(std::thread::spawn(move || {
                let mut op = factory();
                for _ in 0..iterations_per_thread {
                    op();
                }
            }));
        }
        for join in joins {
            join.join().expect("thread panicked");
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ops = threads * iterations_per_thread;
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / total_ops as f64;
    let ops_per_sec = total_ops as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (threads={threads}, total_ops={total_ops}, repeats={REPEATS})"
    );
}

fn setup_store(tenant_count: usize) -> (MemoryStore, Vec<TenantId>) {
    let store = MemoryStore::new();
    let tenants: Vec<TenantId> = (0..tenant_count)
        .map(|i| TenantId::try_from(format!("tenant_perf_{i}").as_str()).unwrap())
        .collect();

    for tenant in &tenants {
        store.put_tenant(TenantMetadata {
            tenant_id: tenant.clone(),
            created_by: "owner_perf".to_string(),
            organization_id: OrganizationId::try_from("org_perf").unwrap(),
            status: TenantStatus::Ready,
            resources: Vec::new(),
        });
    }

    (store, tenants)
}

#[test]
fn resolve_hot_cache_should_not_reload() {
    let (store, tenants) = setup_store(4);
    let resolver = ResolverBuilder::new(store.clone()).build();

    for _ in 0..100 {
        for tenant in &tenants {
            block_on(resolver.resolve_batch_job(tenant)).unwrap();
        }
    }

    assert_eq!(store.lookups(), tenants.len());
}

#[test]
#[ignore = "manual performance test; run with --ignored --nocapture"]
fn perf_resolve() {
    let iterations = 200_000;

    let (store, tenants) = setup_store(1);
    let tenant = tenants[0].clone();
    let resolver = ResolverBuilder::new(store)
        .cache_check_period(Duration::from_secs(60))
        .build();
    block_on(resolver.resolve_batch_job(&tenant)).unwrap();
    benchmark_sync("resolve_batch_job_hot_cache", iterations, || {
        let context = block_on(resolver.resolve_batch_job(&tenant)).unwrap();
        black_box(context);
    });

    let claims = MapClaims::new("raw.jwt.token").with_claim("org_id", "org_perf");
    let resolver = ResolverBuilder::new(setup_store(1).0)
        .organization_id_claims(["org_id"])
        .auth_enabled(true)
        .build();
    benchmark_sync("resolve_request_authorized_hot_cache", iterations, || {
        let context = block_on(resolver.resolve_request(&tenant, Some(&claims))).unwrap();
        black_box(context);
    });

    let default_tenant = TenantId::default_tenant();
    benchmark_sync("resolve_default_tenant", iterations, || {
        let context = block_on(resolver.resolve_batch_job(&default_tenant)).unwrap();
        black_box(context);
    });

    let threads = std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4);
    let iterations_per_thread = 50_000;

    let (store, tenants) = setup_store(64);
    let resolver = Arc::new(ResolverBuilder::new(store).build());
    for tenant in &tenants {
        block_on(resolver.resolve_batch_job(tenant)).unwrap();
    }
    let tenants = Arc::new(tenants);

    benchmark_parallel(
        "resolve_batch_job_hot_cache_parallel",
        threads,
        iterations_per_thread,
        move || {
            let resolver = Arc::clone(&resolver);
            let tenants = Arc::clone(&tenants);
            let mut next = 0usize;
            Box::new(move || {
                let tenant = &tenants[next % tenants.len()];
                next += 1;
                let context = block_on(resolver.resolve_batch_job(tenant)).unwrap();
                black_box(context);
            })
        },
    );
}
