use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use esox_connpool::{BoxError, ConnectionConfig, ConnectionPool, LendingStrategy, PoolConfig, PoolableConnection};
use std::time::Duration;

struct NullConnection;

impl PoolableConnection for NullConnection {
    fn ping(&mut self, _query: &str, _timeout: Duration) -> Result<(), BoxError> {
        Ok(())
    }
}

fn pool(strategy: LendingStrategy) -> ConnectionPool<NullConnection> {
    let pool = ConnectionPool::new(
        ConnectionConfig::new("localhost", 3306, "bench"),
        PoolConfig::new()
            .with_limits(16, 16, 16)
            .without_health_checks()
            .with_validation(false)
            .with_strategy(strategy),
        |_: &ConnectionConfig| -> Result<NullConnection, BoxError> { Ok(NullConnection) },
    )
    .unwrap();
    pool.start().unwrap();
    pool
}

fn lend_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("lend_release");
    for strategy in [
        LendingStrategy::RoundRobin,
        LendingStrategy::LeastConnections,
        LendingStrategy::Weighted,
        LendingStrategy::Random,
    ] {
        let pool = pool(strategy);
        group.bench_function(format!("{:?}", strategy), |b| {
            b.iter(|| {
                let conn = pool.get_connection(None).unwrap();
                black_box(conn.id());
            })
        });
        pool.stop();
    }
    group.finish();
}

criterion_group!(benches, lend_release);
criterion_main!(benches);
