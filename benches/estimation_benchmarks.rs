// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for the estimation engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use shardcost_engine::loader::{parse_catalog, parse_queries, parse_signatures};
use shardcost_engine::sql::parse_query;
use shardcost_engine::{DocumentSizer, Estimator, EstimatorConfig, Query, Signature};

fn workload() -> (Estimator, Vec<Signature>, Vec<Query>) {
    let catalog = parse_catalog(
        include_str!("../data/schema.json"),
        include_str!("../data/stats.json"),
    )
    .unwrap();
    let signatures = parse_signatures(include_str!("../data/denormalizations.json")).unwrap();
    let queries = parse_queries(include_str!("../data/queries.json")).unwrap();
    let estimator = Estimator::new(catalog, EstimatorConfig::default()).unwrap();
    (estimator, signatures, queries)
}

// ============================================================================
// Front end
// ============================================================================

fn bench_sql_parse(c: &mut Criterion) {
    let sql = "SELECT OrderLine.date, Product.name FROM OrderLine JOIN Product \
               ON OrderLine.IDP = Product.IDP WHERE Product.brand = 'Apple'";
    c.bench_function("sql/parse_join", |b| {
        b.iter(|| black_box(parse_query(black_box(sql)).unwrap()))
    });
}

fn bench_document_size(c: &mut Criterion) {
    let (estimator, signatures, _) = workload();
    let mut group = c.benchmark_group("size");
    for signature in &signatures {
        let sizer = DocumentSizer::new(estimator.catalog(), signature, estimator.config());
        group.bench_with_input(
            BenchmarkId::new("document_size", &signature.id),
            &sizer,
            |b, sizer| {
                b.iter(|| {
                    for name in signature.collections.keys() {
                        black_box(sizer.document_size(name).unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

// ============================================================================
// Estimation
// ============================================================================

fn bench_estimate_pairing(c: &mut Criterion) {
    let (estimator, signatures, queries) = workload();
    let mut group = c.benchmark_group("estimate");
    for query in &queries {
        for signature in &signatures {
            group.bench_with_input(
                BenchmarkId::new(&query.id, &signature.id),
                &(query, signature),
                |b, (query, signature)| {
                    b.iter(|| black_box(estimator.estimate(query, signature).unwrap()))
                },
            );
        }
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (estimator, signatures, queries) = workload();
    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements((queries.len() * signatures.len()) as u64));

    group.bench_function("sequential", |b| {
        b.iter(|| black_box(estimator.evaluate_batch(&queries, &signatures)))
    });
    group.bench_function("concurrent", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                estimator
                    .evaluate_batch_concurrent(&queries, &signatures)
                    .await
                    .unwrap(),
            )
        });
    });
    group.finish();
}

criterion_group!(frontend, bench_sql_parse, bench_document_size);
criterion_group!(estimation, bench_estimate_pairing, bench_batch);
criterion_main!(frontend, estimation);
