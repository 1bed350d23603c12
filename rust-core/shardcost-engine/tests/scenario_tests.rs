// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end estimation scenarios through the public API.

use shardcost_engine::loader::{parse_catalog, parse_queries, parse_signatures};
use shardcost_engine::{
    BatchReport, Estimator, EstimatorConfig, OperatorKind, Query, QueryEstimate, Signature,
};

const PRODUCT_SCHEMA: &str = r#"{
    "collections": {
        "Product": {
            "primary_key": "IDP",
            "fields": {"IDP": {"type": "integer"}, "brand": {"type": "string"}}
        }
    }
}"#;

const PRODUCT_STATS: &str = r#"{
    "cluster": {"nb_servers": 1000, "sharding_access_fraction": 0.1},
    "collections": {
        "Product": {"nb_documents": 100000, "distinct_values": {"IDP": 100000, "brand": 5000}}
    }
}"#;

const SHOP_SCHEMA: &str = r#"{
    "collections": {
        "Product": {
            "primary_key": "IDP",
            "fields": {
                "IDP": {"type": "integer"},
                "brand": {"type": "string"},
                "price": {"type": "number"}
            }
        },
        "OrderLine": {
            "primary_key": "IDOL",
            "fields": {
                "IDOL": {"type": "integer"},
                "IDP": {"type": "integer"},
                "IDC": {"type": "integer"},
                "date": {"type": "date"},
                "quantity": {"type": "integer"}
            }
        }
    }
}"#;

const SHOP_STATS: &str = r#"{
    "collections": {
        "Product": {"nb_documents": 100000, "distinct_values": {"IDP": 100000, "brand": 5000}},
        "OrderLine": {
            "nb_documents": 4000000,
            "distinct_values": {"IDOL": 4000000, "IDP": 100000, "IDC": 1000000, "date": 365}
        }
    }
}"#;

const SHOP_SIGNATURES: &str = r#"{"denormalizations": [
    {
        "id": "D1",
        "collections": {
            "Product": {"sharding_key": "IDP"},
            "OrderLine": {"sharding_key": "IDC", "indexes": ["date"]}
        }
    },
    {
        "id": "D2",
        "collections": {
            "OrderLine": {"sharding_key": "IDC", "indexes": ["product.brand"]}
        },
        "embeds": [{"source": "Product", "target": "OrderLine", "path": "product", "cardinality": "one"}]
    }
]}"#;

fn product_estimator() -> Estimator {
    let catalog = parse_catalog(PRODUCT_SCHEMA, PRODUCT_STATS).unwrap();
    Estimator::new(catalog, EstimatorConfig::default()).unwrap()
}

fn shop() -> (Estimator, Vec<Signature>) {
    let catalog = parse_catalog(SHOP_SCHEMA, SHOP_STATS).unwrap();
    let estimator = Estimator::new(catalog, EstimatorConfig::default()).unwrap();
    (estimator, parse_signatures(SHOP_SIGNATURES).unwrap())
}

fn product_signature(sharding_key: &str) -> Signature {
    let json = format!(
        r#"[{{"id": "D1", "collections": {{"Product": {{"sharding_key": "{sharding_key}"}}}}}}]"#
    );
    parse_signatures(&json).unwrap().remove(0)
}

fn find_estimate<'r>(report: &'r BatchReport, query: &str, signature: &str) -> &'r QueryEstimate {
    report
        .pairings
        .iter()
        .find(|p| p.query_id == query && p.signature_id == signature)
        .and_then(|p| p.outcome.as_ref().ok())
        .unwrap()
}

fn join_count(estimate: &QueryEstimate) -> usize {
    estimate
        .steps
        .iter()
        .filter(|s| s.kind == OperatorKind::Join)
        .count()
}

#[test]
fn test_brand_filter_on_primary_key_sharding() {
    let estimator = product_estimator();
    let query = Query::sql("Q1", "SELECT brand FROM Product WHERE brand = 'x'");
    let estimate = estimator
        .estimate(&query, &product_signature("IDP"))
        .unwrap();

    assert_eq!(estimate.steps.len(), 1);
    let step = &estimate.steps[0];
    assert_eq!(step.kind, OperatorKind::Filter);
    assert!(!step.sharding_aligned);
    assert_eq!(step.scanned_docs, 100_000);
    assert_eq!(step.output_docs, 20);
    assert_eq!(step.output_bytes, 20.0 * 80.0);
}

#[test]
fn test_brand_filter_on_brand_sharding() {
    let estimator = product_estimator();
    let query = Query::sql("Q1", "SELECT brand FROM Product WHERE brand = 'x'");
    let aligned = estimator
        .estimate(&query, &product_signature("brand"))
        .unwrap();
    let step = &aligned.steps[0];
    assert!(step.sharding_aligned);
    assert_eq!(step.scanned_docs, 10_000);
    assert_eq!(step.output_docs, 2);

    let unaligned = estimator
        .estimate(&query, &product_signature("IDP"))
        .unwrap();
    assert!(aligned.total.price < unaligned.total.price);
}

#[test]
fn test_embedded_product_removes_join() {
    let (estimator, signatures) = shop();
    let query = Query::sql(
        "Q2",
        "SELECT OrderLine.date, Product.brand FROM OrderLine JOIN Product ON OrderLine.IDP = Product.IDP WHERE Product.brand = 'x'",
    );

    let normalized = estimator.estimate(&query, &signatures[0]).unwrap();
    assert_eq!(join_count(&normalized), 1);

    let embedded = estimator.estimate(&query, &signatures[1]).unwrap();
    assert_eq!(join_count(&embedded), 0);
    assert_eq!(embedded.plan_summary(), "filter");
    assert_eq!(embedded.plan.notes.len(), 1);
    let step = &embedded.steps[0];
    assert_eq!(step.collections, vec!["OrderLine".to_string()]);
    assert_eq!(step.indexes_used, vec!["product.brand".to_string()]);
}

#[test]
fn test_group_by_date_costs_more_than_shard_key() {
    let (estimator, signatures) = shop();
    let by_date = Query::sql("Q3", "SELECT date, COUNT(*) FROM OrderLine GROUP BY date");
    let by_client = Query::sql("Q4", "SELECT IDC, COUNT(*) FROM OrderLine GROUP BY IDC");

    let date = estimator.estimate(&by_date, &signatures[0]).unwrap();
    let client = estimator.estimate(&by_client, &signatures[0]).unwrap();

    let date_agg = date.final_step().unwrap();
    let client_agg = client.final_step().unwrap();
    assert_eq!(date_agg.kind, OperatorKind::Aggregate);
    assert!(date_agg.shuffled_bytes > 0.0);
    assert_eq!(client_agg.shuffled_bytes, 0.0);
    assert!(client_agg.sharding_aligned);
    assert_eq!(date_agg.output_docs, 365);

    assert!(date.total.time > client.total.time);
    assert!(date.total.carbon > client.total.carbon);
    assert!(date.total.price > client.total.price);
}

#[test]
fn test_one_to_one_embed_is_cheaper_than_join() {
    let schema = r#"{"collections": {
        "Client": {"primary_key": "IDC", "fields": {
            "IDC": {"type": "integer"}, "name": {"type": "string"}}},
        "Profile": {"primary_key": "IDPR", "fields": {
            "IDPR": {"type": "integer"}, "IDC": {"type": "integer"},
            "bio": {"type": "string", "avg_size": 200}}}
    }}"#;
    let stats = r#"{"collections": {
        "Client": {"nb_documents": 1000000, "distinct_values": {"IDC": 1000000}},
        "Profile": {"nb_documents": 1000000, "distinct_values": {"IDPR": 1000000, "IDC": 1000000}}
    }}"#;
    let signatures = parse_signatures(
        r#"[
        {"id": "N", "collections": {"Client": {}, "Profile": {}}},
        {"id": "E", "collections": {"Client": {}},
         "embeds": [{"source": "Profile", "target": "Client", "path": "profile"}]}
    ]"#,
    )
    .unwrap();
    let estimator =
        Estimator::new(parse_catalog(schema, stats).unwrap(), EstimatorConfig::default()).unwrap();
    let query = Query::sql(
        "Q",
        "SELECT Client.name, Profile.bio FROM Client JOIN Profile ON Client.IDC = Profile.IDC",
    );

    let joined = estimator.estimate(&query, &signatures[0]).unwrap();
    let embedded = estimator.estimate(&query, &signatures[1]).unwrap();
    assert_eq!(join_count(&joined), 1);
    assert_eq!(join_count(&embedded), 0);
    assert!(embedded.total.price <= joined.total.price);
    assert!(embedded.total.time <= joined.total.time);
}

#[test]
fn test_repeated_estimates_are_bit_identical() {
    let (estimator, signatures) = shop();
    let query = Query::sql(
        "Q2",
        "SELECT OrderLine.date, Product.brand FROM OrderLine JOIN Product ON OrderLine.IDP = Product.IDP WHERE Product.brand = 'x'",
    );
    for signature in &signatures {
        let a = estimator.estimate(&query, signature).unwrap().total;
        let b = estimator.estimate(&query, signature).unwrap().total;
        assert_eq!(a.time.to_bits(), b.time.to_bits());
        assert_eq!(a.carbon.to_bits(), b.carbon.to_bits());
        assert_eq!(a.price.to_bits(), b.price.to_bits());
    }
}

#[test]
fn test_bundled_workload() {
    let catalog = parse_catalog(
        include_str!("../../../data/schema.json"),
        include_str!("../../../data/stats.json"),
    )
    .unwrap();
    let signatures = parse_signatures(include_str!("../../../data/denormalizations.json")).unwrap();
    let mut queries = parse_queries(include_str!("../../../data/queries.json")).unwrap();
    queries.push(Query::sql("Q_BAD", "SELECT colour FROM Product"));

    let estimator = Estimator::new(catalog, EstimatorConfig::default()).unwrap();
    let report = estimator.evaluate_batch(&queries, &signatures);

    assert_eq!(report.pairings.len(), queries.len() * signatures.len());
    let failed: Vec<&str> = report.failures().map(|p| p.query_id.as_str()).collect();
    assert_eq!(failed, vec!["Q_BAD"; signatures.len()]);
    assert_eq!(report.totals.len(), signatures.len());
    assert!(report.totals.values().all(|t| t.price > 0.0));

    assert_eq!(find_estimate(&report, "Q1", "D1").frequency, 100);
    assert_eq!(find_estimate(&report, "Q3", "D1").frequency, 1);
    assert_eq!(join_count(find_estimate(&report, "Q2", "D1")), 1);
    assert_eq!(join_count(find_estimate(&report, "Q2", "D2")), 0);
    assert_eq!(join_count(find_estimate(&report, "Q5", "D3")), 0);
    assert_eq!(find_estimate(&report, "Q6", "D2").plan_summary(), "filter -> join -> aggregate");

    // Full scan of the enlarged OrderLine outweighs the join it replaces.
    let embedded = find_estimate(&report, "Q2", "D2").total;
    let joined = find_estimate(&report, "Q2", "D1").total;
    assert!(embedded.price > joined.price);
}

#[tokio::test]
async fn test_concurrent_batch_over_bundled_workload() {
    let catalog = parse_catalog(
        include_str!("../../../data/schema.json"),
        include_str!("../../../data/stats.json"),
    )
    .unwrap();
    let signatures = parse_signatures(include_str!("../../../data/denormalizations.json")).unwrap();
    let queries = parse_queries(include_str!("../../../data/queries.json")).unwrap();
    let estimator = Estimator::new(catalog, EstimatorConfig::default()).unwrap();

    let report = estimator
        .evaluate_batch_concurrent(&queries, &signatures)
        .await
        .unwrap();
    assert_eq!(report.failures().count(), 0);
    let order: Vec<(&str, &str)> = report
        .pairings
        .iter()
        .map(|p| (p.signature_id.as_str(), p.query_id.as_str()))
        .collect();
    assert_eq!(order[0], ("D1", "Q1"));
    assert_eq!(order[queries.len()], ("D2", "Q1"));
    assert_eq!(report.totals, estimator.evaluate_batch(&queries, &signatures).totals);
}
