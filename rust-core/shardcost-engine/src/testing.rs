// SPDX-License-Identifier: PMPL-1.0-or-later
//! Shared fixtures for unit tests: a small shop workload.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::schema::{CollectionSchema, FieldKind, FieldSpec, Schema};
use crate::signature::{Cardinality, CollectionLayout, Embed, Signature};
use crate::stats::{CollectionStats, Stats};

fn collection(primary_key: &str, fields: &[(&str, FieldKind)]) -> CollectionSchema {
    CollectionSchema {
        primary_key: primary_key.to_string(),
        fields: fields
            .iter()
            .map(|(name, kind)| (name.to_string(), FieldSpec::primitive(*kind)))
            .collect(),
    }
}

/// Product (100k), OrderLine (4M), Client (1M).
pub fn shop_catalog() -> Catalog {
    let mut schema = Schema::default();
    schema.collections.insert(
        "Product".to_string(),
        collection(
            "IDP",
            &[
                ("IDP", FieldKind::Integer),
                ("brand", FieldKind::String),
                ("price", FieldKind::Number),
            ],
        ),
    );
    schema.collections.insert(
        "OrderLine".to_string(),
        collection(
            "IDOL",
            &[
                ("IDOL", FieldKind::Integer),
                ("IDP", FieldKind::Integer),
                ("IDC", FieldKind::Integer),
                ("date", FieldKind::Date),
                ("quantity", FieldKind::Integer),
            ],
        ),
    );
    schema.collections.insert(
        "Client".to_string(),
        collection(
            "IDC",
            &[
                ("IDC", FieldKind::Integer),
                ("name", FieldKind::String),
                ("country", FieldKind::String),
            ],
        ),
    );

    let mut stats = Stats::default();
    stats.collections.insert(
        "Product".to_string(),
        CollectionStats::new(100_000)
            .with_distinct("IDP", 100_000)
            .with_distinct("brand", 5_000),
    );
    stats.collections.insert(
        "OrderLine".to_string(),
        CollectionStats::new(4_000_000)
            .with_distinct("IDOL", 4_000_000)
            .with_distinct("IDP", 100_000)
            .with_distinct("IDC", 1_000_000)
            .with_distinct("date", 365),
    );
    stats.collections.insert(
        "Client".to_string(),
        CollectionStats::new(1_000_000)
            .with_distinct("IDC", 1_000_000)
            .with_distinct("country", 200)
            .with_array_length("orders", 4.0),
    );
    match Catalog::new(schema, stats) {
        Ok(catalog) => catalog,
        Err(err) => panic!("shop fixture is invalid: {err}"),
    }
}

fn layout(sharding_key: &str, indexes: &[&str]) -> CollectionLayout {
    CollectionLayout {
        sharding_key: Some(sharding_key.to_string()),
        indexes: indexes.iter().map(|s| s.to_string()).collect(),
    }
}

/// Fully normalized: every collection materialized, no embeds.
pub fn d1() -> Signature {
    let mut collections = BTreeMap::new();
    collections.insert("Product".to_string(), CollectionLayout::default());
    collections.insert("OrderLine".to_string(), layout("IDC", &["date"]));
    collections.insert("Client".to_string(), layout("IDC", &[]));
    Signature {
        id: "D1".to_string(),
        description: "normalized".to_string(),
        collections,
        embeds: Vec::new(),
    }
}

/// Product embedded into OrderLine and no longer stored on its own.
pub fn d2() -> Signature {
    let mut collections = BTreeMap::new();
    collections.insert("OrderLine".to_string(), layout("IDC", &["product.brand"]));
    collections.insert("Client".to_string(), layout("IDC", &[]));
    Signature {
        id: "D2".to_string(),
        description: "product inside order lines".to_string(),
        collections,
        embeds: vec![Embed {
            source: "Product".to_string(),
            target: "OrderLine".to_string(),
            path: "product".to_string(),
            cardinality: Cardinality::One,
        }],
    }
}

/// Order lines nested in their client as an array.
pub fn d3() -> Signature {
    let mut collections = BTreeMap::new();
    collections.insert("Product".to_string(), CollectionLayout::default());
    collections.insert("Client".to_string(), layout("IDC", &[]));
    Signature {
        id: "D3".to_string(),
        description: "order lines inside clients".to_string(),
        collections,
        embeds: vec![Embed {
            source: "OrderLine".to_string(),
            target: "Client".to_string(),
            path: "orders".to_string(),
            cardinality: Cardinality::Many,
        }],
    }
}
