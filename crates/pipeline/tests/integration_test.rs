//! Integration tests for the pipeline.
//!
//! These tests run real sources over a small store, then enrich and filter
//! their output the way the service does.

use data_loader::{ContentIndex, CsrMatrix, IdMapping, MetadataCatalog, Product, SimilarityIndexStore};
use pipeline::{Enricher, FilterContext, FilterPipeline};
use sources::ContentSource;
use std::collections::HashMap;
use std::sync::Arc;

fn create_test_setup() -> (ContentSource, Enricher) {
    let matrix = CsrMatrix::from_dense(&[
        vec![1.0, 0.2, 0.0],
        vec![1.0, 0.2, 0.0],
        vec![0.9, 0.3, 0.1],
        vec![0.8, 0.0, 0.5],
        vec![0.0, 0.0, 1.0],
    ]);
    let mapping = IdMapping::from_forward(HashMap::from([
        ("MUG".to_string(), 0),
        ("MUG-TWIN".to_string(), 1),
        ("CUP".to_string(), 2),
        ("JAR".to_string(), 3),
        ("RUG".to_string(), 4),
    ]));
    let store = SimilarityIndexStore::new(None, Some(ContentIndex::new(matrix, mapping)));

    let with_image = |id: &str, title: &str| Product {
        title: title.to_string(),
        image_url: Some(format!("https://img.example/{id}.jpg")),
        ..Product::placeholder(id)
    };
    let catalog = MetadataCatalog::from_products(vec![
        with_image("MUG", "Stoneware Mug"),
        with_image("MUG-TWIN", "Stoneware Mug (2 pack)"),
        // CUP has a catalog entry but no image
        Product {
            title: "Paper Cup".to_string(),
            ..Product::placeholder("CUP")
        },
        with_image("JAR", "Mason Jar"),
    ]);

    (
        ContentSource::new(Arc::new(store)),
        Enricher::new(Arc::new(catalog)),
    )
}

#[test]
fn test_full_pipeline() {
    let (source, enricher) = create_test_setup();
    let pipeline = FilterPipeline::display();

    let candidates = source.get_candidates("MUG", 4);
    assert_eq!(candidates.len(), 4);

    let enriched = enricher.enrich(&candidates);
    let shown = pipeline
        .apply(enriched, &FilterContext::new("MUG"))
        .unwrap();

    // CUP lacks an image and RUG has no catalog entry
    let ids: Vec<&str> = shown.iter().map(|p| p.product_id()).collect();
    assert_eq!(ids, vec!["MUG-TWIN", "JAR"]);
    assert_eq!(shown[0].product.title, "Stoneware Mug (2 pack)");
    assert_eq!(shown[0].similarity, Some(1.0));

    for pair in shown.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn test_pipeline_may_return_fewer_than_requested() {
    let (source, enricher) = create_test_setup();
    let pipeline = FilterPipeline::display();

    let candidates = source.get_candidates("RUG", 2);
    let shown = pipeline
        .apply(enricher.enrich(&candidates), &FilterContext::new("RUG"))
        .unwrap();

    assert!(shown.len() <= 2);
    assert!(shown.iter().all(|p| p.product.has_image()));
}
