//! Weighted fusion of collaborative and content recommendations.

use pipeline::RecommendedProduct;
use sources::{round3, Strategy};
use std::collections::HashMap;

struct Fused {
    item: RecommendedProduct,
    score: f64,
}

/// Blend two ranked lists into one hybrid list of at most `n` items.
///
/// When one side is empty the other is returned as is, truncated to `n`.
/// Otherwise each product scores `similarity × weight` per side it appears
/// on (`cf_weight` for collaborative, `1 - cf_weight` for content), summed
/// when it appears on both. Attributes of a shared product come from the
/// collaborative side. Equal scores keep insertion order, collaborative
/// first.
pub fn fuse(
    collaborative: Vec<RecommendedProduct>,
    content: Vec<RecommendedProduct>,
    cf_weight: f64,
    n: usize,
) -> Vec<RecommendedProduct> {
    if collaborative.is_empty() {
        return truncated(content, n);
    }
    if content.is_empty() {
        return truncated(collaborative, n);
    }

    let cb_weight = 1.0 - cf_weight;
    let mut fused: Vec<Fused> = Vec::with_capacity(collaborative.len() + content.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    let weighted = collaborative
        .into_iter()
        .map(|item| (item, cf_weight))
        .chain(content.into_iter().map(|item| (item, cb_weight)));

    for (item, weight) in weighted {
        let contribution = item.similarity.unwrap_or(0.0) * weight;
        match positions.get(item.product_id()) {
            Some(&pos) => fused[pos].score += contribution,
            None => {
                positions.insert(item.product_id().to_string(), fused.len());
                fused.push(Fused {
                    item,
                    score: contribution,
                });
            }
        }
    }

    // Stable: equal scores stay in insertion order
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));

    fused
        .into_iter()
        .take(n)
        .map(|Fused { item, score }| RecommendedProduct {
            product: item.product,
            similarity: None,
            score: Some(round3(score)),
            method: Strategy::Hybrid,
        })
        .collect()
}

fn truncated(mut items: Vec<RecommendedProduct>, n: usize) -> Vec<RecommendedProduct> {
    items.truncate(n);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::Product;

    fn item(id: &str, similarity: f64, method: Strategy) -> RecommendedProduct {
        RecommendedProduct {
            product: Product {
                image_url: Some(format!("{id}.jpg")),
                ..Product::placeholder(id)
            },
            similarity: Some(similarity),
            score: None,
            method,
        }
    }

    fn ids(items: &[RecommendedProduct]) -> Vec<&str> {
        items.iter().map(|i| i.product_id()).collect()
    }

    #[test]
    fn test_weighted_sum_for_shared_products() {
        let cf = vec![
            item("A", 0.9, Strategy::Collaborative),
            item("B", 0.5, Strategy::Collaborative),
        ];
        let cb = vec![
            item("B", 0.8, Strategy::Content),
            item("C", 0.7, Strategy::Content),
        ];
        let fused = fuse(cf, cb, 0.6, 10);

        let score = |id: &str| fused.iter().find(|i| i.product_id() == id).unwrap().score.unwrap();
        assert_eq!(score("A"), round3(0.9 * 0.6));
        assert_eq!(score("B"), round3(0.6 * 0.5 + 0.4 * 0.8));
        assert_eq!(score("C"), round3(0.7 * 0.4));
        assert_eq!(ids(&fused), vec!["B", "A", "C"]);
        assert!(fused.iter().all(|i| i.method == Strategy::Hybrid && i.similarity.is_none()));
    }

    #[test]
    fn test_full_collaborative_weight_matches_collaborative_ranking() {
        let cf = vec![
            item("A", 0.9, Strategy::Collaborative),
            item("B", 0.7, Strategy::Collaborative),
            item("C", 0.4, Strategy::Collaborative),
        ];
        let cb = vec![
            item("D", 0.99, Strategy::Content),
            item("C", 0.95, Strategy::Content),
        ];
        let fused = fuse(cf.clone(), cb, 1.0, 2);
        assert_eq!(ids(&fused), ids(&cf[..2]));
    }

    #[test]
    fn test_one_side_empty_returns_other_truncated() {
        let cb = vec![
            item("X", 0.8, Strategy::Content),
            item("Y", 0.6, Strategy::Content),
            item("Z", 0.5, Strategy::Content),
        ];
        let fused = fuse(Vec::new(), cb, 0.6, 2);
        assert_eq!(ids(&fused), vec!["X", "Y"]);
        // Passed through untouched
        assert_eq!(fused[0].method, Strategy::Content);
        assert_eq!(fused[0].similarity, Some(0.8));

        assert!(fuse(Vec::new(), Vec::new(), 0.5, 5).is_empty());
    }

    #[test]
    fn test_ties_keep_collaborative_first() {
        let cf = vec![item("CF", 0.5, Strategy::Collaborative)];
        let cb = vec![item("CB", 0.5, Strategy::Content)];
        let fused = fuse(cf, cb, 0.5, 2);
        assert_eq!(ids(&fused), vec!["CF", "CB"]);
    }

    #[test]
    fn test_shared_product_keeps_collaborative_attributes() {
        let mut cf_item = item("S", 0.5, Strategy::Collaborative);
        cf_item.product.title = "From CF".into();
        let mut cb_item = item("S", 0.5, Strategy::Content);
        cb_item.product.title = "From CB".into();

        let fused = fuse(vec![cf_item], vec![cb_item], 0.5, 5);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].product.title, "From CF");
        assert_eq!(fused[0].score, Some(0.5));
    }
}
