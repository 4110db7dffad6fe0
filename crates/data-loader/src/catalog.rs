//! Metadata catalog: product ID → normalized [`Product`].
//!
//! The catalog is filled by a single bounded scan over the metadata file.
//! When the wanted IDs are known up front (the keys of both similarity
//! mappings) the scan stops as soon as every one of them is resolved, or
//! when the scan cap is reached. If too few targets were found, the first
//! records of the file are added so browsing still has something to show.

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Immutable product lookup, iterable in file order
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    products: Vec<Product>,
    by_id: HashMap<ProductId, usize>,
    skipped_lines: usize,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build directly from products; the first occurrence of an ID wins
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mut catalog = Self::new();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    fn insert(&mut self, product: Product) -> bool {
        if self.by_id.contains_key(&product.id) {
            return false;
        }
        self.by_id.insert(product.id.clone(), self.products.len());
        self.products.push(product);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.by_id.get(id).map(|&idx| &self.products[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    /// Lines of the metadata file that were not valid JSON
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Case-insensitive title substring search, in catalog order
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Product> {
        let needle = query.to_lowercase();
        self.products
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Scan policy for filling a [`MetadataCatalog`]
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    targets: HashSet<ProductId>,
    scan_cap: usize,
    min_resolved: usize,
    fallback_rows: usize,
}

impl Default for CatalogLoader {
    fn default() -> Self {
        Self {
            targets: HashSet::new(),
            scan_cap: 500_000,
            min_resolved: 100,
            fallback_rows: 10_000,
        }
    }
}

impl CatalogLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = ProductId>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    pub fn with_scan_cap(mut self, scan_cap: usize) -> Self {
        self.scan_cap = scan_cap;
        self
    }

    pub fn with_min_resolved(mut self, min_resolved: usize) -> Self {
        self.min_resolved = min_resolved;
        self
    }

    pub fn with_fallback_rows(mut self, fallback_rows: usize) -> Self {
        self.fallback_rows = fallback_rows;
        self
    }

    /// Open `path` and scan it
    pub fn load_path(&self, path: &Path) -> Result<MetadataCatalog> {
        if !path.exists() {
            return Err(DataLoadError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        let catalog = self.scan(BufReader::new(file))?;
        info!(
            path = %path.display(),
            products = catalog.len(),
            "Loaded metadata catalog"
        );
        Ok(catalog)
    }

    /// Scan a metadata stream.
    ///
    /// Reads until every target is resolved and the fallback window has
    /// been seen, or until `scan_cap` rows have been read. Records from the
    /// first `fallback_rows` rows are held aside and merged in only when
    /// fewer than `min_resolved` targets were found.
    pub fn scan<R: BufRead>(&self, reader: R) -> Result<MetadataCatalog> {
        let mut catalog = MetadataCatalog::new();
        let mut head: Vec<Product> = Vec::new();
        let mut rows = 0usize;

        for line in reader.lines() {
            let all_found = catalog.len() >= self.targets.len();
            if rows >= self.scan_cap || (all_found && rows >= self.fallback_rows) {
                break;
            }
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            rows += 1;

            let product = match parser::parse_product_line(line) {
                Ok(Some(product)) => product,
                Ok(None) => continue,
                Err(e) => {
                    debug!(row = rows, error = %e, "Skipping malformed metadata line");
                    catalog.skipped_lines += 1;
                    continue;
                }
            };

            if self.targets.contains(&product.id) {
                if rows <= self.fallback_rows {
                    head.push(product.clone());
                }
                catalog.insert(product);
            } else if rows <= self.fallback_rows {
                head.push(product);
            }
        }

        let resolved = catalog.len();
        if resolved < self.targets.len() {
            debug!(
                resolved,
                targets = self.targets.len(),
                rows,
                "Metadata scan ended before all targets were resolved"
            );
        }

        if resolved < self.min_resolved {
            warn!(
                resolved,
                min = self.min_resolved,
                "Few targets resolved; adding leading catalog records"
            );
            for product in head {
                catalog.insert(product);
            }
        }

        if catalog.skipped_lines > 0 {
            warn!(skipped = catalog.skipped_lines, "Skipped malformed metadata lines");
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn line(id: &str) -> String {
        format!(r#"{{"parent_asin":"{id}","title":"Item {id}","images":["{id}.jpg"]}}"#)
    }

    fn stream(ids: &[&str]) -> Cursor<String> {
        let body: Vec<String> = ids.iter().map(|id| line(id)).collect();
        Cursor::new(body.join("\n"))
    }

    #[test]
    fn test_scan_resolves_targets() {
        let loader = CatalogLoader::new()
            .with_targets(["B".to_string(), "D".to_string()])
            .with_min_resolved(1)
            .with_fallback_rows(0);
        let catalog = loader.scan(stream(&["A", "B", "C", "D", "E"])).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("B"));
        assert!(catalog.contains("D"));
        assert!(!catalog.contains("E"));
    }

    #[test]
    fn test_scan_cap_stops_early() {
        let loader = CatalogLoader::new()
            .with_targets(["A".to_string(), "E".to_string()])
            .with_scan_cap(3)
            .with_min_resolved(0)
            .with_fallback_rows(0);
        let catalog = loader.scan(stream(&["A", "B", "C", "D", "E"])).unwrap();

        assert!(catalog.contains("A"));
        assert!(!catalog.contains("E"));
    }

    #[test]
    fn test_fallback_to_leading_rows() {
        let loader = CatalogLoader::new()
            .with_targets(["Z".to_string()])
            .with_min_resolved(100)
            .with_fallback_rows(2);
        let catalog = loader.scan(stream(&["A", "B", "C"])).unwrap();

        let ids: Vec<&str> = catalog.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_first_record_wins_and_bad_lines_counted() {
        let body = format!(
            "{}\n{{broken\n{}",
            line("A"),
            r#"{"parent_asin":"A","title":"Duplicate"}"#
        );
        let loader = CatalogLoader::new().with_min_resolved(0).with_fallback_rows(10);
        let catalog = loader.scan(Cursor::new(body)).unwrap();

        assert_eq!(catalog.len(), 0);
        assert_eq!(catalog.skipped_lines(), 1);

        let loader = CatalogLoader::new().with_fallback_rows(10);
        let catalog = loader
            .scan(Cursor::new(format!("{}\n{}", line("A"), r#"{"parent_asin":"A","title":"Duplicate"}"#)))
            .unwrap();
        assert_eq!(catalog.get("A").unwrap().title, "Item A");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let catalog = MetadataCatalog::from_products(vec![
            Product { title: "Cast Iron Skillet".into(), ..Product::placeholder("A") },
            Product { title: "Nonstick Pan".into(), ..Product::placeholder("B") },
            Product { title: "Skillet Lid".into(), ..Product::placeholder("C") },
        ]);
        let hits: Vec<&str> = catalog.search("SKILLET", 10).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(hits, vec!["A", "C"]);
        assert_eq!(catalog.search("skillet", 1).len(), 1);
    }
}
