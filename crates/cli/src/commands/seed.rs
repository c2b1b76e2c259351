//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Odyssey G7
//!     brand: Samsung
//!     price: "549.99"
//!     category: displays
//!     stock: 12
//!     specs:
//!       refresh: 240Hz
//! ```
//!
//! Products whose name is already in the catalog are skipped, so the same
//! file can be applied repeatedly.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use rigshop_storefront::db::Store;
use rigshop_storefront::models::{NewProduct, ProductFilter};

use super::{CommandError, open_configured_store};

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    products: Vec<NewProduct>,
}

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse and validate every product in a seed document.
///
/// # Errors
///
/// Returns an error for malformed YAML or an invalid product.
pub fn parse_products(yaml: &str) -> Result<Vec<NewProduct>, CommandError> {
    let file: SeedFile = serde_yaml::from_str(yaml)?;
    file.products
        .into_iter()
        .map(|product| product.validated().map_err(CommandError::from))
        .collect()
}

/// Insert `products` whose names are not yet taken.
///
/// # Errors
///
/// Returns a storage error if listing or inserting fails.
pub async fn seed_products(
    store: &dyn Store,
    products: Vec<NewProduct>,
) -> Result<SeedReport, CommandError> {
    let mut taken: HashSet<String> = store
        .list_products(&ProductFilter::default())
        .await?
        .iter()
        .map(|p| name_key(&p.name))
        .collect();

    let mut report = SeedReport::default();
    for product in products {
        if !taken.insert(name_key(&product.name)) {
            tracing::debug!(name = %product.name, "Skipping existing product");
            report.skipped += 1;
            continue;
        }
        let created = store.create_product(product).await?;
        tracing::debug!(id = %created.id, name = %created.name, "Product seeded");
        report.created += 1;
    }
    Ok(report)
}

/// Seed products from `path` into the configured store.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the store fails.
pub async fn products(path: &Path) -> Result<(), CommandError> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let products = parse_products(&yaml)?;
    tracing::info!(path = %path.display(), count = products.len(), "Loaded seed file");

    let store = open_configured_store().await?;
    let report = seed_products(store.as_ref(), products).await?;

    tracing::info!(
        created = report.created,
        skipped = report.skipped,
        "Seeding complete!"
    );
    Ok(())
}
