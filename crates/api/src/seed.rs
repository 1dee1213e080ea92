//! Small demo catalog for local runs.

use common::{Money, Page};
use storage::{CatalogStore, NewBrand, NewCategory, NewProduct, ProductQuery, StoreError};

/// Inserts a handful of categories, brands and products.
///
/// Skipped when the catalog already has products.
pub async fn seed_demo_catalog<C: CatalogStore>(store: &C) -> Result<usize, StoreError> {
    let existing = store
        .query_products(ProductQuery::new().page(Page::new(0, Some(1))))
        .await?;
    if existing.total > 0 {
        tracing::info!(products = existing.total, "catalog not empty, skipping demo seed");
        return Ok(0);
    }

    let tools = store
        .insert_category(NewCategory {
            name: "Power Tools".to_string(),
            description: "Drills, grinders and saws".to_string(),
            image: String::new(),
        })
        .await?;
    let garden = store
        .insert_category(NewCategory::named("Garden"))
        .await?;
    let bosch = store
        .insert_brand(NewBrand {
            name: "Bosch".to_string(),
            country: "Germany".to_string(),
            ..NewBrand::default()
        })
        .await?;
    let makita = store
        .insert_brand(NewBrand {
            name: "Makita".to_string(),
            country: "Japan".to_string(),
            ..NewBrand::default()
        })
        .await?;

    let products = [
        NewProduct::new("Cordless Drill", Money::from_units(129), 25)
            .in_category(tools.id)
            .of_brand(bosch.id),
        NewProduct::new("Angle Grinder", Money::from_cents(8950), 12)
            .in_category(tools.id)
            .of_brand(makita.id),
        NewProduct::new("Hedge Trimmer", Money::from_units(99), 8)
            .in_category(garden.id)
            .of_brand(bosch.id),
        NewProduct::new("Lawn Mower", Money::from_units(349), 3)
            .in_category(garden.id)
            .of_brand(makita.id),
    ];

    let count = products.len();
    for product in products {
        store.insert_product(product).await?;
    }

    tracing::info!(products = count, "demo catalog seeded");
    Ok(count)
}
