//! Integration tests for catalog queries.

use common::{BrandId, CategoryId, Money, ProductId};
use domain::{CatalogError, CatalogService, ListProducts, PageRequest, SearchMatch};
use storage::{CatalogStore, InMemoryStore, NewBrand, NewCategory, NewProduct};

struct Seeded {
    service: CatalogService<InMemoryStore>,
    tools: CategoryId,
    garden: CategoryId,
    bosch: BrandId,
    makita: BrandId,
}

async fn seeded() -> Seeded {
    let store = InMemoryStore::new();
    let tools = store.insert_category(NewCategory::named("Power Tools")).await.unwrap().id;
    let garden = store.insert_category(NewCategory::named("Garden")).await.unwrap().id;
    let bosch = store.insert_brand(NewBrand::named("Bosch")).await.unwrap().id;
    let makita = store.insert_brand(NewBrand::named("Makita")).await.unwrap().id;

    for (name, category, brand) in [
        ("Cordless Drill", tools, bosch),
        ("Angle Grinder", tools, makita),
        ("Hedge Trimmer", garden, bosch),
        ("Lawn Mower", garden, makita),
    ] {
        store
            .insert_product(
                NewProduct::new(name, Money::from_units(100), 3)
                    .in_category(category)
                    .of_brand(brand),
            )
            .await
            .unwrap();
    }

    Seeded {
        service: CatalogService::new(store),
        tools,
        garden,
        bosch,
        makita,
    }
}

fn names(products: &[domain::Product]) -> Vec<&str> {
    products.iter().map(|p| p.name.as_str()).collect()
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn skip_past_most_of_twelve_products_returns_the_tail() {
        let store = InMemoryStore::new();
        for i in 1..=12 {
            store
                .insert_product(NewProduct::new(format!("P{i}"), Money::from_units(1), 1))
                .await
                .unwrap();
        }
        let service = CatalogService::new(store);

        let page = service
            .list_products(ListProducts {
                page: PageRequest::new(Some(10), Some(5)),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(names(&page.items), vec!["P11", "P12"]);
        assert_eq!(page.total, 12);
        assert_eq!(page.skip, 10);
        assert_eq!(page.limit, Some(5));
    }

    #[tokio::test]
    async fn absent_or_zero_limit_returns_everything() {
        let s = seeded().await;
        for limit in [None, Some(0)] {
            let page = s
                .service
                .list_products(ListProducts {
                    page: PageRequest::new(Some(1), limit),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(page.items.len(), 3);
            assert_eq!(page.total, 4);
        }
    }

    #[tokio::test]
    async fn negative_parameters_are_rejected() {
        let s = seeded().await;
        let err = s
            .service
            .list_products(ListProducts {
                page: PageRequest::new(Some(-1), None),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRange(ref r) if r.parameter == "skip"));

        let err = s
            .service
            .list_categories(PageRequest::new(None, Some(-5)))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRange(ref r) if r.parameter == "limit"));
    }

    #[tokio::test]
    async fn filters_by_category_and_brand() {
        let s = seeded().await;

        let page = s
            .service
            .list_products(ListProducts {
                category_id: Some(s.garden),
                brand_id: Some(s.makita),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(names(&page.items), vec!["Lawn Mower"]);
        assert_eq!(page.total, 1);
    }
}

mod search {
    use super::*;

    #[tokio::test]
    async fn product_name_matches_first() {
        let s = seeded().await;
        let results = s.service.search_products("drill").await.unwrap();
        assert_eq!(results.matched_by, SearchMatch::ProductName);
        assert_eq!(names(&results.products), vec!["Cordless Drill"]);
    }

    #[tokio::test]
    async fn falls_back_to_category_name() {
        let s = seeded().await;
        let results = s.service.search_products("POWER").await.unwrap();
        assert_eq!(results.matched_by, SearchMatch::CategoryName);
        assert_eq!(
            names(&results.products),
            vec!["Cordless Drill", "Angle Grinder"]
        );
    }

    #[tokio::test]
    async fn falls_back_to_brand_name() {
        let s = seeded().await;
        let results = s.service.search_products("bosch").await.unwrap();
        assert_eq!(results.matched_by, SearchMatch::BrandName);
        assert_eq!(
            names(&results.products),
            vec!["Cordless Drill", "Hedge Trimmer"]
        );
    }

    #[tokio::test]
    async fn no_match_is_empty_not_an_error() {
        let s = seeded().await;
        let results = s.service.search_products("chainsaw").await.unwrap();
        assert_eq!(results.matched_by, SearchMatch::Nothing);
        assert!(results.products.is_empty());
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let s = seeded().await;
        assert!(matches!(
            s.service.search_products("  ").await.unwrap_err(),
            CatalogError::EmptySearchQuery
        ));
    }
}

mod single_fetch {
    use super::*;

    #[tokio::test]
    async fn category_includes_paginated_products() {
        let s = seeded().await;
        let view = s
            .service
            .get_category(s.tools, PageRequest::new(Some(1), Some(1)))
            .await
            .unwrap();

        assert_eq!(view.category.name, "Power Tools");
        assert_eq!(view.products.total, 2);
        assert_eq!(names(&view.products.items), vec!["Angle Grinder"]);
    }

    #[tokio::test]
    async fn brand_includes_all_products_by_default() {
        let s = seeded().await;
        let view = s
            .service
            .get_brand(s.bosch, PageRequest::default())
            .await
            .unwrap();

        assert_eq!(view.brand.name, "Bosch");
        assert_eq!(
            names(&view.products.items),
            vec!["Cordless Drill", "Hedge Trimmer"]
        );
    }

    #[tokio::test]
    async fn nested_page_errors_name_product_parameters() {
        let s = seeded().await;
        let err = s
            .service
            .get_brand(s.bosch, PageRequest::new(Some(-2), None))
            .await
            .unwrap_err();
        assert!(
            matches!(err, CatalogError::InvalidRange(ref r) if r.parameter == "product_skip")
        );
    }

    #[tokio::test]
    async fn missing_entities_are_not_found() {
        let s = seeded().await;
        assert!(matches!(
            s.service.get_product(ProductId::new(404)).await.unwrap_err(),
            CatalogError::ProductNotFound(_)
        ));
        assert!(matches!(
            s.service
                .get_category(CategoryId::new(404), PageRequest::default())
                .await
                .unwrap_err(),
            CatalogError::CategoryNotFound(_)
        ));
        assert!(matches!(
            s.service
                .get_brand(BrandId::new(404), PageRequest::default())
                .await
                .unwrap_err(),
            CatalogError::BrandNotFound(_)
        ));
    }
}
