use common::Money;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CatalogService, CustomerDetails, LineRequest, ListProducts, OrderService, PageRequest,
    PlaceOrder,
};
use storage::{CatalogStore, InMemoryStore, NewProduct};

fn order_for(lines: Vec<LineRequest>) -> PlaceOrder {
    PlaceOrder::new(
        CustomerDetails::individual("+1 555 0100", "Bench"),
        Money::zero(),
        "new",
        "delivery",
        lines,
    )
}

fn bench_place_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let service = OrderService::new(store.clone());
    let product = rt.block_on(async {
        store
            .insert_product(NewProduct::new("Widget", Money::from_cents(1000), u32::MAX))
            .await
            .unwrap()
            .id
    });

    c.bench_function("domain/place_single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .place(order_for(vec![LineRequest::new(product, 1)]))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_place_ten_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let service = OrderService::new(store.clone());
    let products: Vec<_> = rt.block_on(async {
        let mut ids = Vec::new();
        for i in 0..10 {
            let product = store
                .insert_product(NewProduct::new(
                    format!("Widget {i}"),
                    Money::from_cents(250),
                    u32::MAX,
                ))
                .await
                .unwrap();
            ids.push(product.id);
        }
        ids
    });

    c.bench_function("domain/place_ten_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let lines = products.iter().map(|id| LineRequest::new(*id, 2)).collect();
                service.place(order_for(lines)).await.unwrap();
            });
        });
    });
}

fn bench_list_products_page(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    rt.block_on(async {
        for i in 0..500 {
            store
                .insert_product(NewProduct::new(format!("Item {i}"), Money::from_units(1), 10))
                .await
                .unwrap();
        }
    });
    let catalog = CatalogService::new(store);

    c.bench_function("domain/list_products_page", |b| {
        b.iter(|| {
            rt.block_on(async {
                catalog
                    .list_products(ListProducts {
                        page: PageRequest::new(Some(200), Some(50)),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_place_single_line,
    bench_place_ten_lines,
    bench_list_products_page
);
criterion_main!(benches);
