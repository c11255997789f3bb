//! Products resource

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{create_one, delete_one, fetch_one, list_page, nothing_to_update, patch_one, ListQuery};
use crate::{ApiClient, ApiError, ListPage};

const PATH: &str = "/products";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub stock: i64,
}

/// Payload for creating a product
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(max = 255))]
    pub description: String,

    #[validate(range(min = 0.0))]
    pub price: f64,

    #[validate(range(min = 0))]
    pub stock: i64,
}

/// Price and/or stock change; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0))]
    pub stock: Option<i64>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.stock.is_none()
    }
}

/// Filters for the product list
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub name_contains: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ProductsApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn products(&self) -> ProductsApi<'_> {
        ProductsApi { client: self }
    }
}

impl ProductsApi<'_> {
    pub async fn list(&self, page: u32, filter: &ProductFilter) -> Result<ListPage<Product>, ApiError> {
        let query = ListQuery::page(page)?
            .filter("name_contains", filter.name_contains.as_ref())
            .filter("min_price", filter.min_price.as_ref())
            .filter("max_price", filter.max_price.as_ref());

        list_page(self.client, PATH, query).await
    }

    pub async fn get(&self, id: i64) -> Result<Product, ApiError> {
        fetch_one(self.client, &format!("{}/{}", PATH, id)).await
    }

    pub async fn create(&self, product: &NewProduct) -> Result<Product, ApiError> {
        create_one(self.client, PATH, product).await
    }

    pub async fn update(&self, id: i64, patch: &ProductPatch) -> Result<(), ApiError> {
        if patch.is_empty() {
            return Err(nothing_to_update());
        }
        patch_one(self.client, &format!("{}/{}", PATH, id), patch).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        delete_one(self.client, &format!("{}/{}", PATH, id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::client_for;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mouse() -> NewProduct {
        NewProduct {
            name: "Wireless Mouse".to_string(),
            description: "A comfortable ergonomic wireless mouse".to_string(),
            price: 29.99,
            stock: 150,
        }
    }

    #[tokio::test]
    async fn test_list_products_with_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "20"))
            .and(query_param("name_contains", "mouse"))
            .and(query_param("max_price", "50"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([
                        {"id": 21, "name": "Wireless Mouse", "description": "", "price": 29.99, "stock": 150}
                    ]))
                    .insert_header("X-Total-Count", "21"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let filter = ProductFilter {
            name_contains: Some("mouse".to_string()),
            min_price: None,
            max_price: Some(50.0),
        };

        let page = client.products().list(2, &filter).await.unwrap();
        assert_eq!(page.total, 21);
        assert_eq!(page.total_pages(crate::PER_PAGE), 2);
        assert_eq!(page.items[0].name, "Wireless Mouse");

        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default().to_string();
        assert!(!query.contains("min_price"));
    }

    #[tokio::test]
    async fn test_get_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"id": 7, "name": "Keyboard", "description": "Mechanical", "price": 89.0, "stock": 3}),
            ))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let product = client.products().get(7).await.unwrap();
        assert_eq!(product.id, 7);
        assert_eq!(product.stock, 3);
    }

    #[tokio::test]
    async fn test_create_product() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/products"))
            .and(body_json(json!({
                "name": "Wireless Mouse",
                "description": "A comfortable ergonomic wireless mouse",
                "price": 29.99,
                "stock": 150
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 123,
                "name": "Wireless Mouse",
                "description": "A comfortable ergonomic wireless mouse",
                "price": 29.99,
                "stock": 150
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let created = client.products().create(&mouse()).await.unwrap();
        assert_eq!(created.id, 123);
    }

    #[tokio::test]
    async fn test_create_invalid_product_sends_nothing() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        let mut product = mouse();
        product.price = -1.0;
        let err = client.products().create(&product).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let mut product = mouse();
        product.name = String::new();
        let err = client.products().create(&product).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_product_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/products/7"))
            .and(body_json(json!({"stock": 200})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let patch = ProductPatch {
            price: None,
            stock: Some(200),
        };
        client.products().update(7, &patch).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_patch_is_refused_locally() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        let err = client
            .products()
            .update(7, &ProductPatch::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Validation error: Nothing to update");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_product() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/products/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.products().delete(7).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_product() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/products/99"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Product not found"})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.products().delete(99).await.unwrap_err();
        assert!(matches!(err, ApiError::Response { status: 404, .. }));
    }
}
