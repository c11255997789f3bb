//! Typed resources on top of the request pipeline
//!
//! Products, users and orders share one REST shape:
//! - `GET /<resource>?page&per_page&<filters>` returns a page plus `X-Total-Count`
//! - `GET /<resource>/<id>`, `POST /<resource>`, `PATCH /<resource>/<id>`,
//!   `DELETE /<resource>/<id>`
//!
//! Create payloads are validated locally before sending, and empty patches
//! are refused without a request.

pub mod orders;
pub mod products;
pub mod users;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

use crate::{ApiClient, ApiError, ListPage, RequestOptions};

pub use orders::{NewOrder, Order, OrderFilter, OrderPatch, OrdersApi};
pub use products::{NewProduct, Product, ProductFilter, ProductPatch, ProductsApi};
pub use users::{NewUser, User, UserFilter, UserPatch, UsersApi};

/// Page size used by every list call
pub const PER_PAGE: u32 = 20;

/// Query pairs for a list call; empty filter values are left out.
#[derive(Debug, Default)]
pub(crate) struct ListQuery {
    pairs: Vec<(String, String)>,
}

impl ListQuery {
    pub(crate) fn page(page: u32) -> Result<Self, ApiError> {
        if page == 0 {
            return Err(ApiError::Validation("page numbers start at 1".to_string()));
        }

        let mut query = Self::default();
        query.pairs.push(("page".to_string(), page.to_string()));
        query.pairs.push(("per_page".to_string(), PER_PAGE.to_string()));
        Ok(query)
    }

    pub(crate) fn filter<T: ToString>(mut self, key: &str, value: Option<&T>) -> Self {
        if let Some(value) = value.map(ToString::to_string).filter(|v| !v.is_empty()) {
            self.pairs.push((key.to_string(), value));
        }
        self
    }

    fn into_options(self) -> RequestOptions {
        RequestOptions {
            query: self.pairs,
            ..RequestOptions::get()
        }
    }
}

pub(crate) async fn list_page<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
    query: ListQuery,
) -> Result<ListPage<T>, ApiError> {
    client
        .request(path, query.into_options())
        .await?
        .into_list()?
        .typed()
}

pub(crate) async fn fetch_one<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
) -> Result<T, ApiError> {
    client.request(path, RequestOptions::get()).await?.into_json()
}

pub(crate) async fn create_one<B, T>(client: &ApiClient, path: &str, body: &B) -> Result<T, ApiError>
where
    B: Serialize + Validate,
    T: DeserializeOwned,
{
    body.validate()?;
    let options = RequestOptions::new(Method::POST).with_json(body)?;
    client.request(path, options).await?.into_json()
}

pub(crate) async fn patch_one<B>(client: &ApiClient, path: &str, body: &B) -> Result<(), ApiError>
where
    B: Serialize + Validate,
{
    body.validate()?;
    let options = RequestOptions::new(Method::PATCH).with_json(body)?;
    client.request(path, options).await?;
    Ok(())
}

pub(crate) async fn delete_one(client: &ApiClient, path: &str) -> Result<(), ApiError> {
    client
        .request(path, RequestOptions::new(Method::DELETE))
        .await?;
    Ok(())
}

pub(crate) fn nothing_to_update() -> ApiError {
    ApiError::Validation("Nothing to update".to_string())
}
