//! Orders resource

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{create_one, delete_one, fetch_one, list_page, nothing_to_update, patch_one, ListQuery};
use crate::{ApiClient, ApiError, ListPage};

const PATH: &str = "/orders";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub total_price: f64,
    /// Naive timestamps from the backend are taken as UTC
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {:?}", raw)))
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewOrder {
    #[validate(range(min = 1))]
    pub user_id: i64,

    #[validate(range(min = 0.0))]
    pub total_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub total_price: Option<f64>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.total_price.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct OrdersApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn orders(&self) -> OrdersApi<'_> {
        OrdersApi { client: self }
    }
}

impl OrdersApi<'_> {
    pub async fn list(&self, page: u32, filter: &OrderFilter) -> Result<ListPage<Order>, ApiError> {
        let query = ListQuery::page(page)?.filter("user_id", filter.user_id.as_ref());
        list_page(self.client, PATH, query).await
    }

    pub async fn get(&self, id: i64) -> Result<Order, ApiError> {
        fetch_one(self.client, &format!("{}/{}", PATH, id)).await
    }

    pub async fn create(&self, order: &NewOrder) -> Result<Order, ApiError> {
        create_one(self.client, PATH, order).await
    }

    pub async fn update(&self, id: i64, patch: &OrderPatch) -> Result<(), ApiError> {
        if patch.is_empty() {
            return Err(nothing_to_update());
        }
        patch_one(self.client, &format!("{}/{}", PATH, id), patch).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        delete_one(self.client, &format!("{}/{}", PATH, id)).await
    }
}
