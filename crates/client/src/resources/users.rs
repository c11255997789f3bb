//! Users resource

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{create_one, delete_one, fetch_one, list_page, nothing_to_update, patch_one, ListQuery};
use crate::{ApiClient, ApiError, ListPage};

const PATH: &str = "/users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Clone, Serialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 50))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8))]
    pub password: String,
}

impl fmt::Debug for NewUser {
    #[mutants::skip]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub username_contains: Option<String>,
    pub email_contains: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct UsersApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn users(&self) -> UsersApi<'_> {
        UsersApi { client: self }
    }
}

impl UsersApi<'_> {
    pub async fn list(&self, page: u32, filter: &UserFilter) -> Result<ListPage<User>, ApiError> {
        let query = ListQuery::page(page)?
            .filter("username_contains", filter.username_contains.as_ref())
            .filter("email_contains", filter.email_contains.as_ref());

        list_page(self.client, PATH, query).await
    }

    pub async fn get(&self, id: i64) -> Result<User, ApiError> {
        fetch_one(self.client, &format!("{}/{}", PATH, id)).await
    }

    pub async fn create(&self, user: &NewUser) -> Result<User, ApiError> {
        create_one(self.client, PATH, user).await
    }

    pub async fn update(&self, id: i64, patch: &UserPatch) -> Result<(), ApiError> {
        if patch.is_empty() {
            return Err(nothing_to_update());
        }
        patch_one(self.client, &format!("{}/{}", PATH, id), patch).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        delete_one(self.client, &format!("{}/{}", PATH, id)).await
    }
}
