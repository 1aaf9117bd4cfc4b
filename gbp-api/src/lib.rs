pub mod endpoints;
mod error;
mod macros;
pub mod repositories;

pub use crate::error::{ErrorDetail, GbpApiError};
pub use tower_api_client::StatusCode;
use repositories::*;
use secrecy::{ExposeSecret, SecretString};
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

pub const ACCOUNT_MANAGEMENT_URL: &str = "https://mybusinessaccountmanagement.googleapis.com/v1";
pub const MY_BUSINESS_URL: &str = "https://mybusiness.googleapis.com/v4";

/// The Google API surface a request is served from.
///
/// Business Profile is split across several hosts; accounts live on the Account Management API
/// while reviews are still only exposed by the legacy v4 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    AccountManagement,
    MyBusiness,
}

/// A request that knows which [`Api`] host serves it.
pub trait Endpoint: ApiRequest {
    const API: Api;
}

pub struct Client {
    account_management: ApiClient,
    my_business: ApiClient,
}

impl Client {
    pub fn new(access_token: &SecretString) -> Self {
        Self::with_base_urls(ACCOUNT_MANAGEMENT_URL, MY_BUSINESS_URL, access_token)
    }

    /// Build a client against non-default hosts (useful for proxies and local fakes).
    pub fn with_base_urls(
        account_management_url: &str,
        my_business_url: &str,
        access_token: &SecretString,
    ) -> Self {
        let token = access_token.expose_secret();
        Self {
            account_management: ApiClient::new(account_management_url).bearer_auth(token),
            my_business: ApiClient::new(my_business_url).bearer_auth(token),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, GbpApiError>
    where
        R: Endpoint,
    {
        let inner = match R::API {
            Api::AccountManagement => &self.account_management,
            Api::MyBusiness => &self.my_business,
        };
        inner.send(request).await.map_err(From::from)
    }
}

pub struct Request;

impl Request {
    pub fn accounts() -> AccountRepository {
        AccountRepository::new()
    }

    pub fn reviews<A, L>(account_id: A, location_id: L) -> ReviewRepository
    where
        A: Into<endpoints::AccountId>,
        L: Into<endpoints::LocationId>,
    {
        ReviewRepository::new(account_id.into(), location_id.into())
    }
}
