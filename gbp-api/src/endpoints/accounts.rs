use super::AccountId;
use crate::macros::setter;
use crate::{Api, Endpoint};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Resource name, `accounts/{account_id}`
    pub name: String,
    pub account_name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    pub role: Option<String>,
    pub verification_state: Option<String>,
    pub vetted_state: Option<String>,
}

impl Account {
    pub fn id(&self) -> AccountId {
        AccountId::from(self.name.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    AccountTypeUnspecified,
    Personal,
    LocationGroup,
    UserGroup,
    Organization,
}

// Requests

#[derive(Default, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAccounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

impl ListAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(opt page_size: u32);
    setter!(opt page_token: String);
}

impl Request for ListAccounts {
    type Data = Self;
    type Response = AccountsResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/accounts".into()
    }

    fn data(&self) -> RequestData<&Self> {
        RequestData::Query(self)
    }
}

impl Endpoint for ListAccounts {
    const API: Api = Api::AccountManagement;
}

// Responses

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_account_list() {
        let body = r#"{
            "accounts": [
                {"name": "accounts/115", "accountName": "Labh Software", "type": "LOCATION_GROUP", "verificationState": "VERIFIED"}
            ]
        }"#;

        let response: AccountsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.accounts.len(), 1);
        assert_eq!(response.accounts[0].id(), "115");
        assert_eq!(
            response.accounts[0].account_type,
            Some(AccountType::LocationGroup)
        );
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn empty_listing_has_no_accounts_field() {
        let response: AccountsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.accounts.is_empty());
    }
}
