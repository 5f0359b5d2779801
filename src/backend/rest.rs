use reqwest::blocking::{RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use serde_json::Value;

use super::{
    classify_auth_error, classify_error, AuthUser, Backend, BackendError, Bearer, Filter, Session,
    Table,
};
use crate::config::SecretKey;

/// Single-object responses: the API answers PGRST116 unless exactly one row matches.
const ACCEPT_SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const PREFER_REPRESENTATION: &str = "return=representation";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for a hosted backend instance.
///
/// Holds one API key. It keeps no session: user tokens travel with each call
/// in the `Bearer`.
pub struct RestBackend {
    base_url: String,
    api_key: SecretKey,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: SecretKey, timeout_secs: u64) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Attach `apikey` and `Authorization` for the given bearer.
    fn authorize(&self, builder: RequestBuilder, bearer: &Bearer) -> RequestBuilder {
        match bearer {
            Bearer::Anon => builder
                .header("apikey", self.api_key.expose())
                .bearer_auth(self.api_key.expose()),
            Bearer::User(token) => builder
                .header("apikey", self.api_key.expose())
                .bearer_auth(token),
            Bearer::ServiceRole(key) => builder
                .header("apikey", key.expose())
                .bearer_auth(key.expose()),
        }
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        builder.send().map_err(|e| {
            if e.is_connect() {
                BackendError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                BackendError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                BackendError::HttpClient(e.to_string())
            }
        })
    }

    fn read_row(&self, response: Response, table: Table) -> Result<Value, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let err = classify_error(status.as_u16(), &body, table);
            tracing::debug!(%table, status = status.as_u16(), code = ?err.code(), "row request failed");
            return Err(err);
        }
        response
            .json()
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))
    }

    fn read_auth<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_auth_error(status.as_u16(), &body));
        }
        response
            .json()
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))
    }
}

impl Backend for RestBackend {
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", self.api_key.expose())
            .json(&PasswordGrant { email, password });
        let response = self.send(request)?;
        self.read_auth(response)
    }

    fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let request = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", self.api_key.expose())
            .header(AUTHORIZATION, format!("Bearer {access_token}"));
        let response = self.send(request)?;
        self.read_auth(response)
    }

    fn select_single(
        &self,
        bearer: &Bearer,
        table: Table,
        filter: &Filter,
    ) -> Result<Value, BackendError> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*".to_string()), (filter.column.as_str(), filter.operator())])
            .header(ACCEPT, ACCEPT_SINGLE_OBJECT);
        let response = self.send(self.authorize(request, bearer))?;
        self.read_row(response, table)
    }

    fn insert_returning(
        &self,
        bearer: &Bearer,
        table: Table,
        row: Value,
    ) -> Result<Value, BackendError> {
        let request = self
            .client
            .post(self.table_url(table))
            .header(ACCEPT, ACCEPT_SINGLE_OBJECT)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&row);
        let response = self.send(self.authorize(request, bearer))?;
        self.read_row(response, table)
    }

    fn update_returning(
        &self,
        bearer: &Bearer,
        table: Table,
        filter: &Filter,
        patch: Value,
    ) -> Result<Value, BackendError> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&[(filter.column.as_str(), filter.operator())])
            .header(ACCEPT, ACCEPT_SINGLE_OBJECT)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&patch);
        let response = self.send(self.authorize(request, bearer))?;
        self.read_row(response, table)
    }
}
