use super::{ApiClient, ApiError};
use crate::domain::models::{Identity, Role};
use reqwest::Method;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct AdminLoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientLoginRequest<'a> {
    email: &'a str,
    marketing_consent: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: Option<String>,
    username: Option<String>,
    email: Option<String>,
    full_name: Option<String>,
    marketing_consent: Option<bool>,
}

impl LoginResponse {
    fn credential(&self) -> Result<String, ApiError> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("login response carried no token".to_string()))
    }
}

impl ApiClient {
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, ApiError> {
        let builder = self
            .request(Method::POST, &["auth", "login"], None)?
            .json(&AdminLoginRequest { username, password });
        let resp: LoginResponse = self.json(builder).await?;
        let credential = resp.credential()?;

        Ok(Identity {
            role: Role::Admin,
            handle: resp.username.unwrap_or_else(|| username.to_string()),
            full_name: resp.full_name,
            marketing_consent: resp.marketing_consent.unwrap_or(false),
            credential,
        })
    }

    pub async fn client_login(
        &self,
        email: &str,
        marketing_consent: bool,
    ) -> Result<Identity, ApiError> {
        let builder = self
            .request(Method::POST, &["auth", "client-login"], None)?
            .json(&ClientLoginRequest {
                email,
                marketing_consent,
            });
        let resp: LoginResponse = self.json(builder).await?;
        let credential = resp.credential()?;

        Ok(Identity {
            role: Role::Client,
            handle: resp.email.unwrap_or_else(|| email.to_string()),
            full_name: resp.full_name,
            marketing_consent: resp.marketing_consent.unwrap_or(marketing_consent),
            credential,
        })
    }
}
