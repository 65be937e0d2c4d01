use std::fs::File;
use std::time::Duration;

use chrono::Utc;
use eyre::{eyre, WrapErr};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const KMS_SCOPE: &str = "https://www.googleapis.com/auth/cloudkms";

/// The fields of a service-account key file needed for the JWT bearer flow.
#[derive(Deserialize, Clone)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

pub fn load_iam_json(file_path: &str) -> eyre::Result<ServiceAccount> {
    let file = File::open(file_path).wrap_err_with(|| format!("failed to open {file_path}"))?;
    let account = serde_json::from_reader(file)
        .wrap_err_with(|| format!("{file_path} is not a service account key file"))?;
    Ok(account)
}

pub async fn get_oauth2_token(client: &Client, account: &ServiceAccount) -> eyre::Result<String> {
    let token = generate_jwt(account)?;
    let params = serde_json::json!({
        "grant_type": "urn:ietf:params:oauth:grant-type:jwt-bearer",
        "assertion": token,
    });
    let response = client
        .post(&account.token_uri)
        .json(&params)
        .send()
        .await
        .wrap_err("token request failed")?
        .error_for_status()
        .wrap_err("token endpoint rejected the assertion")?;
    let json: serde_json::Value = response.json().await?;

    json["access_token"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| eyre!("token response has no access_token"))
}

fn generate_jwt(account: &ServiceAccount) -> eyre::Result<String> {
    let now = Utc::now();
    let exp = now + chrono::Duration::hours(1);

    let claims = serde_json::json!({
        "iss": account.client_email,
        "sub": account.client_email,
        "scope": KMS_SCOPE,
        "aud": account.token_uri,
        "iat": now.timestamp(),
        "exp": exp.timestamp(),
    });

    let header = Header::new(jsonwebtoken::Algorithm::RS256);
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
    let token = encode(&header, &claims, &key)?;

    Ok(token)
}

/// HTTP client that sends `Authorization: Bearer <token>` on every request.
pub fn bearer_client(token: &str, timeout: Duration) -> eyre::Result<Client> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .wrap_err("access token is not a valid header value")?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);

    ClientBuilder::new()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .wrap_err("failed to build HTTP client")
}
