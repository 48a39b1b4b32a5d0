// Stats backend HTTP client.
// Wraps reqwest with base URL handling and response status checking.

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::error::{AnidexError, Result};
use crate::store::{StatsMap, StatsSource};

const API_BASE: &str = "http://127.0.0.1:8000";
const STATS_ENDPOINT: &str = "/stats/";

/// HTTP client for the stats backend.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client against the default local backend.
    pub fn new() -> Result<Self> {
        Self::with_base_url(API_BASE)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("anidex"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(AnidexError::Api)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// The base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request to the backend.
    async fn get(&self, endpoint: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.get(&url).send().await.map_err(AnidexError::Api)?;

        check_response(response).await
    }
}

impl StatsSource for ApiClient {
    async fn fetch_stats(&self) -> Result<StatsMap> {
        let response = self.get(STATS_ENDPOINT).await?;
        let stats: StatsMap = response.json().await?;
        Ok(stats)
    }
}

/// Check response status and convert errors.
async fn check_response(response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::OK => Ok(response),
        StatusCode::NOT_FOUND => {
            let url = response.url().to_string();
            Err(AnidexError::NotFound(url))
        }
        status => Err(AnidexError::Other(format!(
            "HTTP {}: {}",
            status,
            response.text().await.unwrap_or_default()
        ))),
    }
}
