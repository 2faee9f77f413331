use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;

const APP_USER_AGENT: &str = concat!("packsmith/", env!("CARGO_PKG_VERSION"));

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .build()
}
