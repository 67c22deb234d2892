//! Authenticated HTTP session shared by the DCE and engine clients.
//!
//! [`HttpSession`] owns the transport, the base URL, the credentials and the
//! default timeout. Every request sent through it has failed responses
//! classified into [`ApiError`](crate::ApiError) in one place.

use crate::client::{ClientConfig, ACCESS_TOKEN_HEADER};
use crate::config::Credentials;
use crate::error::ApiError;
use crate::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Certificate, Client, ClientBuilder, Identity, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{info, warn};

/// Placeholder replaced with the resolved API prefix in path templates.
pub const PREFIX_PLACEHOLDER: &str = "{@}";

/// Fill the positional `{}` slots of a path template in order.
///
/// Slots without a matching argument are left untouched.
#[must_use]
pub fn expand_path(template: &str, args: &[&str]) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(index) = rest.find("{}") {
        expanded.push_str(&rest[..index]);
        match args.next() {
            Some(arg) => expanded.push_str(arg),
            None => expanded.push_str("{}"),
        }
        rest = &rest[index + 2..];
    }

    expanded.push_str(rest);
    expanded
}

/// Percent-encode one path argument, keeping `/` and `:`.
#[must_use]
pub fn quote_path_arg(arg: &str) -> String {
    // byte_serialize encodes a literal `+` as %2B, so every `+` left is a space
    url::form_urlencoded::byte_serialize(arg.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace("%2F", "/")
        .replace("%3A", ":")
}

/// [`expand_path`] with every argument passed through [`quote_path_arg`].
#[must_use]
pub fn expand_quoted_path(template: &str, args: &[&str]) -> String {
    let quoted: Vec<String> = args.iter().map(|arg| quote_path_arg(arg)).collect();
    let quoted: Vec<&str> = quoted.iter().map(String::as_str).collect();
    expand_path(template, &quoted)
}

/// Builder for [`HttpSession`].
#[derive(Clone)]
pub struct HttpSessionBuilder {
    base_url: String,
    config: ClientConfig,
    credentials: Credentials,
    accept_invalid_certs: bool,
    root_certificates: Vec<Certificate>,
    identity: Option<Identity>,
    headers: HeaderMap,
}

impl HttpSessionBuilder {
    /// Create a builder for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            config: ClientConfig::new(),
            credentials: Credentials::default(),
            accept_invalid_certs: false,
            root_certificates: Vec::new(),
            identity: None,
            headers: HeaderMap::new(),
        }
    }

    /// Override the transport configuration.
    #[must_use]
    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach credentials to every request.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Skip TLS certificate verification.
    #[must_use]
    pub const fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Trust an additional root certificate.
    #[must_use]
    pub fn with_root_certificate(mut self, certificate: Certificate) -> Self {
        self.root_certificates.push(certificate);
        self
    }

    /// Present a client certificate.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Send an extra header with every request.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Finalise the builder and create the [`HttpSession`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when the token is not a valid header
    /// value or the transport cannot be built.
    pub fn build(self) -> Result<HttpSession> {
        let mut headers = self.headers;
        if let Some(token) = self.credentials.token() {
            let mut value = HeaderValue::from_str(token).map_err(|err| {
                Error::ConfigError(format!("Access token is not a valid header value: {err}"))
            })?;
            value.set_sensitive(true);
            headers.insert(ACCESS_TOKEN_HEADER, value);
        }

        let mut builder = ClientBuilder::new()
            .user_agent(self.config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(self.config.connect_timeout)
            .pool_idle_timeout(self.config.pool_idle_timeout)
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);

        if !self.config.enable_compression {
            builder = builder.no_gzip();
        }

        if self.accept_invalid_certs {
            warn!(base_url = %self.base_url, "TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        for certificate in self.root_certificates {
            builder = builder.add_root_certificate(certificate);
        }

        if let Some(identity) = self.identity {
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(HttpSession {
            http,
            base_url: self.base_url,
            timeout: self.config.timeout,
            credentials: self.credentials,
        })
    }
}

/// An authenticated HTTP session against one base URL.
#[derive(Debug, Clone)]
pub struct HttpSession {
    http: Client,
    base_url: String,
    timeout: Duration,
    credentials: Credentials,
}

impl HttpSession {
    /// Start a builder for the given base URL.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> HttpSessionBuilder {
        HttpSessionBuilder::new(base_url)
    }

    /// The base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Default timeout applied to every request.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Credentials attached to every request.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Prepare a request with the session timeout and basic auth applied.
    ///
    /// Calling [`RequestBuilder::timeout`] on the result overrides the default.
    #[must_use]
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.http.request(method, url).timeout(self.timeout);
        if let Some((user, pass)) = self.credentials.basic_auth() {
            request = request.basic_auth(user, Some(pass));
        }
        request
    }

    /// Prepare a GET request.
    #[must_use]
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Prepare a POST request.
    #[must_use]
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Prepare a PUT request.
    #[must_use]
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Prepare a DELETE request.
    #[must_use]
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Send a request, turning 4xx and 5xx responses into [`Error::Api`].
    ///
    /// # Errors
    ///
    /// Transport failures are returned as-is; failed statuses are classified.
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        info!(method = %request.method(), url = %request.url(), "Sending request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ApiError::from_response(response).await.into());
        }
        Ok(response)
    }

    /// Send a request and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); a body that does not decode is
    /// [`Error::ParseError`].
    pub async fn json<T>(&self, request: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(request).await?;
        let url = response.url().clone();
        response.json::<T>().await.map_err(|err| {
            Error::ParseError(format!("Failed to parse response from `{url}`: {err}"))
        })
    }

    /// Send a request and return the body as text.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn text(&self, request: RequestBuilder) -> Result<String> {
        let response = self.execute(request).await?;
        Ok(response.text().await?)
    }

    /// GET a URL and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`json`](Self::json).
    pub async fn get_json<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.json(self.get(url)).await
    }

    /// GET a URL and return the body as text.
    ///
    /// # Errors
    ///
    /// See [`text`](Self::text).
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.text(self.get(url)).await
    }
}
