use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use titvo_core::{BitbucketConfig, ChangedFile, CommitInfo, Credentials, RunTarget, TitvoError};

use crate::auth::{fetch_access_token, AccessToken};
use crate::report::ScanReport;

/// Bitbucket Cloud REST client bound to one bearer token.
///
/// The token is installed once as a default header and reused for every
/// request; every request is bounded by the configured timeout.
///
/// # Examples
///
/// ```
/// use titvo_bitbucket::auth::AccessToken;
/// use titvo_bitbucket::client::BitbucketClient;
/// use titvo_core::BitbucketConfig;
///
/// let client = BitbucketClient::new(&BitbucketConfig::default(), AccessToken::new("t")).unwrap();
/// assert_eq!(client.api_url().as_str(), "https://api.bitbucket.org/2.0");
/// ```
pub struct BitbucketClient {
    http: reqwest::Client,
    api_url: Url,
}

impl BitbucketClient {
    /// Create a client from configuration and an already acquired token.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Config`] if the API URL is invalid, or
    /// [`TitvoError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &BitbucketConfig, token: AccessToken) -> Result<Self, TitvoError> {
        let api_url = Url::parse(config.api_url.trim_end_matches('/')).map_err(|e| {
            TitvoError::Config(format!("invalid api_url '{}': {e}", config.api_url))
        })?;
        if api_url.cannot_be_a_base() {
            return Err(TitvoError::Config(format!(
                "invalid api_url '{}'",
                config.api_url
            )));
        }

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
            .map_err(|_| TitvoError::Auth("access token contains invalid characters".into()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .user_agent(concat!("titvo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TitvoError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http, api_url })
    }

    /// Run the client-credentials grant and return a client using the token.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Auth`] if no token could be obtained.
    pub async fn authenticate(
        config: &BitbucketConfig,
        credentials: &Credentials,
    ) -> Result<Self, TitvoError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TitvoError::Http(format!("failed to create HTTP client: {e}")))?;
        let token = fetch_access_token(&http, &config.oauth_url, credentials).await?;
        Self::new(config, token)
    }

    /// The REST API base URL.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Fetch commit metadata, confirming the commit exists.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::CommitLookup`] on any status other than 200.
    pub async fn get_commit(&self, target: &RunTarget) -> Result<CommitInfo, TitvoError> {
        let url = self.repo_url(target, &["commit", target.commit.as_str()])?;
        let response = self.send(self.http.get(url), "commit lookup").await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TitvoError::CommitLookup {
                status: status.as_u16(),
                body,
            });
        }
        let body = read_body(response, "commit lookup").await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch the raw unified diff of the commit.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::DiffFetch`] on any status other than 200.
    pub async fn get_diff(&self, target: &RunTarget) -> Result<String, TitvoError> {
        let url = self.repo_url(target, &["diff", target.commit.as_str()])?;
        let response = self.send(self.http.get(url), "diff").await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TitvoError::DiffFetch {
                status: status.as_u16(),
                body,
            });
        }
        read_body(response, "diff").await
    }

    /// Fetch one file's content as it exists at the target commit.
    ///
    /// The body is decoded as UTF-8 text; binary content is out of contract.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Status`] on any status other than 200,
    /// [`TitvoError::Timeout`] when the deadline passes, and
    /// [`TitvoError::Http`] on transport failures.
    pub async fn get_source(
        &self,
        target: &RunTarget,
        file: &ChangedFile,
    ) -> Result<String, TitvoError> {
        let url = self.source_url(target, file)?;
        let response = self.send(self.http.get(url), "source").await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(TitvoError::Status {
                status: status.as_u16(),
                body,
            });
        }
        read_body(response, "source").await
    }

    /// Create or replace a Code Insights report on the commit.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::ReportPublish`] on a non-2xx status.
    pub async fn create_report(
        &self,
        target: &RunTarget,
        report_id: &str,
        report: &ScanReport,
    ) -> Result<serde_json::Value, TitvoError> {
        let url = self.repo_url(
            target,
            &["commit", target.commit.as_str(), "reports", report_id],
        )?;
        let response = self
            .send(self.http.put(url).json(report), "report")
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(TitvoError::ReportPublish {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `{api}/repositories/{workspace}/{repo}/src/{commit}/{path...}`, with
    /// each path segment percent-encoded on its own.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Config`] if the base URL cannot take a path.
    pub fn source_url(&self, target: &RunTarget, file: &ChangedFile) -> Result<Url, TitvoError> {
        let mut url = self.repo_url(target, &["src", target.commit.as_str()])?;
        url.path_segments_mut()
            .map_err(|_| TitvoError::Config("api_url cannot be a base".into()))?
            .extend(file.segments());
        Ok(url)
    }

    fn repo_url(&self, target: &RunTarget, tail: &[&str]) -> Result<Url, TitvoError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| TitvoError::Config("api_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["repositories", target.workspace.as_str(), target.repo_slug.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, TitvoError> {
        request.send().await.map_err(|e| transport_error(e, what))
    }
}

async fn read_body(response: reqwest::Response, what: &str) -> Result<String, TitvoError> {
    response.text().await.map_err(|e| transport_error(e, what))
}

fn transport_error(e: reqwest::Error, what: &str) -> TitvoError {
    if e.is_timeout() {
        TitvoError::Timeout(format!("{what}: {e}"))
    } else {
        TitvoError::Http(format!("{what} request failed: {e}"))
    }
}
