use agent_utils::retry::{RetryError, RetryPolicy, RetryRunner, Sleeper, ThreadSleeper};
use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::redirect;
use serde::Serialize;
use serde_json::Value;
use serde_plain::derive_display_from_serialize;
use snafu::{ensure, ResultExt, Snafu};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Readiness polls give a freshly started server longer to answer than configuration calls.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("Unsupported method '{}' specified!", method))]
    UnsupportedMethod { method: String },

    #[snafu(display("Unable to build the HTTP client: {}", source))]
    ClientBuild { source: reqwest::Error },

    #[snafu(display("Request '{}' '{}' did not succeed: {}", method, url, source))]
    Request {
        method: HttpMethod,
        url: String,
        source: RetryError<AttemptError>,
    },
}

/// Why a single request failed. Every variant is worth retrying.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AttemptError {
    #[snafu(display("Unable to reach '{}': {}", url, source))]
    Transport { url: String, source: reqwest::Error },

    #[snafu(display("'{}' responded with HTTP {}", url, status))]
    Status { url: String, status: u16 },

    #[snafu(display("Unable to read the response from '{}': {}", url, source))]
    Body { url: String, source: reqwest::Error },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            _ => UnsupportedMethodSnafu { method: s }.fail(),
        }
    }
}

derive_display_from_serialize!(HttpMethod);

/// The control plane's HTTP API.
pub trait ControlPlane {
    /// Returns once `url` answers a GET with a 2xx status.
    fn poll_until_ready(&self, url: &Url, policy: &RetryPolicy) -> Result<(), ApiError>;

    fn get(&self, url: &Url, policy: &RetryPolicy) -> Result<Value, ApiError>;

    fn post(&self, url: &Url, payload: &Value, policy: &RetryPolicy) -> Result<Value, ApiError>;

    fn put(&self, url: &Url, payload: &Value, policy: &RetryPolicy) -> Result<Value, ApiError>;
}

/// A blocking [`ControlPlane`] client. Redirects are not followed, so a 3xx counts as a failed
/// attempt like any other non-2xx status.
pub struct HttpControlPlane<S = ThreadSleeper> {
    client: Client,
    retry: RetryRunner<S>,
}

impl HttpControlPlane {
    pub fn new() -> Result<Self, ApiError> {
        Self::with_sleeper(ThreadSleeper)
    }
}

impl<S: Sleeper> HttpControlPlane<S> {
    pub fn with_sleeper(sleeper: S) -> Result<Self, ApiError> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            retry: RetryRunner::new(sleeper),
        })
    }

    /// Send a request named by its method string, e.g. `"PUT"`. An unknown method is rejected
    /// before anything is sent.
    pub fn request(
        &self,
        method: &str,
        url: &Url,
        payload: &Value,
        policy: &RetryPolicy,
    ) -> Result<Value, ApiError> {
        let method = method.parse::<HttpMethod>()?;
        self.send(method, url, payload, policy)
    }

    fn send(
        &self,
        method: HttpMethod,
        url: &Url,
        payload: &Value,
        policy: &RetryPolicy,
    ) -> Result<Value, ApiError> {
        info!("Sending request '{}' '{}'...", method, url);
        debug!("Payload data: {}", payload);
        self.retry
            .execute(
                &format!("{} {}", method, url),
                policy,
                |_: &AttemptError| true,
                || self.attempt(method, url, payload),
            )
            .context(RequestSnafu {
                method,
                url: url.as_str(),
            })
    }

    fn attempt(
        &self,
        method: HttpMethod,
        url: &Url,
        payload: &Value,
    ) -> Result<Value, AttemptError> {
        let request: RequestBuilder = match method {
            HttpMethod::Get => self.client.get(url.clone()).timeout(POLL_TIMEOUT),
            HttpMethod::Post => self
                .client
                .post(url.clone())
                .timeout(REQUEST_TIMEOUT)
                .json(payload),
            HttpMethod::Put => self
                .client
                .put(url.clone())
                .timeout(REQUEST_TIMEOUT)
                .json(payload),
        };
        let response = request.send().context(TransportSnafu { url: url.as_str() })?;
        let status = response.status();
        info!("response code: HTTP {}", status.as_u16());
        debug!("response: Headers:: {:?}", response.headers());
        ensure!(
            status.is_success(),
            StatusSnafu {
                url: url.as_str(),
                status: status.as_u16(),
            }
        );
        let body = response.text().context(BodySnafu { url: url.as_str() })?;
        Ok(parse_body(&body))
    }
}

impl<S: Sleeper> ControlPlane for HttpControlPlane<S> {
    fn poll_until_ready(&self, url: &Url, policy: &RetryPolicy) -> Result<(), ApiError> {
        self.get(url, policy).map(|_| ())
    }

    fn get(&self, url: &Url, policy: &RetryPolicy) -> Result<Value, ApiError> {
        self.send(HttpMethod::Get, url, &Value::Null, policy)
    }

    fn post(&self, url: &Url, payload: &Value, policy: &RetryPolicy) -> Result<Value, ApiError> {
        self.send(HttpMethod::Post, url, payload, policy)
    }

    fn put(&self, url: &Url, payload: &Value, policy: &RetryPolicy) -> Result<Value, ApiError> {
        self.send(HttpMethod::Put, url, payload, policy)
    }
}

/// Empty bodies are `Null` and bodies that are not JSON are kept as a JSON string.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn methods() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("PUT".parse::<HttpMethod>().unwrap().to_string(), "PUT");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert!(matches!(
            "DELETE".parse::<HttpMethod>(),
            Err(ApiError::UnsupportedMethod { .. })
        ));
        assert!("get".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn bodies() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("  \n"), Value::Null);
        assert_eq!(parse_body(r#"{"id":"1c1"}"#), json!({"id": "1c1"}));
        assert_eq!(parse_body("accepted"), json!("accepted"));
    }
}
