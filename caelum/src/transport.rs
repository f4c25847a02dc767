//! Blocking HTTP transport behind the query protocol.
//!
//! The protocol components talk to the network through [`TapTransport`] so
//! the submit/poll/resolve sequence can be exercised against scripted
//! responses in tests. The one real implementation wraps a blocking
//! [`reqwest`] client.
//!
//! Bodies are returned regardless of HTTP status: the query service reports
//! failed queries as parseable documents on 4xx responses, and those must
//! reach the diagnostic extraction instead of being dropped at the transport.

use std::time::Duration;

use crate::error::Result;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authorization material obtained at login, passed explicitly into every
/// call that touches the service.
#[derive(Debug, Clone)]
pub struct Credentials {
    token: Option<String>,
}

impl Credentials {
    /// Token-based credentials, applied as `Authorization: Token <t>`.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// No authorization header. Only the login endpoint is usable like this.
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub(crate) fn apply(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Token {}", token)),
            None => request,
        }
    }
}

/// Network seam for the submit/poll/resolve sequence.
pub(crate) trait TapTransport {
    /// POST a url-encoded form, returning the raw response body.
    fn post_form(
        &mut self,
        url: &str,
        credentials: &Credentials,
        fields: &[(String, String)],
    ) -> Result<Vec<u8>>;

    /// POST a multipart request carrying the form fields plus one binary
    /// part named `part_name`.
    fn post_multipart(
        &mut self,
        url: &str,
        credentials: &Credentials,
        fields: &[(String, String)],
        part_name: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>>;

    /// GET a resource, returning the raw response body.
    fn get(&mut self, url: &str, credentials: &Credentials) -> Result<Vec<u8>>;

    /// Block between polls. Overridden by scripted transports so tests run
    /// without sleeping.
    fn wait(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// The real transport.
#[derive(Debug)]
pub(crate) struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub(crate) fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// GET that treats a non-success status as a transport failure. Used by
    /// the plain download endpoints, which never wrap errors in a document.
    pub(crate) fn get_checked(&mut self, url: &str, credentials: &Credentials) -> Result<Vec<u8>> {
        let response = credentials.apply(self.client.get(url)).send()?;
        let response = response.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl TapTransport for HttpTransport {
    fn post_form(
        &mut self,
        url: &str,
        credentials: &Credentials,
        fields: &[(String, String)],
    ) -> Result<Vec<u8>> {
        let request = credentials.apply(self.client.post(url)).form(fields);
        let response = request.send()?;
        Ok(response.bytes()?.to_vec())
    }

    fn post_multipart(
        &mut self,
        url: &str,
        credentials: &Credentials,
        fields: &[(String, String)],
        part_name: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let mut form = reqwest::blocking::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        let part = reqwest::blocking::multipart::Part::bytes(payload)
            .file_name("upload.xml")
            .mime_str("application/x-votable+xml")?;
        form = form.part(part_name.to_string(), part);

        let request = credentials.apply(self.client.post(url)).multipart(form);
        let response = request.send()?;
        Ok(response.bytes()?.to_vec())
    }

    fn get(&mut self, url: &str, credentials: &Credentials) -> Result<Vec<u8>> {
        let response = credentials.apply(self.client.get(url)).send()?;
        Ok(response.bytes()?.to_vec())
    }
}
