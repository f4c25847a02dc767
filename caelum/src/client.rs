//! Connection to the S-PLUS cloud service.
//!
//! A [`Connection`] is obtained by logging in, which also learns whether the
//! account has collaborator access. Queries block for the whole
//! submit/poll/resolve sequence; downloads are one-shot GETs. The last
//! fetched artifact is kept on the connection for callers that want to reuse
//! it without re-fetching. Connections are single-threaded by design.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fits::ResultTable;
use crate::job::{self, PollConfig, QueryRequest};
use crate::resolve::{self, HostRewrites};
use crate::table::{self, EncodedTable, TableUpload, TruncationNotice};
use crate::transport::{Credentials, HttpTransport, TapTransport};

/// Public origin of the service.
pub const DEFAULT_ORIGIN: &str = "https://splus.cloud";

/// The most recent artifact fetched through a connection.
#[derive(Debug, Clone)]
pub enum LastContent {
    /// A query result table.
    Table(ResultTable),
    /// Raw FITS bytes from a cutout or field download.
    Bytes(Vec<u8>),
    /// A JSON response, e.g. from a footprint check.
    Json(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CollabResponse {
    collab: String,
}

/// An authenticated session against one service origin.
pub struct Connection {
    origin: String,
    credentials: Credentials,
    collab: bool,
    rewrites: HostRewrites,
    poll: PollConfig,
    transport: HttpTransport,
    last: Option<LastContent>,
}

impl Connection {
    /// Log in at the public origin.
    pub fn login(username: &str, password: &str) -> Result<Self> {
        Self::login_at(DEFAULT_ORIGIN, username, password)
    }

    /// Log in at an explicit origin (test deployments, mirrors).
    pub fn login_at(origin: &str, username: &str, password: &str) -> Result<Self> {
        let origin = origin.trim_end_matches('/').to_string();
        let mut transport = HttpTransport::new()?;
        let (credentials, collab) = authenticate(&mut transport, &origin, username, password)?;
        info!(%origin, collab, "logged in");
        Ok(Self {
            origin,
            credentials,
            collab,
            rewrites: HostRewrites::default(),
            poll: PollConfig::default(),
            transport,
            last: None,
        })
    }

    /// Override the poll cadence and deadline.
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Override the result-link host rewrites.
    pub fn with_host_rewrites(mut self, rewrites: HostRewrites) -> Self {
        self.rewrites = rewrites;
        self
    }

    /// Whether the logged-in account has collaborator access.
    pub fn is_collaborator(&self) -> bool {
        self.collab
    }

    pub(crate) fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn transport_mut(&mut self) -> &mut HttpTransport {
        &mut self.transport
    }

    pub(crate) fn remember(&mut self, content: LastContent) {
        self.last = Some(content);
    }

    /// The last query table or downloaded artifact, last write wins.
    pub fn last_content(&self) -> Option<&LastContent> {
        self.last.as_ref()
    }

    /// Run a query against the account's default namespace (internal tables
    /// for collaborators, public otherwise).
    pub fn query(&mut self, query_text: &str) -> Result<ResultTable> {
        self.run_query(query_text, None, false)
    }

    /// Run a query against public tables only, regardless of access level.
    pub fn query_public(&mut self, query_text: &str) -> Result<ResultTable> {
        self.run_query(query_text, None, true)
    }

    /// Run a query joined against an uploaded table, reachable in the query
    /// text as `TAP_UPLOAD.upload`. Returns the truncation notice when the
    /// upload was cut to the row ceiling.
    pub fn query_with_upload(
        &mut self,
        query_text: &str,
        upload: TableUpload,
        public_data: bool,
    ) -> Result<(ResultTable, Option<TruncationNotice>)> {
        let encoded = table::encode(upload)?;
        let truncated = encoded.truncated;
        let result = self.run_query(query_text, Some(encoded), public_data)?;
        Ok((result, truncated))
    }

    fn run_query(
        &mut self,
        query_text: &str,
        upload: Option<EncodedTable>,
        public_data: bool,
    ) -> Result<ResultTable> {
        let ctx = QueryContext {
            origin: &self.origin,
            credentials: &self.credentials,
            collab: self.collab,
            public_data,
            rewrites: &self.rewrites,
            poll: self.poll,
        };
        let result = execute_query(&mut self.transport, &ctx, query_text, upload)?;
        self.last = Some(LastContent::Table(result.clone()));
        Ok(result)
    }
}

/// Everything a query run needs besides the transport.
pub(crate) struct QueryContext<'a> {
    pub origin: &'a str,
    pub credentials: &'a Credentials,
    pub collab: bool,
    pub public_data: bool,
    pub rewrites: &'a HostRewrites,
    pub poll: PollConfig,
}

/// The full blocking query sequence: submit, poll to a terminal phase,
/// resolve the result. Encoding failures abort before any submission.
pub(crate) fn execute_query(
    transport: &mut dyn TapTransport,
    ctx: &QueryContext<'_>,
    query_text: &str,
    upload: Option<EncodedTable>,
) -> Result<ResultTable> {
    let base_link = job::base_link(ctx.origin, ctx.collab, ctx.public_data);
    debug!(%base_link, "submitting query");
    let request = QueryRequest {
        query_text: query_text.to_string(),
        upload,
    };
    let (handle, submission) = job::submit(transport, ctx.credentials, &base_link, request)?;
    let terminal = job::poll_until_terminal(transport, ctx.credentials, &handle, submission, ctx.poll)?;
    resolve::resolve(transport, ctx.credentials, &terminal, ctx.rewrites)
}

/// Exchange username/password for a token, then learn the access level.
///
/// The collab endpoint answers `{"collab": "yes"}` for collaborator
/// accounts; any other answer, including an unparseable one, means public
/// access only.
pub(crate) fn authenticate(
    transport: &mut dyn TapTransport,
    origin: &str,
    username: &str,
    password: &str,
) -> Result<(Credentials, bool)> {
    let fields = vec![
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ];
    let body = transport.post_form(
        &format!("{}/api/auth/login", origin),
        &Credentials::anonymous(),
        &fields,
    )?;
    let login: LoginResponse = serde_json::from_slice(&body).map_err(|_| Error::Auth {
        reason: "login rejected by the service".to_string(),
    })?;
    let credentials = Credentials::token(login.token);

    let body = transport.post_form(&format!("{}/api/auth/collab", origin), &credentials, &[])?;
    let collab = serde_json::from_slice::<CollabResponse>(&body)
        .map(|c| c.collab == "yes")
        .unwrap_or(false);
    Ok((credentials, collab))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ScriptedTransport};

    const ORIGIN: &str = "https://splus.cloud";

    fn ctx<'a>(
        credentials: &'a Credentials,
        rewrites: &'a HostRewrites,
        collab: bool,
        public_data: bool,
    ) -> QueryContext<'a> {
        QueryContext {
            origin: ORIGIN,
            credentials,
            collab,
            public_data,
            rewrites,
            poll: PollConfig::default(),
        }
    }

    #[test]
    fn query_runs_submit_poll_resolve_on_the_public_endpoint() {
        let fits = testing::fits_table(&[("RA", &[150.1]), ("DEC", &[-0.5])]);
        let mut transport = ScriptedTransport::new(vec![
            b"<job><jobId>11</jobId><phase>EXECUTING</phase></job>".to_vec(),
            b"<job><phase>COMPLETED</phase>\
              <results><result xlink:href=\"https://splus.cloud/r/11.fits\"/></results></job>"
                .to_vec(),
            fits,
        ]);
        let credentials = Credentials::anonymous();
        let rewrites = HostRewrites::default();

        let table = execute_query(
            &mut transport,
            &ctx(&credentials, &rewrites, false, false),
            "SELECT TOP 1 ra, dec FROM idr4_dual.idr4_detection_image",
            None,
        )
        .unwrap();

        assert_eq!(
            transport.forms[0].0,
            "https://splus.cloud/public-TAP/tap/async/"
        );
        assert_eq!(
            transport.gets,
            vec![
                "https://splus.cloud/public-TAP/tap/async/11".to_string(),
                "https://splus.cloud/r/11.fits".to_string(),
            ]
        );
        assert_eq!(transport.waits.len(), 1);
        assert!(table.n_rows() >= 1);
        assert_eq!(table.n_columns(), 2);
    }

    #[test]
    fn malformed_submission_surfaces_the_info_diagnostic() {
        let mut transport = ScriptedTransport::new(vec![
            b"<VOTABLE><INFO name=\"QUERY_STATUS\" value=\"QUERY_ERROR\">syntax error</INFO></VOTABLE>"
                .to_vec(),
        ]);
        let credentials = Credentials::anonymous();
        let rewrites = HostRewrites::default();

        let err = execute_query(
            &mut transport,
            &ctx(&credentials, &rewrites, false, false),
            "SELEC oops",
            None,
        )
        .unwrap_err();

        match err {
            Error::Protocol { diagnostic } => {
                assert_eq!(diagnostic, "QUERY_ERROR: syntax error")
            }
            other => panic!("expected Protocol, got {other:?}"),
        }
        assert!(transport.gets.is_empty());
    }

    #[test]
    fn collaborator_query_uses_the_internal_endpoint() {
        let fits = testing::fits_table(&[("RA", &[1.0])]);
        let mut transport = ScriptedTransport::new(vec![
            b"<job><jobId>12</jobId><phase>COMPLETED</phase>\
              <results><result xlink:href=\"https://splus.cloud/r/12.fits\"/></results></job>"
                .to_vec(),
            fits,
        ]);
        let credentials = Credentials::token("t");
        let rewrites = HostRewrites::default();

        execute_query(
            &mut transport,
            &ctx(&credentials, &rewrites, true, false),
            "SELECT 1",
            None,
        )
        .unwrap();

        assert_eq!(transport.forms[0].0, "https://splus.cloud/tap/tap/async/");
        assert!(transport.waits.is_empty());
    }

    #[test]
    fn remote_error_phase_becomes_a_typed_error() {
        let mut transport = ScriptedTransport::new(vec![
            b"<job><jobId>13</jobId><phase>EXECUTING</phase></job>".to_vec(),
            b"<job><phase>ERROR</phase><message>relation does not exist</message></job>".to_vec(),
        ]);
        let credentials = Credentials::anonymous();
        let rewrites = HostRewrites::default();

        let err = execute_query(
            &mut transport,
            &ctx(&credentials, &rewrites, false, false),
            "SELECT * FROM nope",
            None,
        )
        .unwrap_err();

        match err {
            Error::RemoteQuery { message } => assert_eq!(message, "relation does not exist"),
            other => panic!("expected RemoteQuery, got {other:?}"),
        }
    }

    #[test]
    fn authenticate_learns_collaborator_access() {
        let mut transport = ScriptedTransport::new(vec![
            br#"{"token": "abc123"}"#.to_vec(),
            br#"{"collab": "yes"}"#.to_vec(),
        ]);
        let (_, collab) = authenticate(&mut transport, ORIGIN, "user", "pass").unwrap();
        assert!(collab);
        assert_eq!(transport.forms[0].0, "https://splus.cloud/api/auth/login");
        assert_eq!(
            transport.forms[0].1,
            vec![
                ("username".to_string(), "user".to_string()),
                ("password".to_string(), "pass".to_string()),
            ]
        );
        assert_eq!(transport.forms[1].0, "https://splus.cloud/api/auth/collab");
    }

    #[test]
    fn non_collaborator_answer_means_public_access() {
        let mut transport = ScriptedTransport::new(vec![
            br#"{"token": "abc123"}"#.to_vec(),
            b"You are not a collaborator".to_vec(),
        ]);
        let (_, collab) = authenticate(&mut transport, ORIGIN, "user", "pass").unwrap();
        assert!(!collab);
    }

    #[test]
    fn rejected_login_is_an_auth_error() {
        let mut transport =
            ScriptedTransport::new(vec![br#"{"detail": "invalid credentials"}"#.to_vec()]);
        let err = authenticate(&mut transport, ORIGIN, "user", "wrong").unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
    }
}
