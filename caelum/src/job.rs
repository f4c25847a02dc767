//! Job submission and polling for the asynchronous query service.
//!
//! A query is accepted as a server-side job that moves through phases.
//! Submission POSTs the query (optionally with a table upload) and yields a
//! job handle; the poller then re-reads the job's status document on a fixed
//! cadence until the service reports a terminal phase.

use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::status::{JobPhase, StatusDocument};
use crate::table::EncodedTable;
use crate::transport::{Credentials, TapTransport};

/// Multipart part name the service expects for table uploads.
pub(crate) const UPLOAD_PARAM: &str = "uplTable";

/// Seconds between status polls, matching the service's guidance.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One query submission. Built once per call, never mutated afterwards.
#[derive(Debug, Clone)]
pub(crate) struct QueryRequest {
    pub query_text: String,
    pub upload: Option<EncodedTable>,
}

/// Handle to an accepted job.
#[derive(Debug, Clone)]
pub(crate) struct JobHandle {
    pub job_id: String,
    pub base_link: String,
}

/// Pick the job namespace for this submission. Collaborators use the
/// internal endpoint unless they explicitly ask for public data only.
pub(crate) fn base_link(origin: &str, collab: bool, public_data: bool) -> String {
    if collab && !public_data {
        format!("{}/tap/tap/async/", origin)
    } else {
        format!("{}/public-TAP/tap/async/", origin)
    }
}

/// Submit a query and parse the accepted job out of the response.
///
/// Responses missing either the phase or the job id do not identify a job
/// and are surfaced through the document's diagnostic extraction.
pub(crate) fn submit(
    transport: &mut dyn TapTransport,
    credentials: &Credentials,
    base_link: &str,
    request: QueryRequest,
) -> Result<(JobHandle, StatusDocument)> {
    let mut fields: Vec<(String, String)> = vec![
        ("request".into(), "doQuery".into()),
        ("version".into(), "1.0".into()),
        ("lang".into(), "ADQL".into()),
        ("phase".into(), "run".into()),
        ("query".into(), request.query_text.clone()),
        ("format".into(), "fits".into()),
    ];

    let body = match request.upload {
        Some(encoded) => {
            fields.push(("upload".into(), format!("upload,param:{}", UPLOAD_PARAM)));
            transport.post_multipart(base_link, credentials, &fields, UPLOAD_PARAM, encoded.bytes)?
        }
        None => transport.post_form(base_link, credentials, &fields)?,
    };

    let document = StatusDocument::from_bytes(body);
    match (document.phase(), document.job_id()) {
        (Some(phase), Some(job_id)) => {
            debug!(job_id = %job_id, ?phase, "job accepted");
            let handle = JobHandle {
                job_id,
                base_link: base_link.to_string(),
            };
            Ok((handle, document))
        }
        _ => Err(Error::Protocol {
            diagnostic: document.diagnostic(),
        }),
    }
}

/// Poll cadence and optional overall deadline.
///
/// The legacy protocol has no timeout at all; `deadline: None` keeps that
/// behavior and a stuck job will block the caller indefinitely. Set a
/// deadline to bound the wait.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub deadline: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            deadline: None,
        }
    }
}

/// Re-poll the job until the service reports anything other than EXECUTING.
///
/// The submission response seeds the state machine, so a job that came back
/// already terminal is never polled. Each round waits the configured
/// interval first, then re-reads the status document.
pub(crate) fn poll_until_terminal(
    transport: &mut dyn TapTransport,
    credentials: &Credentials,
    handle: &JobHandle,
    submission: StatusDocument,
    config: PollConfig,
) -> Result<StatusDocument> {
    let mut document = submission;
    let mut phase = document.phase().ok_or_else(|| Error::Protocol {
        diagnostic: document.diagnostic(),
    })?;
    let mut waited = Duration::ZERO;

    while phase == JobPhase::Executing {
        if let Some(deadline) = config.deadline {
            if waited + config.interval > deadline {
                return Err(Error::DeadlineExceeded { waited });
            }
        }
        transport.wait(config.interval);
        waited += config.interval;

        let url = format!("{}{}", handle.base_link, handle.job_id);
        let body = transport.get(&url, credentials)?;
        document = StatusDocument::from_bytes(body);
        phase = document.phase().ok_or_else(|| Error::Protocol {
            diagnostic: document.diagnostic(),
        })?;
        debug!(job_id = %handle.job_id, ?phase, ?waited, "poll");
    }

    Ok(document)
}
