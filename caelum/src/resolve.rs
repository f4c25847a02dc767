//! Turning a terminal status document into a result table.
//!
//! Completed jobs point at their output through a link that the service
//! sometimes addresses by internal infrastructure hostnames unreachable from
//! outside. Known internal origins are rewritten to the public service
//! origin before the link is dereferenced.

use tracing::debug;

use crate::error::{Error, Result};
use crate::fits::{self, ResultTable};
use crate::status::{JobPhase, StatusDocument};
use crate::transport::{Credentials, TapTransport};

/// Substring substitutions applied to result links before fetching.
///
/// The rule list is injectable because the internal addresses follow the
/// service's infrastructure, not any published contract. The default set
/// carries the origins observed so far, all mapped to the public host.
#[derive(Debug, Clone)]
pub struct HostRewrites {
    rules: Vec<(String, String)>,
}

impl Default for HostRewrites {
    fn default() -> Self {
        let public = "https://splus.cloud";
        Self::empty()
            .with_rule("http://192.168.10.23:8080", public)
            .with_rule("http://10.180.0.209:8080", public)
            .with_rule("http://10.180.0.207:8080", public)
            .with_rule("http://10.180.0.219:8080", public)
    }
}

impl HostRewrites {
    /// No rules; links are fetched verbatim.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add an internal-origin to external-origin substitution.
    pub fn with_rule(mut self, internal: impl Into<String>, external: impl Into<String>) -> Self {
        self.rules.push((internal.into(), external.into()));
        self
    }

    /// Apply every rule as a literal substring replacement.
    pub fn rewrite(&self, link: &str) -> String {
        self.rules
            .iter()
            .fold(link.to_string(), |link, (internal, external)| {
                link.replace(internal.as_str(), external.as_str())
            })
    }
}

/// Resolve a terminal status document into the final table.
///
/// COMPLETED jobs have their result link rewritten and fetched; ERROR jobs
/// surface the service's message; anything else falls through to the
/// document's diagnostic extraction.
pub(crate) fn resolve(
    transport: &mut dyn TapTransport,
    credentials: &Credentials,
    document: &StatusDocument,
    rewrites: &HostRewrites,
) -> Result<ResultTable> {
    match document.phase() {
        Some(JobPhase::Completed) => {
            let href = document.result_href().ok_or_else(|| Error::Protocol {
                diagnostic: document.diagnostic(),
            })?;
            let link = rewrites.rewrite(&href);
            debug!(%href, %link, "fetching result");
            let bytes = transport.get(&link, credentials)?;
            fits::read_table(&bytes)
        }
        Some(JobPhase::Error) => Err(Error::RemoteQuery {
            message: document
                .message()
                .unwrap_or_else(|| document.diagnostic()),
        }),
        _ => Err(Error::Protocol {
            diagnostic: document.diagnostic(),
        }),
    }
}
