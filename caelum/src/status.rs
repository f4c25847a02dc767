//! Status documents returned by the asynchronous query service.
//!
//! Both the submission response and every poll response carry an XML
//! document with the job's current phase and, once terminal, either a result
//! link or an error message. Servers have been observed emitting the tags
//! with and without a namespace prefix, so elements are matched on their
//! local name.

/// Server-reported lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Queued,
    Executing,
    Completed,
    Error,
    Aborted,
    /// Any phase string this client does not recognize.
    Unknown,
}

impl JobPhase {
    fn parse(text: &str) -> JobPhase {
        match text.trim() {
            "QUEUED" => JobPhase::Queued,
            "EXECUTING" => JobPhase::Executing,
            "COMPLETED" => JobPhase::Completed,
            "ERROR" => JobPhase::Error,
            "ABORTED" => JobPhase::Aborted,
            _ => JobPhase::Unknown,
        }
    }
}

/// A parsed-on-demand job status document.
#[derive(Debug, Clone)]
pub struct StatusDocument {
    raw: String,
}

impl StatusDocument {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            raw: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// Job phase, if the document carries a `phase` element.
    pub fn phase(&self) -> Option<JobPhase> {
        let (_, text) = find_element(&self.raw, "phase")?;
        Some(JobPhase::parse(&unescape(text)))
    }

    /// Job identifier; present on submission responses.
    pub fn job_id(&self) -> Option<String> {
        let (_, text) = find_element(&self.raw, "jobId")?;
        let id = text.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    /// Location of the finished result, from `result@xlink:href`.
    pub fn result_href(&self) -> Option<String> {
        let (attrs, _) = find_element(&self.raw, "result")?;
        attr_value(attrs, "xlink:href").or_else(|| attr_value(attrs, "href"))
    }

    /// Human-readable failure cause, present when the phase is ERROR.
    pub fn message(&self) -> Option<String> {
        let (_, text) = find_element(&self.raw, "message")?;
        let msg = unescape(text.trim());
        if msg.is_empty() {
            None
        } else {
            Some(msg)
        }
    }

    /// Fallback diagnostic from the generic `INFO` element, formatted as
    /// `"<value>: <text>"`. This is the catch-all for responses that do not
    /// follow the expected phase/jobId/result/message shape.
    pub fn info_diagnostic(&self) -> Option<String> {
        let (attrs, text) = find_element(&self.raw, "INFO")?;
        let value = attr_value(attrs, "value");
        let text = unescape(text.trim());
        match (value, text.is_empty()) {
            (Some(value), false) => Some(format!("{}: {}", value, text)),
            (Some(value), true) => Some(value),
            (None, false) => Some(text),
            (None, true) => None,
        }
    }

    /// Best-effort description of a document that failed to parse.
    pub fn diagnostic(&self) -> String {
        self.info_diagnostic()
            .unwrap_or_else(|| "status document not understood".to_string())
    }
}

/// Locate the first element whose local name matches `tag`, returning its
/// attribute string and text content. Namespace prefixes are ignored; only
/// leaf elements are expected, so the content ends at the next closing tag.
fn find_element<'a>(raw: &'a str, tag: &str) -> Option<(&'a str, &'a str)> {
    let mut search = 0;
    while let Some(offset) = raw[search..].find('<') {
        let start = search + offset + 1;
        let rest = &raw[start..];
        if rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('!') {
            search = start;
            continue;
        }
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        let local = name.rsplit(':').next().unwrap_or(name);
        if local != tag {
            search = (start + name_end.max(1)).min(raw.len());
            continue;
        }

        let open_end = rest.find('>')?;
        let attrs = rest[name_end..open_end].trim_end_matches('/');
        if rest[..open_end].ends_with('/') {
            // Self-closing element, attributes only.
            return Some((attrs, ""));
        }
        let content_start = start + open_end + 1;
        let content_end = raw[content_start..]
            .find("</")
            .map_or(raw.len(), |e| content_start + e);
        return Some((attrs, &raw[content_start..content_end]));
    }
    None
}

/// Pull a double-quoted attribute value out of an element's attribute
/// string.
fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let mut search = 0;
    while let Some(offset) = attrs[search..].find(name) {
        let start = search + offset;
        let after = &attrs[start + name.len()..];
        let after = after.trim_start();
        if let Some(rest) = after.strip_prefix('=') {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix('"')?;
            let end = rest.find('"')?;
            return Some(unescape(&rest[..end]));
        }
        search = start + name.len();
    }
    None
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
