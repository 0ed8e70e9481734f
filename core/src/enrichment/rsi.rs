//! Organization lookup against the public RSI citizen pages.

use std::time::Duration;

use reqwest::StatusCode;

use super::{Affiliation, OrgLookup, OrganizationInfo};
use crate::error::LookupError;

const USER_AGENT: &str = concat!("sc-log-monitor/", env!("CARGO_PKG_VERSION"));
const CITIZEN_LOOKUP_URL: &str = "https://robertsspaceindustries.com/en/citizens/";
const SID_MARKER: &str = "Spectrum Identification (SID)";

pub fn citizen_url(handle: &str) -> String {
    format!("https://robertsspaceindustries.com/citizens/{}", handle)
}

pub fn organization_url(sid: &str) -> String {
    format!("https://robertsspaceindustries.com/orgs/{}", sid)
}

pub struct RsiLookup {
    client: reqwest::Client,
    base_url: String,
}

impl RsiLookup {
    pub fn new(timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: CITIZEN_LOOKUP_URL.to_string(),
        })
    }

    /// Point lookups at another host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl OrgLookup for RsiLookup {
    async fn lookup(&self, handle: &str) -> Result<Affiliation, LookupError> {
        let url = format!("{}{}", self.base_url, handle);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Affiliation::NotACitizen),
            status if status.is_success() => {
                let body = response.text().await?;
                Ok(Affiliation::Citizen {
                    organization: parse_org_sid(&body).map(|sid| OrganizationInfo { sid }),
                })
            }
            status => Err(LookupError::Status(status.as_u16())),
        }
    }
}

/// Find the main organization SID on a citizen page.
///
/// The SID is the text of the first element opened after the
/// "Spectrum Identification (SID)" label.
pub fn parse_org_sid(html: &str) -> Option<String> {
    let marker = html.find(SID_MARKER)?;
    let mut rest = &html[marker + SID_MARKER.len()..];

    loop {
        let open = rest.find('<')?;
        rest = &rest[open..];

        if let Some(comment) = rest.strip_prefix("<!--") {
            rest = &comment[comment.find("-->")? + 3..];
            continue;
        }

        let close = tag_end(rest)?;
        let closing_tag = rest[1..].starts_with('/');
        rest = &rest[close + 1..];

        if !closing_tag {
            let end = rest.find('<').unwrap_or(rest.len());
            let text = rest[..end].trim();
            return (!text.is_empty()).then(|| text.to_string());
        }
    }
}

/// Index of the `>` ending the tag at the start of `tag`, skipping any
/// `>` inside quoted attribute values.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}
