use std::sync::Arc;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Method;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use crate::core::{BasicAuth, HttpRequest, ProviderError, RequestBody, Result, Transport};
use super::ocs::{Endpoints, QUOTA_PROPFIND_BODY};

/// Storage accounting reported by the server. `None` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaInfo {
    pub total: Option<u64>,
    pub used: Option<u64>,
}

impl QuotaInfo {
    /// Space left for uploads, known only when both sides are known.
    pub fn remaining(&self) -> Option<u64> {
        match (self.total, self.used) {
            (Some(total), Some(used)) => Some(total.saturating_sub(used)),
            _ => None,
        }
    }
}

/// Parses a quota value. ownCloud reports negative numbers for "not
/// computed", "unknown" and "unlimited"; all of them map to `None`.
fn parse_quota_value(text: &str) -> Option<u64> {
    text.trim().parse::<i64>().ok().and_then(|v| u64::try_from(v).ok())
}

#[derive(Error, Debug)]
pub enum QuotaParseError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("empty document")]
    Empty,
}

/// Extracts `quota-available-bytes` and `quota-used-bytes` from a PROPFIND
/// multistatus document. Elements are matched by local name.
pub fn parse_quota_xml(xml: &str) -> std::result::Result<QuotaInfo, QuotaParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut quota = QuotaInfo::default();
    let mut current_tag: Option<Vec<u8>> = None;
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                seen_root = true;
                current_tag = Some(e.local_name().as_ref().to_vec());
            }
            Event::Empty(_) => seen_root = true,
            Event::Text(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).to_string();
                match current_tag.as_deref() {
                    Some(b"quota-available-bytes") if quota.total.is_none() => {
                        quota.total = parse_quota_value(&text);
                    }
                    Some(b"quota-used-bytes") if quota.used.is_none() => {
                        quota.used = parse_quota_value(&text);
                    }
                    _ => {}
                }
            }
            Event::End(_) => current_tag = None,
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(QuotaParseError::Empty);
    }

    Ok(quota)
}

#[derive(Debug, Default)]
struct QuotaState {
    info: QuotaInfo,
    /// Cleared after every upload so the next one refetches
    fresh: bool,
}

/// Keeps the used/total space of one account up to date.
#[derive(Clone)]
pub struct QuotaTracker {
    endpoints: Endpoints,
    transport: Arc<dyn Transport>,
    state: Arc<RwLock<QuotaState>>,
}

impl QuotaTracker {
    pub fn new(endpoints: Endpoints, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoints,
            transport,
            state: Arc::new(RwLock::new(QuotaState::default())),
        }
    }

    /// Issues the quota PROPFIND and stores the result.
    pub async fn get_user_info(&self, auth: &BasicAuth) -> Result<QuotaInfo> {
        let propfind = Method::from_bytes(b"PROPFIND")
            .map_err(|err| ProviderError::failure(err.to_string()))?;

        let request = HttpRequest::new(propfind, self.endpoints.webdav_url())
            .header("Depth", "0")
            .header("Content-Type", "application/xml; charset=utf-8")
            .basic_auth(&auth.username, &auth.password)
            .body(RequestBody::Text(QUOTA_PROPFIND_BODY.to_string()));

        let response = self.transport.send(request).await.map_err(|err| {
            warn!("quota query failed: {}", err);
            ProviderError::auth(format!("quota query failed: {}", err))
        })?;

        if !response.is_success() {
            warn!("quota query rejected with status {}", response.status);
            return Err(ProviderError::auth(format!("quota query returned status {}", response.status)));
        }

        let info = parse_quota_xml(&response.body).map_err(|err| {
            debug!("unparsable quota response: {}", response.body);
            ProviderError::auth(format!("invalid quota response: {}", err))
        })?;

        info!(total = ?info.total, used = ?info.used, "quota updated");

        let mut state = self.state.write().await;
        state.info = info;
        state.fresh = true;

        Ok(info)
    }

    pub async fn info(&self) -> QuotaInfo {
        self.state.read().await.info
    }

    pub async fn is_fresh(&self) -> bool {
        self.state.read().await.fresh
    }

    pub async fn invalidate(&self) {
        self.state.write().await.fresh = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multistatus(props: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:s="http://sabredav.org/ns">
  <d:response>
    <d:href>/remote.php/webdav/</d:href>
    <d:propstat>
      <d:prop>{}</d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#,
            props
        )
    }

    #[test]
    fn test_parse_known_quota() {
        let xml = multistatus(
            "<d:quota-available-bytes>10000</d:quota-available-bytes><d:quota-used-bytes>250</d:quota-used-bytes>",
        );
        let quota = parse_quota_xml(&xml).unwrap();

        assert_eq!(quota, QuotaInfo { total: Some(10000), used: Some(250) });
        assert_eq!(quota.remaining(), Some(9750));
    }

    #[test]
    fn test_negative_values_are_unknown() {
        let xml = multistatus(
            "<d:quota-available-bytes>-3</d:quota-available-bytes><d:quota-used-bytes>-1</d:quota-used-bytes>",
        );
        let quota = parse_quota_xml(&xml).unwrap();

        assert_eq!(quota, QuotaInfo { total: None, used: None });
        assert_eq!(quota.remaining(), None);
    }

    #[test]
    fn test_missing_fields_are_unknown() {
        let xml = multistatus("<d:quota-used-bytes>12</d:quota-used-bytes>");
        let quota = parse_quota_xml(&xml).unwrap();

        assert_eq!(quota.total, None);
        assert_eq!(quota.used, Some(12));
        assert_eq!(quota.remaining(), None);
    }

    #[test]
    fn test_empty_elements() {
        let xml = multistatus("<d:quota-available-bytes/><d:quota-used-bytes>abc</d:quota-used-bytes>");
        let quota = parse_quota_xml(&xml).unwrap();

        assert_eq!(quota, QuotaInfo::default());
    }

    #[test]
    fn test_used_above_total_saturates() {
        let quota = QuotaInfo { total: Some(10), used: Some(20) };
        assert_eq!(quota.remaining(), Some(0));
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse_quota_xml("").is_err());
        assert!(parse_quota_xml("<a><b></a>").is_err());
    }
}
