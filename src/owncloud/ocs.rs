//! Endpoints and payloads of the ownCloud OCS and WebDAV APIs.

use serde::Deserialize;
use url::Url;

const REST_BASE: &str = "ocs/v1.php";
const AUTH_PATH: &str = "person/check";
const SHARE_PATH: &str = "apps/files_sharing/api/v1/shares";
const WEBDAV_PATH: &str = "remote.php/webdav";

/// `shareType` of a public link share.
pub const SHARE_TYPE_PUBLIC_LINK: u8 = 3;

/// OCS status code for a successful call.
pub const OCS_STATUS_OK: i64 = 100;

pub const QUOTA_PROPFIND_BODY: &str = concat!(
    r#"<propfind xmlns="DAV:">"#,
    "<prop>",
    "<quota-available-bytes/>",
    "<quota-used-bytes/>",
    "</prop>",
    "</propfind>",
);

#[derive(Debug, Deserialize)]
pub struct OcsResponse<T> {
    pub ocs: T,
}

#[derive(Debug, Deserialize)]
pub struct MetaEnvelope {
    pub meta: OcsMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcsMeta {
    pub statuscode: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct ShareData {
    pub url: String,
}

/// Parses `{ocs: {meta: {statuscode, message}}}` from a login answer.
pub fn parse_login_meta(body: &str) -> serde_json::Result<OcsMeta> {
    let response: OcsResponse<MetaEnvelope> = serde_json::from_str(body)?;
    Ok(response.ocs.meta)
}

/// Parses `{ocs: {data: {url}}}` from a share creation answer.
pub fn parse_share_url(body: &str) -> serde_json::Result<String> {
    let response: OcsResponse<DataEnvelope<ShareData>> = serde_json::from_str(body)?;
    Ok(response.ocs.data.url)
}

/// URL builder for one server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    server: String,
}

impl Endpoints {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn login_url(&self) -> String {
        format!("{}/{}/{}?format=json", self.server, REST_BASE, AUTH_PATH)
    }

    pub fn shares_url(&self) -> String {
        format!("{}/{}/{}?format=json", self.server, REST_BASE, SHARE_PATH)
    }

    pub fn webdav_url(&self) -> String {
        format!("{}/{}", self.server, WEBDAV_PATH)
    }

    /// WebDAV URL of `<storage_folder>/<remote_name>`, percent-encoding each
    /// path segment.
    pub fn file_url(&self, storage_folder: &str, remote_name: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&self.webdav_url())?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments.pop_if_empty();
            segments.extend(storage_folder.split('/').filter(|s| !s.is_empty()));
            segments.push(remote_name);
        }

        Ok(url.into())
    }
}

/// Server-side path of an uploaded file, as used by the share API.
pub fn share_path(storage_folder: &str, remote_name: &str) -> String {
    let folder = storage_folder.trim_matches('/');
    if folder.is_empty() {
        format!("/{}", remote_name)
    } else {
        format!("/{}/{}", folder, remote_name)
    }
}
