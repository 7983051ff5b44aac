mod ocs;
mod quota;
mod session;
mod uploader;

pub use ocs::{
    parse_login_meta,
    parse_share_url,
    share_path,
    Endpoints,
    OcsMeta,
    OCS_STATUS_OK,
    SHARE_TYPE_PUBLIC_LINK,
};
pub use quota::{parse_quota_xml, QuotaInfo, QuotaParseError, QuotaTracker};
pub use session::{LastError, Session};
pub use uploader::{FileUploader, StateSender, UploadLimits};
