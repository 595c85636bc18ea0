// Resident profile endpoint

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::client::{ApiRequest, XiaoTuClient};
use crate::error::Error;
use crate::models::UserInfo;

const USER_INFO_PATH: &str = "/userClient/cuserV2/getUserInfoV2";

impl XiaoTuClient {
    /// Fetch the resident's profile and village.
    ///
    /// `POST /userClient/cuserV2/getUserInfoV2` with the session form.
    pub async fn get_user_info(&self) -> Result<UserInfo, Error> {
        let session = self.session().await?;
        let form = self.session_form(session.token().expose_secret());

        debug!("fetching user info");
        let mut user: UserInfo = self
            .request(
                ApiRequest::post(USER_INFO_PATH)
                    .form(form)
                    .bound_to(&session),
            )
            .await?;
        user.mobile = user.mobile.map(decode_mobile);
        Ok(user)
    }
}

/// Mobile numbers arrive base64-encoded. Undecodable values pass through.
fn decode_mobile(raw: String) -> String {
    match STANDARD
        .decode(raw.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    {
        Some(decoded) => decoded,
        None => {
            warn!("mobile number is not base64, keeping raw value");
            raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_mobile() {
        assert_eq!(decode_mobile("MTM4MDAwMDAwMDA=".into()), "13800000000");
    }

    #[test]
    fn keeps_undecodable_mobile() {
        assert_eq!(decode_mobile("138-not-b64!".into()), "138-not-b64!");
    }
}
