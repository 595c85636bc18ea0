// Door endpoints
//
// Both calls are session-bound: the token rides along as a query parameter
// or header, and the client id identifies the install.

use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::debug;

use crate::client::{ApiRequest, XiaoTuClient};
use crate::error::Error;
use crate::models::DoorRecord;

const LIST_DOORS_PATH: &str = "/wap/door/getDoor";
const OPEN_DOOR_PATH: &str = "/wap/door/openDoor";

impl XiaoTuClient {
    /// List every door the account can see, unfiltered.
    ///
    /// `GET /wap/door/getDoor?tokenId=…` with a `tokenId` header.
    pub async fn list_doors(&self) -> Result<Vec<DoorRecord>, Error> {
        let session = self.session().await?;
        let token = session.token().expose_secret();

        debug!("listing doors");
        let doors: Option<Vec<DoorRecord>> = self
            .request(
                ApiRequest::get(LIST_DOORS_PATH)
                    .query("tokenId", token)
                    .header("tokenId", token)
                    .bound_to(&session),
            )
            .await?;
        Ok(doors.unwrap_or_default())
    }

    /// Release the latch of `door_id`.
    ///
    /// `GET /wap/door/openDoor?clientId=…&doorId=…&longitude=&latitude=`
    /// with a `tokenId` header. Location is left blank.
    pub async fn open_door(&self, door_id: &str) -> Result<(), Error> {
        let session = self.session().await?;
        let client_id = self.credentials().client_id.expose_secret();

        debug!(door_id, "opening door");
        let _: Value = self
            .request(
                ApiRequest::get(OPEN_DOOR_PATH)
                    .query("clientId", client_id)
                    .query("doorId", door_id)
                    .query("longitude", "")
                    .query("latitude", "")
                    .header("tokenId", session.token().expose_secret())
                    .bound_to(&session),
            )
            .await?;
        Ok(())
    }
}
