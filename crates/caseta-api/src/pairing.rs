// Pairing wire exchange (port 8083)
//
// After the pairing channel opens, the bridge stays silent until its button
// is pressed. It then emits a `status;` message granting `PhysicalAccess`,
// after which it will sign one CSR.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::leap::{Communique, Header, LeapClient};

const PAIR_CLIENT_TAG: &str = "get-cert";
const PHYSICAL_ACCESS: &str = "PhysicalAccess";

/// Signed material returned by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SigningResult {
    /// Client certificate (PEM) signed by the bridge.
    pub certificate: String,
    /// Bridge CA (PEM) to trust on the authenticated channel.
    pub root_certificate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SigningResultBody {
    signing_result: SigningResult,
}

/// Block until the bridge reports the button press.
///
/// Unbounded; callers wrap this in their own deadline.
pub async fn await_physical_access(client: &mut LeapClient) -> Result<(), Error> {
    loop {
        let message = client.recv().await?;
        if grants_physical_access(&message) {
            debug!("bridge granted physical access");
            return Ok(());
        }
        debug!(
            content_type = message.header.content_type.as_deref().unwrap_or(""),
            "waiting for physical access"
        );
    }
}

/// Submit a CSR and wait for the bridge to sign it.
pub async fn exchange_csr(
    client: &mut LeapClient,
    csr_pem: &str,
    display_name: &str,
) -> Result<SigningResult, Error> {
    let request = Communique {
        communique_type: None,
        header: Header {
            request_type: Some("Execute".into()),
            url: Some("/pair".into()),
            client_tag: Some(PAIR_CLIENT_TAG.into()),
            ..Header::default()
        },
        body: Some(json!({
            "CommandType": "CSR",
            "Parameters": {
                "CSR": csr_pem,
                "DisplayName": display_name,
                "DeviceUID": "000000000000",
                "Role": "Admin"
            }
        })),
    };
    client.send(&request).await?;

    loop {
        let response = client.recv().await?;
        let content_type = response.header.content_type.as_deref().unwrap_or("");
        if content_type.starts_with("signing-result;") {
            let body: SigningResultBody = response.parse_body()?;
            return Ok(body.signing_result);
        }
        if let Some(status) = response.status().filter(|s| !s.is_success()) {
            return Err(Error::PairingRejected(status.to_string()));
        }
        debug!(content_type, "ignoring message while waiting for signing result");
    }
}

fn grants_physical_access(message: &Communique) -> bool {
    let is_status = message
        .header
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("status;"));
    if !is_status {
        return false;
    }
    message
        .body
        .as_ref()
        .and_then(|body| body.pointer("/Status/Permissions"))
        .and_then(Value::as_array)
        .is_some_and(|perms| perms.iter().any(|p| p.as_str() == Some(PHYSICAL_ACCESS)))
}
