#![allow(clippy::unwrap_used)]
// Integration tests for `LeapClient` and the pairing exchange over an
// in-memory duplex stream standing in for the bridge.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;

use caseta_api::leap::FanSpeed;
use caseta_api::{Error, LeapClient, pairing};

// ── Helpers ─────────────────────────────────────────────────────────

const TIMEOUT: Duration = Duration::from_secs(5);

fn client_pair() -> (LeapClient, DuplexStream) {
    let (client_end, bridge_end) = tokio::io::duplex(64 * 1024);
    (LeapClient::from_stream(client_end, TIMEOUT), bridge_end)
}

/// Spawn a scripted bridge. Every request line is forwarded to `seen` and
/// answered with whatever `respond` returns.
fn spawn_bridge<F>(stream: DuplexStream, mut respond: F) -> mpsc::UnboundedReceiver<Value>
where
    F: FnMut(&Value) -> Vec<Value> + Send + 'static,
{
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let request: Value = serde_json::from_str(&line).unwrap();
            for reply in respond(&request) {
                let mut out = serde_json::to_string(&reply).unwrap();
                out.push_str("\r\n");
                writer.write_all(out.as_bytes()).await.unwrap();
            }
            let _ = seen_tx.send(request);
        }
    });
    seen_rx
}

fn tag_of(request: &Value) -> Value {
    request["Header"]["ClientTag"].clone()
}

fn reply(request: &Value, status: &str, body: Value) -> Value {
    json!({
        "CommuniqueType": "ReadResponse",
        "Header": {
            "ClientTag": tag_of(request),
            "StatusCode": status,
            "Url": request["Header"]["Url"].clone()
        },
        "Body": body
    })
}

// ── Request/response tests ──────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_matches_client_tag() {
    let (mut client, bridge) = client_pair();
    let mut seen = spawn_bridge(bridge, |req| {
        vec![reply(
            req,
            "200 OK",
            json!({
                "Devices": [
                    {
                        "href": "/device/1",
                        "Name": "Smart Bridge",
                        "DeviceType": "SmartBridge"
                    },
                    {
                        "href": "/device/3",
                        "Name": "Lamp",
                        "FullyQualifiedName": ["Den", "Lamp"],
                        "DeviceType": "PlugInDimmer",
                        "LocalZones": [{ "href": "/zone/2" }]
                    }
                ]
            }),
        )]
    });

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].id(), Some("3"));
    assert_eq!(devices[1].zone_id(), Some("2"));

    let request = seen.recv().await.unwrap();
    assert_eq!(request["CommuniqueType"], "ReadRequest");
    assert_eq!(request["Header"]["Url"], "/device");
    assert!(request["Header"]["ClientTag"].is_string());
}

#[tokio::test]
async fn test_unsolicited_messages_are_skipped() {
    let (mut client, bridge) = client_pair();
    let _seen = spawn_bridge(bridge, |req| {
        vec![
            json!({
                "CommuniqueType": "ReadResponse",
                "Header": { "Url": "/zone/7/status", "StatusCode": "200 OK" },
                "Body": { "ZoneStatus": { "Level": 10, "Zone": { "href": "/zone/7" } } }
            }),
            reply(req, "200 OK", json!({ "PingResponse": { "LEAPVersion": 1.115 } })),
        ]
    });

    assert_eq!(client.ping().await.unwrap(), "1.115");
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (mut client, bridge) = client_pair();
    let _seen = spawn_bridge(bridge, |req| vec![reply(req, "404 NotFound", Value::Null)]);

    let result = client.zone_status("99").await;
    assert!(
        matches!(result, Err(Error::Status { ref status, .. }) if status == "404 NotFound"),
        "expected Status error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_commands_carry_level_and_fan_speed() {
    let (mut client, bridge) = client_pair();
    let mut seen = spawn_bridge(bridge, |req| vec![reply(req, "201 Created", Value::Null)]);

    client.go_to_level("4", 35).await.unwrap();
    client.go_to_fan_speed("5", FanSpeed::MediumHigh).await.unwrap();

    let level = seen.recv().await.unwrap();
    assert_eq!(level["CommuniqueType"], "CreateRequest");
    assert_eq!(level["Header"]["Url"], "/zone/4/commandprocessor");
    assert_eq!(level["Body"]["Command"]["Parameter"][0]["Value"], 35);

    let fan = seen.recv().await.unwrap();
    assert_eq!(fan["Header"]["Url"], "/zone/5/commandprocessor");
    assert_eq!(
        fan["Body"]["Command"]["FanSpeedParameters"]["FanSpeed"],
        "MediumHigh"
    );
}

#[tokio::test(start_paused = true)]
async fn test_silent_bridge_times_out() {
    let (mut client, _bridge) = client_pair();

    let result = client.list_devices().await;
    assert!(
        matches!(result, Err(Error::Timeout { timeout_secs: 5 })),
        "expected Timeout error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_closed_stream_is_connection_loss() {
    let (mut client, bridge) = client_pair();
    drop(bridge);

    let err = client.recv().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
    assert!(err.is_connection_loss());
}

// ── Pairing exchange ────────────────────────────────────────────────

#[tokio::test]
async fn test_pairing_exchange_waits_for_physical_access() {
    let (mut client, mut bridge) = client_pair();

    // Button already pressed: the bridge announces it before any request.
    let announce = [
        json!({
            "Header": { "ContentType": "status;plurality=single", "StatusCode": "200 OK" },
            "Body": { "Status": { "Permissions": ["Public"] } }
        }),
        json!({
            "Header": { "ContentType": "status;plurality=single", "StatusCode": "200 OK" },
            "Body": { "Status": { "Permissions": ["Public", "PhysicalAccess"] } }
        }),
    ];
    for message in announce {
        let line = format!("{message}\r\n");
        bridge.write_all(line.as_bytes()).await.unwrap();
    }

    let mut seen = spawn_bridge(bridge, |req| {
        vec![json!({
            "Header": {
                "ClientTag": tag_of(req),
                "ContentType": "signing-result;plurality=single",
                "StatusCode": "200 OK"
            },
            "Body": {
                "SigningResult": {
                    "Certificate": "-----BEGIN CERTIFICATE-----\nclient\n-----END CERTIFICATE-----\n",
                    "RootCertificate": "-----BEGIN CERTIFICATE-----\nroot\n-----END CERTIFICATE-----\n"
                }
            }
        })]
    });

    pairing::await_physical_access(&mut client).await.unwrap();
    let signed = pairing::exchange_csr(&mut client, "CSR-PEM", "caseta-test")
        .await
        .unwrap();
    assert!(signed.certificate.contains("client"));
    assert!(signed.root_certificate.contains("root"));

    let request = seen.recv().await.unwrap();
    assert_eq!(request["Header"]["RequestType"], "Execute");
    assert_eq!(request["Header"]["Url"], "/pair");
    assert_eq!(request["Header"]["ClientTag"], "get-cert");
    assert_eq!(request["Body"]["CommandType"], "CSR");
    assert_eq!(request["Body"]["Parameters"]["CSR"], "CSR-PEM");
    assert_eq!(request["Body"]["Parameters"]["Role"], "Admin");
}

#[tokio::test]
async fn test_pairing_rejection_is_reported() {
    let (mut client, bridge) = client_pair();
    let _seen = spawn_bridge(bridge, |req| {
        vec![json!({
            "Header": {
                "ClientTag": tag_of(req),
                "ContentType": "exception;plurality=single",
                "StatusCode": "401 Unauthorized"
            }
        })]
    });

    let result = pairing::exchange_csr(&mut client, "CSR-PEM", "caseta-test").await;
    assert!(
        matches!(result, Err(Error::PairingRejected(ref s)) if s == "401 Unauthorized"),
        "expected PairingRejected, got: {result:?}"
    );
}
