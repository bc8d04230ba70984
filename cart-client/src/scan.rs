use anyhow::{Context, Result, bail};
use cart_shared::scan::{
    EVENT_SCAN, EVENT_SCAN_DONE, EVENT_SCAN_DONE_KO, EVENT_SCAN_STOP, EVENT_SCANNING_FIRMWARE,
    EVENT_SCANNING_PLATFORM, EVENT_SCANNING_ROM, ScanRequest, ScanStats, ScanType, SocketMessage,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::config::Config;

/// `cart scan`: submits a scan over the socket and streams progress until
/// the server reports done.
pub async fn scan(
    scan_type: ScanType,
    platforms: Vec<String>,
    apis: Vec<String>,
) -> Result<()> {
    let (mut socket, _) = connect().await?;

    let request = ScanRequest {
        platforms,
        scan_type,
        roms: Vec::new(),
        apis,
    };
    let envelope = SocketMessage::new(EVENT_SCAN, request);
    socket
        .send(Message::Text(serde_json::to_string(&envelope)?.into()))
        .await
        .context("Failed to submit scan")?;
    println!("Scan submitted ({})", scan_type.as_str());

    while let Some(message) = socket.next().await {
        let message = message.context("Socket closed unexpectedly")?;
        let Message::Text(raw) = message else {
            continue;
        };
        let Ok(event) = serde_json::from_str::<SocketMessage>(&raw) else {
            continue;
        };
        if let Some(line) = progress_line(&event) {
            println!("{}", line);
            continue;
        }
        match event.event.as_str() {
            EVENT_SCAN_DONE => {
                if let Ok(stats) = serde_json::from_value::<ScanStats>(event.data) {
                    println!(
                        "Scan done: {} platforms ({} new), {} roms ({} new, {} matched), {} firmware",
                        stats.scanned_platforms,
                        stats.added_platforms,
                        stats.scanned_roms,
                        stats.added_roms,
                        stats.metadata_roms,
                        stats.scanned_firmware,
                    );
                } else {
                    println!("Scan done");
                }
                return Ok(());
            }
            EVENT_SCAN_DONE_KO => {
                bail!("Scan failed: {}", event.data.as_str().unwrap_or("unknown error"));
            }
            _ => {}
        }
    }
    bail!("Socket closed before the scan finished")
}

/// One printable line per progress event. The server sends the full
/// platform/rom/firmware record as the payload, so the display name has
/// to be dug out of the object.
fn progress_line(event: &SocketMessage) -> Option<String> {
    match event.event.as_str() {
        EVENT_SCANNING_PLATFORM => Some(format!(
            "Scanning platform {}",
            event.data["name"].as_str().unwrap_or_default()
        )),
        EVENT_SCANNING_ROM => Some(format!(
            "  {}",
            event.data["rom"]["file_name"].as_str().unwrap_or_default()
        )),
        EVENT_SCANNING_FIRMWARE => Some(format!(
            "  {}",
            event.data["firmware"]["file_name"].as_str().unwrap_or_default()
        )),
        _ => None,
    }
}

/// `cart scan --stop`: cancels the running scan.
pub async fn stop() -> Result<()> {
    let (mut socket, _) = connect().await?;
    let envelope = SocketMessage::new(EVENT_SCAN_STOP, serde_json::Value::Null);
    socket
        .send(Message::Text(serde_json::to_string(&envelope)?.into()))
        .await
        .context("Failed to send stop")?;
    println!("Stop requested");
    Ok(())
}

async fn connect() -> Result<(
    tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    tokio_tungstenite::tungstenite::handshake::client::Response,
)> {
    let config = Config::load()?;
    let server = config.server_url()?;
    let token = config
        .access_token
        .as_deref()
        .context("Not logged in; run `cart login` first")?;

    let ws_url = if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{}/ws", rest.trim_end_matches('/'))
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{}/ws", rest.trim_end_matches('/'))
    } else {
        bail!("Server URL must start with http:// or https://");
    };

    let mut request = ws_url.into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", token)
            .parse()
            .context("Invalid token")?,
    );

    connect_async(request)
        .await
        .context("Could not open the scan socket")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platform_events_print_the_platform_name() {
        let event = SocketMessage::new(
            EVENT_SCANNING_PLATFORM,
            json!({"id": "65f0", "name": "Nintendo 64", "slug": "n64", "rom_count": 12}),
        );
        assert_eq!(
            progress_line(&event).as_deref(),
            Some("Scanning platform Nintendo 64")
        );
    }

    #[test]
    fn rom_and_firmware_events_print_the_file_name() {
        let rom = SocketMessage::new(
            EVENT_SCANNING_ROM,
            json!({
                "platform_name": "Nintendo 64",
                "platform_slug": "n64",
                "rom": {"file_name": "Super Mario 64 (USA).z64"},
            }),
        );
        assert_eq!(
            progress_line(&rom).as_deref(),
            Some("  Super Mario 64 (USA).z64")
        );

        let firmware = SocketMessage::new(
            EVENT_SCANNING_FIRMWARE,
            json!({
                "platform_name": "Game Boy Advance",
                "platform_slug": "gba",
                "firmware": {"file_name": "gba_bios.bin"},
            }),
        );
        assert_eq!(progress_line(&firmware).as_deref(), Some("  gba_bios.bin"));
    }

    #[test]
    fn terminal_events_have_no_progress_line() {
        assert!(progress_line(&SocketMessage::new(EVENT_SCAN_DONE, json!({}))).is_none());
        assert!(progress_line(&SocketMessage::new(EVENT_SCAN_DONE_KO, "boom")).is_none());
    }
}
