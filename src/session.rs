use crate::mode::{send_mode, CharacteristicSink};
use crate::models::{AppEvent, MessageSeverity, Screen, StatusMessage};
use crate::settings::LinkSettings;
use anyhow::{anyhow, Context, Result};
use bluest::{Adapter, Characteristic, ConnectionEvent, Device, Uuid};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Commands processed by the session worker. `LinkLost` is injected by the
/// disconnect watcher rather than the UI.
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    Connect,
    Disconnect,
    SetMode(u8),
    LinkLost,
    SafeDisconnect,
    Shutdown,
}

/// The two transient handles owned by one connection session.
///
/// The API keeps the invariant that a characteristic is never held without
/// its device: both are stored together, and every clearing path drops the
/// characteristic first.
#[derive(Debug)]
pub struct Handles<D, C> {
    device: Option<D>,
    characteristic: Option<C>,
}

impl<D, C> Handles<D, C> {
    pub fn new() -> Self {
        Self {
            device: None,
            characteristic: None,
        }
    }

    /// Stores both handles at once, replacing any previous session.
    pub fn populate(&mut self, device: D, characteristic: C) {
        self.device = Some(device);
        self.characteristic = Some(characteristic);
    }

    /// Drops the characteristic but keeps the device, used mid-teardown.
    pub fn drop_characteristic(&mut self) {
        self.characteristic = None;
    }

    /// Clears both handles, yielding the device for transport teardown.
    /// Idempotent.
    pub fn clear(&mut self) -> Option<D> {
        self.characteristic = None;
        self.device.take()
    }

    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    pub fn characteristic(&self) -> Option<&C> {
        self.characteristic.as_ref()
    }
}

impl<D, C> Default for Handles<D, C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the single connection session to the peripheral and the watcher
/// task observing remote disconnects.
pub struct DeviceSession {
    adapter: Adapter,
    handles: Handles<Device, Characteristic>,
    events: mpsc::UnboundedSender<AppEvent>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    watcher: Option<JoinHandle<()>>,
    connecting: bool,
}

impl DeviceSession {
    pub async fn new(
        events: mpsc::UnboundedSender<AppEvent>,
        commands: mpsc::UnboundedSender<SessionCommand>,
    ) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("no Bluetooth adapter found"))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available");

        Ok(Self {
            adapter,
            handles: Handles::new(),
            events,
            commands,
            watcher: None,
            connecting: false,
        })
    }

    /// Establishes the session: filtered discovery, transport connect,
    /// service and characteristic resolution. Any failure leaves both
    /// handles absent and the connect screen visible.
    pub async fn connect(&mut self, link: &LinkSettings) {
        if self.connecting {
            warn!("connect requested while another attempt is in flight, ignoring");
            return;
        }
        self.connecting = true;
        if let Err(e) = self.try_connect(link).await {
            error!("connection failed: {e:#}");
            self.teardown_watcher();
            if let Some(device) = self.handles.clear() {
                let _ = self.adapter.disconnect_device(&device).await;
            }
            self.status(MessageSeverity::Error, format!("Connection failed: {e}"));
        }
        self.connecting = false;
        self.update_visibility().await;
    }

    async fn try_connect(&mut self, link: &LinkSettings) -> Result<()> {
        let service_uuid = link.service_uuid()?;
        let characteristic_uuid = link.mode_characteristic_uuid()?;

        let device = self.pick_device(service_uuid, link.scan_timeout()).await?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("connecting to {name}");

        if !device.is_connected().await {
            self.adapter
                .connect_device(&device)
                .await
                .context("transport connect failed")?;
        }

        self.spawn_link_watcher(&device);

        let characteristic = match Self::resolve_mode_characteristic(
            &device,
            service_uuid,
            characteristic_uuid,
        )
        .await
        {
            Ok(characteristic) => characteristic,
            Err(e) => {
                // Do not leave a dangling link behind a failed resolution
                self.teardown_watcher();
                let _ = self.adapter.disconnect_device(&device).await;
                return Err(e);
            }
        };

        self.handles.populate(device, characteristic);
        info!("connected to {name}");
        self.status(MessageSeverity::Success, format!("Connected to {name}"));
        Ok(())
    }

    async fn resolve_mode_characteristic(
        device: &Device,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Characteristic> {
        let services = device.services().await.context("service discovery failed")?;
        let service = services
            .iter()
            .find(|s| s.uuid() == service_uuid)
            .ok_or_else(|| anyhow!("service {service_uuid} not found"))?
            .clone();

        service
            .characteristics()
            .await
            .context("characteristic discovery failed")?
            .into_iter()
            .find(|c| c.uuid() == characteristic_uuid)
            .ok_or_else(|| anyhow!("characteristic {characteristic_uuid} not found"))
    }

    /// The discovery analogue of a platform picker: first device advertising
    /// the service UUID wins, bounded by the configured timeout.
    async fn pick_device(&self, service_uuid: Uuid, timeout: Duration) -> Result<Device> {
        info!("scanning for a device advertising {service_uuid}");
        let services = [service_uuid];
        let discovery = self
            .adapter
            .discover_devices(&services)
            .await
            .context("discovery failed")?;
        futures_util::pin_mut!(discovery);

        match tokio::time::timeout(timeout, discovery.next()).await {
            Ok(Some(Ok(device))) => Ok(device),
            Ok(Some(Err(e))) => Err(e).context("discovery failed"),
            Ok(None) => Err(anyhow!("discovery ended without a matching device")),
            Err(_) => Err(anyhow!(
                "no matching device found within {}s",
                timeout.as_secs()
            )),
        }
    }

    /// Watches the transport link and reports remote disconnects back into
    /// the command loop.
    fn spawn_link_watcher(&mut self, device: &Device) {
        self.teardown_watcher();
        let adapter = self.adapter.clone();
        let device = device.clone();
        let commands = self.commands.clone();

        self.watcher = Some(tokio::spawn(async move {
            let events = match adapter.device_connection_events(&device).await {
                Ok(events) => events,
                Err(e) => {
                    warn!("could not watch connection events: {e:#}");
                    return;
                }
            };
            futures_util::pin_mut!(events);
            while let Some(event) = events.next().await {
                if matches!(event, ConnectionEvent::Disconnected) {
                    info!("peripheral reported disconnect");
                    let _ = commands.send(SessionCommand::LinkLost);
                }
            }
        }));
    }

    fn teardown_watcher(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }

    /// Manual disconnect. Safe to call when already disconnected.
    pub async fn disconnect(&mut self) {
        self.teardown_watcher();
        if let Some(device) = self.handles.clear() {
            if device.is_connected().await {
                match self.adapter.disconnect_device(&device).await {
                    Ok(()) => info!("disconnected manually"),
                    Err(e) => warn!("disconnect failed: {e:#}"),
                }
            }
        }
        self.update_visibility().await;
    }

    /// Remote/unexpected disconnect path, driven by the watcher task.
    pub async fn link_lost(&mut self) {
        self.teardown_watcher();
        self.handles.clear();
        self.status(MessageSeverity::Warning, "Device disconnected");
        self.update_visibility().await;
    }

    /// Writes the mode byte if the session is live; logs and drops the
    /// request otherwise.
    pub async fn set_mode(&self, value: u8) {
        let sink = self
            .handles
            .characteristic()
            .map(|c| CharacteristicSink::new(c.clone()));
        send_mode(sink.as_ref(), value).await;
    }

    /// Best-effort teardown for exit and minimize. Never fails loudly, the
    /// app may be on its way out.
    pub async fn safe_disconnect(&mut self) {
        self.teardown_watcher();
        if let Some(device) = self.handles.clear() {
            if device.is_connected().await {
                info!("disconnecting device before teardown");
                if let Err(e) = self.adapter.disconnect_device(&device).await {
                    warn!("teardown disconnect failed: {e:#}");
                }
            }
        }
        self.update_visibility().await;
    }

    /// Recomputes which screen should be visible and pushes it to the UI.
    pub async fn update_visibility(&self) {
        let link_connected = match self.handles.device() {
            Some(device) => device.is_connected().await,
            None => false,
        };
        let screen = Screen::from_state(
            self.handles.device().is_some(),
            link_connected,
            self.handles.characteristic().is_some(),
        );
        let _ = self.events.send(AppEvent::Screen(screen));
    }

    fn status(&self, severity: MessageSeverity, message: impl Into<String>) {
        let _ = self.events.send(AppEvent::Status(StatusMessage {
            message: message.into(),
            severity,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characteristic_implies_device(handles: &Handles<u8, u8>) -> bool {
        handles.characteristic().is_none() || handles.device().is_some()
    }

    #[test]
    fn handles_start_empty() {
        let handles: Handles<u8, u8> = Handles::new();
        assert!(handles.device().is_none());
        assert!(handles.characteristic().is_none());
    }

    #[test]
    fn populate_stores_both_handles_together() {
        let mut handles = Handles::new();
        handles.populate(1u8, 2u8);
        assert_eq!(handles.device(), Some(&1));
        assert_eq!(handles.characteristic(), Some(&2));
        assert!(characteristic_implies_device(&handles));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut handles = Handles::new();
        handles.populate(1u8, 2u8);
        assert_eq!(handles.clear(), Some(1));
        assert_eq!(handles.clear(), None);
        assert!(handles.characteristic().is_none());
    }

    #[test]
    fn invariant_holds_across_operation_sequences() {
        let mut handles = Handles::new();
        assert!(characteristic_implies_device(&handles));

        handles.populate(1u8, 2u8);
        assert!(characteristic_implies_device(&handles));

        handles.drop_characteristic();
        assert!(characteristic_implies_device(&handles));
        assert!(handles.device().is_some());

        handles.populate(3u8, 4u8);
        handles.clear();
        assert!(characteristic_implies_device(&handles));
        assert!(handles.device().is_none());
    }

    #[test]
    fn remote_disconnect_drops_characteristic_and_shows_connect_screen() {
        let mut handles = Handles::new();
        handles.populate(1u8, 2u8);

        // What link_lost does to the handles.
        handles.clear();

        let screen = Screen::from_state(
            handles.device().is_some(),
            false,
            handles.characteristic().is_some(),
        );
        assert_eq!(screen, Screen::Connect);
    }
}
