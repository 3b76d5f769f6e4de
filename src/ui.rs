use crate::mode::parse_mode;
use crate::models::{AppEvent, MessageSeverity, Screen, StatusMessage};
use crate::session::{DeviceSession, SessionCommand};
use crate::settings::Settings;
use eframe::egui;
use tokio::sync::mpsc;
use tracing::error;

pub struct ModeLinkApp {
    // Session worker
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<AppEvent>,

    // UI state
    screen: Screen,
    status_message: Option<StatusMessage>,
    mode_input: String,
    alert: Option<String>,
    was_minimized: bool,
}

/// What a "Set Mode" click turns into: either a session command or a modal
/// alert, never both.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ModeAction {
    Send(u8),
    Alert(String),
}

pub(crate) fn mode_action(input: &str) -> ModeAction {
    match parse_mode(input) {
        Ok(value) => ModeAction::Send(value),
        Err(e) => ModeAction::Alert(e.to_string()),
    }
}

impl ModeLinkApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let watcher_tx = cmd_tx.clone();
        let link = settings.link.clone();

        // The session owns the platform handles, keep it on a dedicated thread
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create tokio runtime for the session worker");

            rt.block_on(async move {
                let mut session = match DeviceSession::new(event_tx.clone(), watcher_tx).await {
                    Ok(session) => session,
                    Err(e) => {
                        error!("Bluetooth unavailable: {e:#}");
                        let _ = event_tx.send(AppEvent::Status(StatusMessage {
                            message: format!("Bluetooth unavailable: {e}"),
                            severity: MessageSeverity::Error,
                        }));
                        return;
                    }
                };
                session.update_visibility().await;

                while let Some(cmd) = cmd_rx.recv().await {
                    match cmd {
                        SessionCommand::Connect => session.connect(&link).await,
                        SessionCommand::Disconnect => session.disconnect().await,
                        SessionCommand::SetMode(value) => session.set_mode(value).await,
                        SessionCommand::LinkLost => session.link_lost().await,
                        SessionCommand::SafeDisconnect => session.safe_disconnect().await,
                        SessionCommand::Shutdown => {
                            session.safe_disconnect().await;
                            break;
                        }
                    }
                }
            });
        });

        Self {
            commands: cmd_tx,
            events: event_rx,
            screen: Screen::Connect,
            status_message: None,
            mode_input: String::new(),
            alert: None,
            was_minimized: false,
        }
    }

    fn render_connect_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("ModeLink");
        ui.separator();

        ui.label("Not connected");
        ui.add_space(10.0);

        if ui.button("Connect").clicked() {
            let _ = self.commands.send(SessionCommand::Connect);
        }

        self.render_status(ui);
    }

    fn render_control_screen(&mut self, ui: &mut egui::Ui) {
        ui.heading("ModeLink");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Mode (0-255):");
            ui.text_edit_singleline(&mut self.mode_input);
        });

        ui.horizontal(|ui| {
            if ui.button("Set Mode").clicked() {
                match mode_action(&self.mode_input) {
                    ModeAction::Send(value) => {
                        let _ = self.commands.send(SessionCommand::SetMode(value));
                    }
                    ModeAction::Alert(message) => self.alert = Some(message),
                }
            }

            if ui.button("Disconnect").clicked() {
                let _ = self.commands.send(SessionCommand::Disconnect);
            }
        });

        self.render_status(ui);
    }

    fn render_status(&self, ui: &mut egui::Ui) {
        if let Some(msg) = &self.status_message {
            ui.add_space(10.0);
            let color = match msg.severity {
                MessageSeverity::Info => egui::Color32::LIGHT_BLUE,
                MessageSeverity::Success => egui::Color32::GREEN,
                MessageSeverity::Warning => egui::Color32::YELLOW,
                MessageSeverity::Error => egui::Color32::RED,
            };
            ui.colored_label(color, &msg.message);
        }
    }

    fn render_alert(&mut self, ctx: &egui::Context) {
        if let Some(message) = self.alert.clone() {
            egui::Window::new("Invalid mode value")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        self.alert = None;
                    }
                });
        }
    }
}

impl eframe::App for ModeLinkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AppEvent::Screen(screen) => self.screen = screen,
                AppEvent::Status(msg) => self.status_message = Some(msg),
            }
        }

        // Minimizing is the desktop analogue of a hidden tab
        let minimized = ctx.input(|i| i.viewport().minimized.unwrap_or(false));
        if minimized && !self.was_minimized {
            let _ = self.commands.send(SessionCommand::SafeDisconnect);
        }
        self.was_minimized = minimized;

        ctx.request_repaint();

        egui::CentralPanel::default().show(ctx, |ui| match self.screen {
            Screen::Connect => self.render_connect_screen(ui),
            Screen::Control => self.render_control_screen(ui),
        });

        self.render_alert(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_becomes_a_command() {
        assert_eq!(mode_action("7"), ModeAction::Send(7));
        assert_eq!(mode_action("0"), ModeAction::Send(0));
        assert_eq!(mode_action("255"), ModeAction::Send(255));
    }

    #[test]
    fn invalid_input_becomes_an_alert() {
        for input in ["-1", "256", "abc", ""] {
            assert!(
                matches!(mode_action(input), ModeAction::Alert(_)),
                "expected alert for {input:?}"
            );
        }
    }
}
