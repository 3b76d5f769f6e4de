/// Events flowing from the session worker back to the UI thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Screen(Screen),
    Status(StatusMessage),
}

/// Which of the two panels is visible. Derived from session state, never
/// stored by the session itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Connect,
    Control,
}

impl Screen {
    /// The control panel is shown only while the full session is live:
    /// a device handle, an up transport link, and the mode characteristic.
    pub fn from_state(
        device_present: bool,
        link_connected: bool,
        characteristic_present: bool,
    ) -> Self {
        if device_present && link_connected && characteristic_present {
            Screen::Control
        } else {
            Screen::Connect
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_screen_requires_all_three_conditions() {
        for device in [false, true] {
            for link in [false, true] {
                for characteristic in [false, true] {
                    let expected = if device && link && characteristic {
                        Screen::Control
                    } else {
                        Screen::Connect
                    };
                    assert_eq!(
                        Screen::from_state(device, link, characteristic),
                        expected,
                        "device={device} link={link} characteristic={characteristic}"
                    );
                }
            }
        }
    }
}
