use std::io::Write;

use async_trait::async_trait;
use cadence_core::alert::{AlertDispatcher, Permission};
use tracing::{debug, warn};

/// Reminder delivery on the controlling terminal. Notifications go to stdout
/// with a bell for sound; in-app messages go to stderr.
#[derive(Debug, Clone, Copy)]
pub struct TerminalDispatcher {
    desktop_notifications: bool,
}

impl TerminalDispatcher {
    pub fn new(desktop_notifications: bool) -> Self {
        Self {
            desktop_notifications,
        }
    }
}

#[async_trait]
impl AlertDispatcher for TerminalDispatcher {
    fn name(&self) -> &'static str {
        "terminal"
    }

    async fn request_permission(&self) -> Permission {
        if self.desktop_notifications {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn notify(&self, title: &str, body: &str) {
        println!("[{title}] {body}");
    }

    async fn play_sound(&self, clip: &str) {
        debug!(clip, "ringing terminal bell");
        let mut stdout = std::io::stdout();
        if let Err(err) = stdout.write_all(b"\x07").and_then(|()| stdout.flush()) {
            warn!(error = %err, "could not ring terminal bell");
        }
    }

    async fn show_message(&self, title: &str, body: &str) {
        eprintln!("{title}: {body}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permission_follows_config() {
        assert_eq!(
            TerminalDispatcher::new(true).request_permission().await,
            Permission::Granted
        );
        assert_eq!(
            TerminalDispatcher::new(false).request_permission().await,
            Permission::Denied
        );
    }
}
