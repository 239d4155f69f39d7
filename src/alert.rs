//! Audible alarm for near-fall detections

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{error, info};

use crate::AlertConfig;

/// Class label that triggers the alarm (case-insensitive)
pub const ALERT_CLASS: &str = "person-near-fall";

pub fn is_alert_class(class_name: &str) -> bool {
    class_name.to_lowercase() == ALERT_CLASS
}

pub trait AlertSink: Send + Sync {
    /// Start playback and return immediately
    fn play(&self);
}

/// Plays a sound file through an external player process.
///
/// Every call spawns a new player, so back-to-back alerts overlap.
pub struct CommandAlert {
    player: String,
    sound_path: PathBuf,
}

impl CommandAlert {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            player: config.player.clone(),
            sound_path: config.sound_path.clone(),
        }
    }
}

impl AlertSink for CommandAlert {
    fn play(&self) {
        if !self.sound_path.exists() {
            error!("Alert sound not found: {}", self.sound_path.display());
            return;
        }

        let spawned = Command::new(&self.player)
            .arg(&self.sound_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                info!(pid = child.id(), "Playing alert");
                // Reap in the background so finished players don't linger as zombies
                std::thread::spawn(move || match child.wait() {
                    Ok(status) if status.success() => {}
                    Ok(status) => error!("Alert player exited with {}", status),
                    Err(e) => error!("Failed to wait for alert player: {}", e),
                });
            }
            Err(e) => error!("Failed to start {}: {}", self.player, e),
        }
    }
}
