/// PlayerCore: single-owner event loop for playback.
///
/// Views never touch the audio sink or write session state directly; they
/// send `PlayerCommand`s through a [`PlayerHandle`]. Sink status arrives as
/// `MediaEvent`s on the same channel, so every mutation is serialised here.
/// After each change the core publishes `BroadcastMessage::SessionUpdated`.
use std::time::Duration;

use airwave_proto::model::RadioStation;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioSink, MediaEvent};
use crate::notify::Notifier;
use crate::session::{sanitize_volume, PlaybackStatus, SessionManager};
use crate::sleep_timer::SleepTimer;
use crate::BroadcastMessage;

#[cfg(test)]
mod tests;

pub const PLAY_FAILED: &str = "Failed to play station. Please try again.";
pub const STREAM_FAILED: &str = "Error streaming this station. Please try again later.";
pub const SLEEP_ENDED: &str = "Sleep timer ended. Playback stopped.";

const HEARTBEAT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum PlayerEvent {
    Command(PlayerCommand),
    Media(MediaEvent),
    SleepTick,
    /// Liveness and connect-timeout check.
    HeartbeatTick,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// Play `station`; toggles when it is already the current one.
    SetStation(RadioStation),
    TogglePlay,
    SetVolume(f32),
    ToggleMute,
    Stop,
    StartSleepTimer(u32),
    CancelSleepTimer,
}

/// Cloneable front door to the core.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerEvent>,
}

impl PlayerHandle {
    pub fn new(tx: mpsc::Sender<PlayerEvent>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, cmd: PlayerCommand) {
        if self.tx.send(PlayerEvent::Command(cmd)).await.is_err() {
            warn!("PlayerHandle: core is gone");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(PlayerEvent::Shutdown).await;
    }
}

pub struct PlayerCore {
    session: SessionManager,
    sink: Box<dyn AudioSink>,
    notifier: Notifier,
    sleep: SleepTimer,
    /// Loops our own timer ticks back into the event channel.
    event_tx: mpsc::Sender<PlayerEvent>,
    connect_timeout: Duration,
    connecting_since: Option<Instant>,
}

impl PlayerCore {
    pub fn new(
        session: SessionManager,
        sink: Box<dyn AudioSink>,
        notifier: Notifier,
        event_tx: mpsc::Sender<PlayerEvent>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            session,
            sink,
            notifier,
            sleep: SleepTimer::default(),
            event_tx,
            connect_timeout,
            connecting_since: None,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn run(mut self, mut event_rx: mpsc::Receiver<PlayerEvent>) {
        info!("PlayerCore: starting event loop");

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEARTBEAT).await;
                if heartbeat_tx.send(PlayerEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        while let Some(event) = event_rx.recv().await {
            if !self.handle_event(event).await {
                info!("PlayerCore: shutdown requested");
                break;
            }
        }

        self.cleanup().await;
    }

    /// Returns false once the loop should stop.
    pub async fn handle_event(&mut self, event: PlayerEvent) -> bool {
        match event {
            PlayerEvent::Shutdown => return false,
            PlayerEvent::Command(cmd) => {
                info!("PlayerCore: command {:?}", cmd);
                if let Err(e) = self.handle_command(cmd).await {
                    error!("PlayerCore: command error: {}", e);
                }
            }
            PlayerEvent::Media(media) => self.handle_media(media).await,
            PlayerEvent::SleepTick => self.on_sleep_tick().await,
            PlayerEvent::HeartbeatTick => self.on_heartbeat().await,
        }
        true
    }

    async fn handle_command(&mut self, cmd: PlayerCommand) -> anyhow::Result<()> {
        match cmd {
            PlayerCommand::SetStation(station) => self.set_station(station).await,
            PlayerCommand::TogglePlay => self.toggle_play().await,
            PlayerCommand::SetVolume(v) => self.set_volume(v).await,
            PlayerCommand::ToggleMute => self.toggle_mute().await,
            PlayerCommand::Stop => self.stop().await,
            PlayerCommand::StartSleepTimer(minutes) => {
                self.start_sleep_timer(minutes).await;
                Ok(())
            }
            PlayerCommand::CancelSleepTimer => {
                self.cancel_sleep_timer().await;
                Ok(())
            }
        }
    }

    // ── commands ──────────────────────────────────────────────────────────────

    async fn set_station(&mut self, station: RadioStation) -> anyhow::Result<()> {
        let current = self.session.get().await;
        if current.is_current(&station.id) {
            return self.toggle_play().await;
        }

        info!("PlayerCore: switching to {:?}", station.name);
        if let Err(e) = self.session.set_station(station.clone()).await {
            warn!("PlayerCore: failed to persist session: {}", e);
        }
        self.connecting_since = Some(Instant::now());
        self.changed();

        if let Err(e) = self.sink.load(&station.stream_url, current.volume).await {
            error!("PlayerCore: load {} failed: {}", station.stream_url, e);
            self.connecting_since = None;
            self.session
                .update(|s| {
                    s.intend_playing = false;
                    s.buffering = false;
                    s.status = PlaybackStatus::Error;
                })
                .await;
            self.notifier.error(PLAY_FAILED);
            self.changed();
        }
        Ok(())
    }

    async fn toggle_play(&mut self) -> anyhow::Result<()> {
        let s = self.session.get().await;
        let Some(station) = s.station.clone() else {
            debug!("PlayerCore: toggle without a station");
            return Ok(());
        };

        if s.intend_playing {
            self.connecting_since = None;
            self.session
                .update(|s| {
                    s.intend_playing = false;
                    s.buffering = false;
                    s.status = PlaybackStatus::Paused;
                })
                .await;
            self.changed();
            self.sink.pause().await?;
            return Ok(());
        }

        self.connecting_since = Some(Instant::now());
        self.session
            .update(|s| {
                s.intend_playing = true;
                s.buffering = true;
                s.status = PlaybackStatus::Connecting;
            })
            .await;
        self.changed();

        // After an error or end of stream there is nothing to unpause.
        let result = match s.status {
            PlaybackStatus::Error | PlaybackStatus::Idle => {
                self.sink.load(&station.stream_url, s.volume).await
            }
            _ => self.sink.play().await,
        };
        if let Err(e) = result {
            warn!("PlayerCore: play failed: {}", e);
            self.connecting_since = None;
            self.session
                .update(|s| {
                    s.intend_playing = false;
                    s.buffering = false;
                    s.status = PlaybackStatus::Paused;
                })
                .await;
            self.notifier.error(PLAY_FAILED);
            self.changed();
        }
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        let Some(volume) = sanitize_volume(volume) else {
            warn!("PlayerCore: ignoring NaN volume");
            return Ok(());
        };
        let stored = match self.session.set_volume(volume).await {
            Ok(v) => v,
            Err(e) => {
                warn!("PlayerCore: failed to persist volume: {}", e);
                volume
            }
        };
        self.changed();
        self.sink.set_volume(stored).await
    }

    async fn toggle_mute(&mut self) -> anyhow::Result<()> {
        let volume = self.session.get().await.volume;
        let target = if volume == 0.0 { 0.5 } else { 0.0 };
        self.set_volume(target).await
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.connecting_since = None;
        if let Err(e) = self.session.set_stopped().await {
            warn!("PlayerCore: failed to persist session: {}", e);
        }
        self.changed();
        self.sink.pause().await?;
        self.sink.stop().await
    }

    async fn start_sleep_timer(&mut self, minutes: u32) {
        match self.sleep.start(minutes, self.event_tx.clone()) {
            Ok(total) => {
                self.session.set_sleep_remaining(Some(total)).await;
                self.notifier
                    .info(format!("Sleep timer set: playback stops in {minutes} minutes"));
                self.changed();
            }
            Err(e) => {
                warn!("PlayerCore: sleep timer rejected: {}", e);
                self.notifier.warning(e.to_string());
            }
        }
    }

    async fn cancel_sleep_timer(&mut self) {
        if self.sleep.cancel() {
            self.session.set_sleep_remaining(None).await;
            self.notifier.info("Sleep timer cancelled");
            self.changed();
        }
    }

    // ── timers ────────────────────────────────────────────────────────────────

    async fn on_sleep_tick(&mut self) {
        let Some(remaining) = self.sleep.remaining(Instant::now()) else {
            return;
        };
        if remaining > 0 {
            self.session.set_sleep_remaining(Some(remaining)).await;
            self.changed();
            return;
        }

        info!("PlayerCore: sleep timer elapsed");
        self.sleep.cancel();
        let s = self
            .session
            .update(|s| {
                s.sleep_remaining = None;
                if s.intend_playing {
                    s.intend_playing = false;
                    s.buffering = false;
                    s.status = PlaybackStatus::Paused;
                }
            })
            .await;
        self.connecting_since = None;
        if s.station.is_some() {
            if let Err(e) = self.sink.pause().await {
                warn!("PlayerCore: pause on sleep failed: {}", e);
            }
        }
        self.notifier.info(SLEEP_ENDED);
        self.changed();
    }

    async fn on_heartbeat(&mut self) {
        let s = self.session.get().await;
        let Some(station) = s.station.as_ref() else {
            return;
        };
        if !s.intend_playing {
            return;
        }

        if !self.sink.is_alive() {
            warn!("PlayerCore: heartbeat: audio engine gone, reloading stream");
            self.connecting_since = Some(Instant::now());
            if let Err(e) = self.sink.load(&station.stream_url, s.volume).await {
                error!("PlayerCore: reload failed: {}", e);
                self.fail_stream().await;
            }
            return;
        }

        if s.status == PlaybackStatus::Connecting {
            if let Some(since) = self.connecting_since {
                let elapsed = since.elapsed();
                debug!("PlayerCore: still connecting after {}s", elapsed.as_secs());
                if elapsed >= self.connect_timeout {
                    warn!("PlayerCore: no audio after {}s, giving up", elapsed.as_secs());
                    self.fail_stream().await;
                }
            }
        }
    }

    // ── sink events ───────────────────────────────────────────────────────────

    async fn handle_media(&mut self, media: MediaEvent) {
        let s = self.session.get().await;
        if s.station.is_none() {
            debug!("PlayerCore: media event without station: {:?}", media);
            return;
        }

        match media {
            MediaEvent::Playing => {
                if !s.intend_playing {
                    return;
                }
                self.connecting_since = None;
                self.set_status(PlaybackStatus::Playing, false).await;
            }
            MediaEvent::Paused => {
                self.connecting_since = None;
                self.set_status(PlaybackStatus::Paused, false).await;
            }
            MediaEvent::Waiting => {
                if !s.intend_playing {
                    return;
                }
                self.connecting_since.get_or_insert_with(Instant::now);
                self.set_status(PlaybackStatus::Connecting, true).await;
            }
            MediaEvent::TimeUpdate { pos, duration } => {
                self.session.set_timeline(pos, duration).await;
                self.changed();
            }
            MediaEvent::Error(detail) => {
                warn!("PlayerCore: stream error: {}", detail);
                self.fail_stream().await;
            }
            MediaEvent::Ended => {
                info!("PlayerCore: stream ended");
                self.connecting_since = None;
                self.session
                    .update(|s| {
                        s.intend_playing = false;
                        s.buffering = false;
                        s.status = PlaybackStatus::Idle;
                    })
                    .await;
                self.changed();
            }
        }
    }

    async fn set_status(&mut self, status: PlaybackStatus, buffering: bool) {
        let before = self.session.get().await;
        if before.status == status && before.buffering == buffering {
            return;
        }
        info!("PlayerCore: status {:?} → {:?}", before.status, status);
        self.session.set_status(status, buffering).await;
        self.changed();
    }

    async fn fail_stream(&mut self) {
        self.connecting_since = None;
        self.session
            .update(|s| {
                s.intend_playing = false;
                s.buffering = false;
                s.status = PlaybackStatus::Error;
            })
            .await;
        self.notifier.error(STREAM_FAILED);
        self.changed();
    }

    fn changed(&self) {
        self.notifier.send(BroadcastMessage::SessionUpdated);
    }

    async fn cleanup(&mut self) {
        self.sleep.cancel();
        self.sink.shutdown().await;
    }
}
