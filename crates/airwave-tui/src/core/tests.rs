use std::time::Duration;

use airwave_proto::model::RadioStation;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};

use super::*;
use crate::audio::testing::{RecordingSink, SinkCall};
use crate::notify::testing::{notices, notifier};
use crate::notify::Severity;

struct Harness {
    core: PlayerCore,
    sink: RecordingSink,
    events: mpsc::Receiver<PlayerEvent>,
    bus: broadcast::Receiver<BroadcastMessage>,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionManager::new(dir.path().join("session.json"), 0.8);
        let sink = RecordingSink::default();
        let (notifier, bus) = notifier();
        let (tx, events) = mpsc::channel(256);
        let core = PlayerCore::new(
            session,
            Box::new(sink.clone()),
            notifier,
            tx,
            Duration::from_secs(15),
        );
        Self {
            core,
            sink,
            events,
            bus,
            _dir: dir,
        }
    }

    async fn cmd(&mut self, cmd: PlayerCommand) {
        assert!(self.core.handle_event(PlayerEvent::Command(cmd)).await);
    }

    async fn media(&mut self, media: MediaEvent) {
        self.core.handle_event(PlayerEvent::Media(media)).await;
    }

    /// Feed queued timer ticks back into the core.
    async fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.core.handle_event(event).await;
        }
    }

    async fn state(&self) -> crate::session::SessionState {
        self.core.session().get().await
    }

    fn notices(&mut self) -> Vec<(Severity, String)> {
        notices(&mut self.bus)
    }
}

fn station(id: &str) -> RadioStation {
    RadioStation {
        id: id.into(),
        name: format!("Station {id}"),
        stream_url: format!("http://stream/{id}"),
        ..Default::default()
    }
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn selecting_a_station_loads_and_connects() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;

    let s = h.state().await;
    assert!(s.is_current("a"));
    assert!(s.intend_playing);
    assert!(s.buffering);
    assert_eq!(s.status, PlaybackStatus::Connecting);
    assert_eq!(h.sink.calls(), vec![SinkCall::Load("http://stream/a".into(), 0.8)]);

    h.media(MediaEvent::Playing).await;
    let s = h.state().await;
    assert_eq!(s.status, PlaybackStatus::Playing);
    assert!(!s.buffering);
}

#[tokio::test]
async fn switching_station_while_playing_resets_state() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.media(MediaEvent::Playing).await;
    h.media(MediaEvent::TimeUpdate {
        pos: Some(30.0),
        duration: None,
    })
    .await;

    h.cmd(PlayerCommand::SetStation(station("b"))).await;
    let s = h.state().await;
    assert!(s.is_current("b"));
    assert!(s.buffering);
    assert!(s.intend_playing);
    assert_eq!(s.status, PlaybackStatus::Connecting);
    assert_eq!(s.time_pos, None);
    assert_eq!(h.sink.last(), Some(SinkCall::Load("http://stream/b".into(), 0.8)));
}

#[tokio::test]
async fn selecting_current_station_toggles() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.media(MediaEvent::Playing).await;
    h.sink.clear();

    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    assert_eq!(h.sink.calls(), vec![SinkCall::Pause]);
    let s = h.state().await;
    assert!(!s.intend_playing);
    assert_eq!(s.status, PlaybackStatus::Paused);

    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    assert_eq!(h.sink.last(), Some(SinkCall::Play));
    assert!(h.state().await.intend_playing);
}

#[tokio::test]
async fn toggle_without_station_does_nothing() {
    let mut h = Harness::new();
    let rev = h.state().await.rev;
    h.cmd(PlayerCommand::TogglePlay).await;
    assert!(h.sink.calls().is_empty());
    assert_eq!(h.state().await.rev, rev);
}

#[tokio::test]
async fn failed_play_reverts_intent_and_reports() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.cmd(PlayerCommand::TogglePlay).await;
    h.media(MediaEvent::Paused).await;
    h.notices();

    *h.sink.fail_play.lock().unwrap() = true;
    h.cmd(PlayerCommand::TogglePlay).await;

    let s = h.state().await;
    assert!(!s.intend_playing);
    assert!(!s.buffering);
    assert_eq!(
        h.notices(),
        vec![(Severity::Error, PLAY_FAILED.to_string())]
    );
}

#[tokio::test]
async fn resuming_after_error_reloads_the_stream() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.media(MediaEvent::Error("connection refused".into())).await;

    let s = h.state().await;
    assert_eq!(s.status, PlaybackStatus::Error);
    assert!(!s.intend_playing);
    assert!(h
        .notices()
        .contains(&(Severity::Error, STREAM_FAILED.to_string())));

    h.sink.clear();
    h.cmd(PlayerCommand::TogglePlay).await;
    assert_eq!(h.sink.calls(), vec![SinkCall::Load("http://stream/a".into(), 0.8)]);
}

#[tokio::test]
async fn volume_is_clamped_and_nan_ignored() {
    let mut h = Harness::new();
    for v in [-3.0, 0.0, 0.42, 1.0, 7.5, f32::INFINITY, f32::NEG_INFINITY] {
        h.cmd(PlayerCommand::SetVolume(v)).await;
        let stored = h.state().await.volume;
        assert!((0.0..=1.0).contains(&stored), "{v} stored as {stored}");
    }
    h.cmd(PlayerCommand::SetVolume(0.3)).await;
    h.sink.clear();

    h.cmd(PlayerCommand::SetVolume(f32::NAN)).await;
    assert!((h.state().await.volume - 0.3).abs() < f32::EPSILON);
    assert!(h.sink.calls().is_empty());
}

#[tokio::test]
async fn mute_toggles_between_zero_and_half() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::ToggleMute).await;
    assert_eq!(h.state().await.volume, 0.0);
    h.cmd(PlayerCommand::ToggleMute).await;
    assert_eq!(h.state().await.volume, 0.5);
    assert_eq!(h.sink.last(), Some(SinkCall::Volume(0.5)));
}

#[tokio::test]
async fn stop_clears_the_station() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.cmd(PlayerCommand::Stop).await;
    let s = h.state().await;
    assert!(s.station.is_none());
    assert_eq!(s.status, PlaybackStatus::Idle);
    assert_eq!(h.sink.last(), Some(SinkCall::Stop));

    // late events from the old stream are ignored
    h.media(MediaEvent::Playing).await;
    assert_eq!(h.state().await.status, PlaybackStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn elapsed_sleep_timer_pauses_and_clears() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.media(MediaEvent::Playing).await;
    h.cmd(PlayerCommand::StartSleepTimer(1)).await;
    assert_eq!(h.state().await.sleep_remaining, Some(60));

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    h.pump().await;
    assert_eq!(h.state().await.sleep_remaining, Some(30));
    assert!(h.state().await.intend_playing);

    tokio::time::advance(Duration::from_secs(31)).await;
    settle().await;
    h.pump().await;

    let s = h.state().await;
    assert_eq!(s.sleep_remaining, None);
    assert!(!s.intend_playing);
    assert_eq!(s.status, PlaybackStatus::Paused);
    assert_eq!(h.sink.last(), Some(SinkCall::Pause));
    assert!(h
        .notices()
        .contains(&(Severity::Info, SLEEP_ENDED.to_string())));

    // never resumes on its own
    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    h.pump().await;
    assert!(!h.state().await.intend_playing);
}

#[tokio::test(start_paused = true)]
async fn sleep_timer_cancel_and_rejection() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::CancelSleepTimer).await;
    assert!(h.notices().is_empty());

    h.cmd(PlayerCommand::StartSleepTimer(0)).await;
    assert_eq!(h.state().await.sleep_remaining, None);
    assert_eq!(h.notices().len(), 1);

    h.cmd(PlayerCommand::StartSleepTimer(5)).await;
    h.notices();
    h.cmd(PlayerCommand::CancelSleepTimer).await;
    assert_eq!(h.state().await.sleep_remaining, None);
    assert_eq!(
        h.notices(),
        vec![(Severity::Info, "Sleep timer cancelled".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_marks_error() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.media(MediaEvent::Waiting).await;

    tokio::time::advance(Duration::from_secs(10)).await;
    h.core.handle_event(PlayerEvent::HeartbeatTick).await;
    assert_eq!(h.state().await.status, PlaybackStatus::Connecting);

    tokio::time::advance(Duration::from_secs(10)).await;
    h.core.handle_event(PlayerEvent::HeartbeatTick).await;
    let s = h.state().await;
    assert_eq!(s.status, PlaybackStatus::Error);
    assert!(!s.buffering);
}

#[tokio::test]
async fn heartbeat_reloads_dead_sink() {
    let mut h = Harness::new();
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    h.media(MediaEvent::Playing).await;
    *h.sink.dead.lock().unwrap() = true;
    h.sink.clear();

    h.core.handle_event(PlayerEvent::HeartbeatTick).await;
    assert_eq!(h.sink.calls(), vec![SinkCall::Load("http://stream/a".into(), 0.8)]);
}

#[tokio::test]
async fn changes_are_broadcast() {
    let mut h = Harness::new();
    crate::notify::testing::drain(&mut h.bus);
    h.cmd(PlayerCommand::SetStation(station("a"))).await;
    let msgs = crate::notify::testing::drain(&mut h.bus);
    assert!(msgs
        .iter()
        .any(|m| matches!(m, BroadcastMessage::SessionUpdated)));
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let mut h = Harness::new();
    assert!(!h.core.handle_event(PlayerEvent::Shutdown).await);
}
