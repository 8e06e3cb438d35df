/// mpv-backed [`AudioSink`] speaking mpv's JSON IPC protocol.
///
/// ```text
///   MpvSink ── MpvDriver::spawn_and_connect()
///                 ├── writer_task  ← PendingRequest via mpsc → socket
///                 └── reader_task  ← JSON lines from socket
///                        ├── reply (request_id) → oneshot
///                        └── event              → translate_task → MediaEvent
/// ```
///
/// The mpv process is spawned lazily on the first `load` and respawned when
/// it has died.
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use airwave_proto::platform;

use crate::audio::{AudioSink, MediaEvent};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observed properties ───────────────────────────────────────────────────────

pub const OBS_CORE_IDLE: u64 = 1;
pub const OBS_PAUSE: u64 = 2;
pub const OBS_TIME_POS: u64 = 3;
pub const OBS_DURATION: u64 = 4;

const OBSERVED: [(u64, &str); 4] = [
    (OBS_CORE_IDLE, "core-idle"),
    (OBS_PAUSE, "pause"),
    (OBS_TIME_POS, "time-pos"),
    (OBS_DURATION, "duration"),
];

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An unsolicited mpv message (event or property change).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? != "property-change" {
            return None;
        }
        let id = self.raw.get("id")?.as_u64()?;
        Some((id, self.raw.get("data").unwrap_or(&Value::Null)))
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `reason` of an `end-file` event.
    pub fn end_reason(&self) -> Option<&str> {
        self.raw.get("reason")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable sender into the writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut payload = serde_json::to_string(&json!({
            "command": command,
            "request_id": req_id,
        }))?;
        payload.push('\n');

        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(std::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub async fn load_stream(&self, url: &str, volume: f32) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["loadfile", url, "replace"])).await?;
        self.set_volume(volume).await?;
        self.set_pause(false).await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, volume: f32) -> anyhow::Result<()> {
        self.send(json!(["set_property", "volume", volume_percent(volume)]))
            .await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    /// Must be repeated on every fresh connection.
    pub async fn observe_all_properties(&self) {
        for (id, name) in OBSERVED {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

fn volume_percent(volume: f32) -> f64 {
    f64::from((volume * 100.0).clamp(0.0, 100.0))
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                match status.code() {
                    Some(code) => warn!("mpv exited with code {}", code),
                    None => warn!("mpv terminated by signal"),
                }
                false
            }
            Err(e) => {
                warn!("mpv liveness check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn command(&self, volume: f32) -> anyhow::Result<tokio::process::Command> {
        let binary = platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found (install mpv or set MPV_PATH)"))?;
        let mut cmd = tokio::process::Command::new(binary);
        cmd.arg("--no-video")
            .arg("--idle=yes")
            .arg(platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(format!("--volume={}", volume_percent(volume).round() as i64))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        let stderr_path = platform::data_dir().join("mpv-stderr.log");
        if let Some(parent) = stderr_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = self.command(volume)?.stderr(stderr_file).spawn()?;
        info!("mpv: spawned pid {:?}, stderr → {:?}", child.id(), stderr_path);
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to {}", self.socket_name);
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let child = self
            .command(volume)?
            .stderr(std::process::Stdio::null())
            .spawn()?;
        info!("mpv: spawned pid {:?}", child.id());
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to {}", pipe_path);
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

impl Default for MpvDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));
    MpvHandle { tx: cmd_tx }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(Value::as_u64) {
                    let Some(tx) = pending.lock().await.remove(&req_id) else {
                        debug!("mpv reader: reply for unknown req={}", req_id);
                        continue;
                    };
                    let result = match val["error"].as_str() {
                        Some("success") => Ok(val),
                        other => Err(anyhow::anyhow!(
                            "mpv error: {}",
                            other.unwrap_or("unknown error")
                        )),
                    };
                    let _ = tx.send(result);
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can always match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: exiting");
}

// ── event translation ─────────────────────────────────────────────────────────

/// Folds mpv property changes into [`MediaEvent`]s.
#[derive(Debug)]
pub struct EventTranslator {
    core_idle: bool,
    paused: bool,
    time_pos: Option<f64>,
    duration: Option<f64>,
}

impl Default for EventTranslator {
    fn default() -> Self {
        // A fresh mpv is idle until a file starts producing audio.
        Self {
            core_idle: true,
            paused: false,
            time_pos: None,
            duration: None,
        }
    }
}

impl EventTranslator {
    pub fn translate(&mut self, event: &MpvEvent) -> Option<MediaEvent> {
        if let Some((id, data)) = event.as_property_change() {
            return match id {
                OBS_CORE_IDLE => {
                    self.core_idle = data.as_bool().unwrap_or(true);
                    self.running_state()
                }
                OBS_PAUSE => {
                    self.paused = data.as_bool().unwrap_or(false);
                    if self.paused {
                        Some(MediaEvent::Paused)
                    } else {
                        self.running_state()
                    }
                }
                OBS_TIME_POS => {
                    self.time_pos = data.as_f64();
                    Some(self.timeline())
                }
                OBS_DURATION => {
                    self.duration = data.as_f64();
                    Some(self.timeline())
                }
                _ => None,
            };
        }

        match event.event_name()? {
            "start-file" => {
                self.time_pos = None;
                self.duration = None;
                None
            }
            "end-file" => match event.end_reason() {
                Some("eof") => Some(MediaEvent::Ended),
                Some("error") | Some("network") => {
                    let detail = event
                        .raw
                        .get("file_error")
                        .and_then(Value::as_str)
                        .unwrap_or("stream failed");
                    Some(MediaEvent::Error(detail.to_string()))
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn running_state(&self) -> Option<MediaEvent> {
        match (self.paused, self.core_idle) {
            (true, _) => None,
            (false, false) => Some(MediaEvent::Playing),
            (false, true) => Some(MediaEvent::Waiting),
        }
    }

    fn timeline(&self) -> MediaEvent {
        MediaEvent::TimeUpdate {
            pos: self.time_pos,
            duration: self.duration,
        }
    }
}

async fn translate_task(mut rx: mpsc::Receiver<MpvEvent>, media_tx: mpsc::Sender<MediaEvent>) {
    let mut translator = EventTranslator::default();
    while let Some(event) = rx.recv().await {
        if let Some(media) = translator.translate(&event) {
            if media_tx.send(media).await.is_err() {
                break;
            }
        }
    }
}

// ── sink ──────────────────────────────────────────────────────────────────────

pub struct MpvSink {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    translator: Option<JoinHandle<()>>,
    media_tx: mpsc::Sender<MediaEvent>,
    volume: f32,
    last_url: Option<String>,
}

impl MpvSink {
    pub fn new(media_tx: mpsc::Sender<MediaEvent>, volume: f32) -> Self {
        Self {
            driver: MpvDriver::new(),
            handle: None,
            translator: None,
            media_tx,
            volume,
            last_url: None,
        }
    }

    /// Returns a live handle, spawning mpv when needed. The flag is true when
    /// a fresh process was started.
    async fn connected(&mut self) -> anyhow::Result<(MpvHandle, bool)> {
        if let Some(handle) = &self.handle {
            if self.driver.process_alive() {
                return Ok((handle.clone(), false));
            }
            warn!("mpv: process gone, respawning");
        }
        self.drop_connection();

        let (event_tx, event_rx) = mpsc::channel(256);
        let handle = self.driver.spawn_and_connect(self.volume, event_tx).await?;
        self.translator = Some(tokio::spawn(translate_task(event_rx, self.media_tx.clone())));
        handle.observe_all_properties().await;
        self.handle = Some(handle.clone());
        Ok((handle, true))
    }

    fn drop_connection(&mut self) {
        self.handle = None;
        if let Some(task) = self.translator.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl AudioSink for MpvSink {
    async fn load(&mut self, url: &str, volume: f32) -> anyhow::Result<()> {
        self.volume = volume;
        let (handle, _) = self.connected().await?;
        handle.load_stream(url, volume).await?;
        self.last_url = Some(url.to_string());
        Ok(())
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        let (handle, fresh) = self.connected().await?;
        match (&self.last_url, fresh) {
            (Some(url), true) => handle.load_stream(url, self.volume).await,
            (Some(_), false) => handle.set_pause(false).await,
            (None, _) => anyhow::bail!("no stream loaded"),
        }
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        match &self.handle {
            Some(handle) => handle.set_pause(true).await,
            None => Ok(()),
        }
    }

    async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        self.volume = volume;
        match &self.handle {
            Some(handle) => handle.set_volume(volume).await,
            None => Ok(()),
        }
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.last_url = None;
        match &self.handle {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }

    fn is_alive(&mut self) -> bool {
        self.handle.is_some() && self.driver.process_alive()
    }

    async fn shutdown(&mut self) {
        self.drop_connection();
        self.driver.kill().await;
        info!("mpv: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    fn prop(id: u64, data: Value) -> MpvEvent {
        ev(json!({ "event": "property-change", "id": id, "data": data }))
    }

    #[test]
    fn buffering_then_playing_then_paused() {
        let mut t = EventTranslator::default();
        assert_eq!(t.translate(&prop(OBS_PAUSE, json!(false))), Some(MediaEvent::Waiting));
        assert_eq!(t.translate(&prop(OBS_CORE_IDLE, json!(false))), Some(MediaEvent::Playing));
        assert_eq!(t.translate(&prop(OBS_PAUSE, json!(true))), Some(MediaEvent::Paused));
        // core-idle flips while paused; nothing to report
        assert_eq!(t.translate(&prop(OBS_CORE_IDLE, json!(true))), None);
        assert_eq!(t.translate(&prop(OBS_PAUSE, json!(false))), Some(MediaEvent::Waiting));
    }

    #[test]
    fn timeline_carries_both_values() {
        let mut t = EventTranslator::default();
        t.translate(&prop(OBS_DURATION, json!(120.0)));
        assert_eq!(
            t.translate(&prop(OBS_TIME_POS, json!(3.5))),
            Some(MediaEvent::TimeUpdate {
                pos: Some(3.5),
                duration: Some(120.0)
            })
        );
        t.translate(&ev(json!({ "event": "start-file" })));
        assert_eq!(
            t.translate(&prop(OBS_TIME_POS, Value::Null)),
            Some(MediaEvent::TimeUpdate {
                pos: None,
                duration: None
            })
        );
    }

    #[test]
    fn end_file_reasons() {
        let mut t = EventTranslator::default();
        assert_eq!(
            t.translate(&ev(json!({ "event": "end-file", "reason": "eof" }))),
            Some(MediaEvent::Ended)
        );
        assert_eq!(
            t.translate(&ev(json!({
                "event": "end-file", "reason": "error", "file_error": "loading failed"
            }))),
            Some(MediaEvent::Error("loading failed".into()))
        );
        assert_eq!(
            t.translate(&ev(json!({ "event": "end-file", "reason": "stop" }))),
            None
        );
        assert_eq!(t.translate(&ev(json!({ "event": "idle" }))), None);
    }

    #[tokio::test]
    async fn replies_are_routed_by_request_id() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(client_read, client_write, event_tx);

        let fake_mpv = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let req: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(req["command"], json!(["set_property", "pause", true]));
            let id = req["request_id"].as_u64().unwrap();
            let event = json!({ "event": "property-change", "id": OBS_PAUSE, "data": true });
            let reply = json!({ "request_id": id, "error": "success", "data": null });
            write
                .write_all(format!("{event}\n{reply}\n").as_bytes())
                .await
                .unwrap();
        });

        handle.set_pause(true).await.unwrap();
        fake_mpv.await.unwrap();
        let event = event_rx.recv().await.unwrap();
        assert_eq!(event.as_property_change().map(|(id, _)| id), Some(OBS_PAUSE));
    }

    #[tokio::test]
    async fn error_replies_fail_the_request() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(client_read, client_write, event_tx);

        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let id = serde_json::from_str::<Value>(&line).unwrap()["request_id"].clone();
            let reply = json!({ "request_id": id, "error": "property unavailable" });
            write.write_all(format!("{reply}\n").as_bytes()).await.unwrap();
        });

        let err = handle.stop().await.unwrap_err();
        assert!(err.to_string().contains("property unavailable"));
    }
}
