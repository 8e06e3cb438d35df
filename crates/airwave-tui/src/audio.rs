//! The seam between the playback core and whatever actually produces sound.

use async_trait::async_trait;

/// Status events pushed by an audio sink.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Playing,
    Paused,
    /// Buffering or waiting for the stream to deliver audio.
    Waiting,
    TimeUpdate {
        pos: Option<f64>,
        duration: Option<f64>,
    },
    Error(String),
    Ended,
}

/// An external audio engine. Calls only sequence the engine; state changes
/// come back asynchronously as [`MediaEvent`]s.
#[async_trait]
pub trait AudioSink: Send {
    /// Load `url` and start playing it at `volume` (0.0..=1.0).
    async fn load(&mut self, url: &str, volume: f32) -> anyhow::Result<()>;
    async fn play(&mut self) -> anyhow::Result<()>;
    async fn pause(&mut self) -> anyhow::Result<()>;
    async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()>;
    /// Unload the current stream.
    async fn stop(&mut self) -> anyhow::Result<()>;
    fn is_alive(&mut self) -> bool;
    async fn shutdown(&mut self) {}
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SinkCall {
        Load(String, f32),
        Play,
        Pause,
        Volume(f32),
        Stop,
    }

    /// Records every call; `play` can be made to fail.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub calls: Arc<Mutex<Vec<SinkCall>>>,
        pub fail_play: Arc<Mutex<bool>>,
        pub dead: Arc<Mutex<bool>>,
    }

    impl RecordingSink {
        pub fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn last(&self) -> Option<SinkCall> {
            self.calls.lock().unwrap().last().cloned()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn record(&self, call: SinkCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl AudioSink for RecordingSink {
        async fn load(&mut self, url: &str, volume: f32) -> anyhow::Result<()> {
            self.record(SinkCall::Load(url.to_string(), volume));
            Ok(())
        }

        async fn play(&mut self) -> anyhow::Result<()> {
            self.record(SinkCall::Play);
            if *self.fail_play.lock().unwrap() {
                anyhow::bail!("autoplay blocked");
            }
            Ok(())
        }

        async fn pause(&mut self) -> anyhow::Result<()> {
            self.record(SinkCall::Pause);
            Ok(())
        }

        async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
            self.record(SinkCall::Volume(volume));
            Ok(())
        }

        async fn stop(&mut self) -> anyhow::Result<()> {
            self.record(SinkCall::Stop);
            Ok(())
        }

        fn is_alive(&mut self) -> bool {
            !*self.dead.lock().unwrap()
        }
    }
}
