// SPDX-License-Identifier: GPL-3.0-only

//! Serialized, self-healing MPD connection

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{ReconnectSettings, wait_time};
use crate::connection::{Connector, Session};
use crate::error::{MpdError, Result};

/// One control connection shared by every handler
///
/// All protocol exchanges run inside a single critical section, so callers
/// never see interleaved responses. Connection-class failures trigger a
/// reconnect and exactly one retry of the interrupted operation.
pub struct ReconnectingClient {
    connector: Arc<dyn Connector>,
    session: Mutex<Option<Box<dyn Session>>>,
    settings: ReconnectSettings,
    cancel: CancellationToken,
}

impl ReconnectingClient {
    pub fn new(connector: Arc<dyn Connector>, settings: ReconnectSettings, cancel: CancellationToken) -> Self {
        Self {
            connector,
            session: Mutex::new(None),
            settings,
            cancel,
        }
    }

    pub fn settings(&self) -> &ReconnectSettings {
        &self.settings
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Establish the connection now instead of on first use
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.session.lock().await;
        self.reconnect(&mut slot).await
    }

    /// Close the connection if open; safe to call repeatedly
    pub async fn disconnect(&self) {
        let mut slot = self.session.lock().await;
        if let Some(mut session) = slot.take() {
            session.close().await;
            info!("Disconnected from MPD at {}", self.connector.describe());
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Run `operation` against the live session
    ///
    /// The operation may be invoked twice, so it must only capture owned or
    /// cloneable state.
    pub async fn execute<T, F>(&self, mut operation: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnMut(&'a mut dyn Session) -> BoxFuture<'a, Result<T>> + Send,
    {
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            self.reconnect(&mut slot).await?;
        }

        let mut retried = false;
        loop {
            let Some(session) = slot.as_mut() else {
                return Err(MpdError::Closed);
            };
            let result = operation(session.as_mut()).await;
            let healthy = session.is_healthy();
            match result {
                Err(e) if e.is_connection_error() && !retried => {
                    warn!("MPD connection lost ({}), reconnecting", e);
                    retried = true;
                    self.reconnect(&mut slot).await?;
                }
                result => {
                    if !healthy {
                        debug!("Dropping MPD session left mid-response");
                        Self::discard(&mut slot).await;
                    }
                    return result;
                }
            }
        }
    }

    async fn reconnect(&self, slot: &mut Option<Box<dyn Session>>) -> Result<()> {
        Self::discard(slot).await;
        *slot = Some(self.dial_with_backoff().await?);
        Ok(())
    }

    async fn discard(slot: &mut Option<Box<dyn Session>>) {
        if let Some(mut stale) = slot.take() {
            stale.close().await;
        }
    }

    async fn dial_with_backoff(&self) -> Result<Box<dyn Session>> {
        let target = self.connector.describe();
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            let dialed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(MpdError::Cancelled),
                dialed = self.connector.dial() => dialed,
            };
            let last = match dialed {
                Ok(session) => {
                    info!("Connected to MPD at {} after {} retries", target, attempt);
                    return Ok(session);
                }
                Err(e) => e,
            };

            let wait = wait_time(attempt, start.elapsed(), &self.settings);
            if wait.is_zero() {
                warn!("Giving up on MPD at {}: {}", target, last);
                return Err(MpdError::ReconnectExhausted {
                    window: self.settings.window,
                    last: last.to_string(),
                });
            }
            debug!(attempt, ?wait, "Dial to {} failed: {}", target, last);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Reconnect to {} cancelled", target);
                    return Err(MpdError::Cancelled);
                }
                _ = tokio::time::sleep(wait) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use crate::connection::MpdConnection;
    use crate::protocol::Frame;
    use crate::testing::{FakeConnector, ack, broken_pipe};
    use async_trait::async_trait;
    use futures_util::FutureExt;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    const GREETING: &str = "OK MPD 0.23.5\n";

    /// Real protocol sessions over in-memory pipes, one canned server transcript per dial
    #[derive(Default)]
    struct PipeConnector {
        transcripts: StdMutex<VecDeque<String>>,
        servers: StdMutex<Vec<DuplexStream>>,
        dials: AtomicUsize,
    }

    impl PipeConnector {
        fn serve(&self, replies: &str) -> &Self {
            self.transcripts
                .lock()
                .unwrap()
                .push_back(format!("{GREETING}{replies}"));
            self
        }
    }

    #[async_trait]
    impl Connector for PipeConnector {
        async fn dial(&self) -> Result<Box<dyn Session>> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            let transcript = self
                .transcripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| GREETING.to_string());
            let (client, mut server) = duplex(4096);
            server.write_all(transcript.as_bytes()).await?;
            self.servers.lock().unwrap().push(server);
            let (reader, writer) = tokio::io::split(client);
            Ok(Box::new(MpdConnection::handshake(reader, writer).await?))
        }

        fn describe(&self) -> String {
            "pipe://mpd".to_string()
        }
    }

    fn client(fake: &FakeConnector, settings: ReconnectSettings) -> ReconnectingClient {
        ReconnectingClient::new(Arc::new(fake.clone()), settings, CancellationToken::new())
    }

    async fn status(client: &ReconnectingClient) -> Result<Frame> {
        client
            .execute(|session| async move { commands::status(session).await }.boxed())
            .await
    }

    #[tokio::test]
    async fn connects_lazily_on_first_use() {
        let fake = FakeConnector::default();
        fake.respond(Ok(Frame::new().with("state", "stop")));
        let client = client(&fake, ReconnectSettings::default());
        assert_eq!(fake.dials(), 0);

        let frame = status(&client).await.unwrap();
        assert_eq!(frame.get("state"), Some("stop"));
        assert_eq!(fake.dials(), 1);
        assert!(client.is_connected().await);
    }

    #[tokio::test]
    async fn recovers_from_connection_error_with_one_retry() {
        let fake = FakeConnector::default();
        fake.respond(Err(broken_pipe()))
            .respond(Ok(Frame::new().with("state", "play")));
        let client = client(&fake, ReconnectSettings::default());

        let frame = status(&client).await.unwrap();
        assert_eq!(frame.get("state"), Some("play"));
        assert_eq!(fake.dials(), 2);
        assert_eq!(fake.calls(), vec!["status", "status"]);
        assert_eq!(fake.closes(), 1);
    }

    #[tokio::test]
    async fn second_connection_error_is_surfaced() {
        let fake = FakeConnector::default();
        fake.respond(Err(broken_pipe())).respond(Err(MpdError::Closed));
        let client = client(&fake, ReconnectSettings::default());

        let err = status(&client).await.unwrap_err();
        assert!(matches!(err, MpdError::Closed));
        assert_eq!(fake.dials(), 2);
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn semantic_errors_are_not_retried() {
        let fake = FakeConnector::default();
        fake.respond(Err(ack(5, "status", "unknown command")));
        let client = client(&fake, ReconnectSettings::default());

        let err = status(&client).await.unwrap_err();
        assert!(matches!(err, MpdError::Ack { code: 5, .. }));
        assert_eq!(fake.dials(), 1);
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_gives_up_after_window() {
        let fake = FakeConnector::default();
        fake.refuse_dials(usize::MAX);
        let settings = ReconnectSettings {
            window: Duration::from_secs(5),
            ceiling: Duration::from_secs(2),
        };
        let client = client(&fake, settings);

        let start = Instant::now();
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, MpdError::ReconnectExhausted { .. }));
        assert!(start.elapsed() <= settings.window);
        // Waits of 1s, 2s and 2s fill the window.
        assert_eq!(fake.dials(), 4);
        assert!(!client.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_once_server_returns() {
        let fake = FakeConnector::default();
        fake.refuse_dials(2);
        let client = client(&fake, ReconnectSettings::default());

        client.connect().await.unwrap();
        assert_eq!(fake.dials(), 3);
    }

    #[tokio::test]
    async fn cancellation_interrupts_reconnect() {
        let fake = FakeConnector::default();
        fake.refuse_dials(usize::MAX);
        let cancel = CancellationToken::new();
        let client = ReconnectingClient::new(Arc::new(fake.clone()), ReconnectSettings::default(), cancel.clone());
        cancel.cancel();

        let err = status(&client).await.unwrap_err();
        assert!(matches!(err, MpdError::Cancelled));
    }

    #[tokio::test]
    async fn garbled_response_drops_the_session() {
        let pipe = Arc::new(PipeConnector::default());
        pipe.serve("garbage\nOK\n").serve("state: play\nOK\n");
        let client = ReconnectingClient::new(pipe.clone(), ReconnectSettings::default(), CancellationToken::new());

        let err = status(&client).await.unwrap_err();
        assert!(matches!(err, MpdError::Protocol(_)));
        assert!(!client.is_connected().await);

        let frame = status(&client).await.unwrap();
        assert_eq!(frame.get("state"), Some("play"));
        assert_eq!(pipe.dials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_playback_drops_the_session() {
        let pipe = Arc::new(PipeConnector::default());
        // `clear` is answered, the `update` never is.
        pipe.serve("OK\n");
        let cancel = CancellationToken::new();
        let client = ReconnectingClient::new(pipe.clone(), ReconnectSettings::default(), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = client.start_usb_playback("KEY").await.unwrap_err();
        assert!(matches!(err, MpdError::Cancelled));
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_next_call_redials() {
        let fake = FakeConnector::default();
        let client = client(&fake, ReconnectSettings::default());

        client.connect().await.unwrap();
        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(fake.closes(), 1);

        status(&client).await.unwrap();
        assert_eq!(fake.dials(), 2);
    }
}
