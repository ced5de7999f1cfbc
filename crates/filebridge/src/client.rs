//! Bridge client - writes commands and waits for correlated responses.
//!
//! Flow per call:
//! 1. Generate a fresh CommandId, encode and write the command (Idle → Sent)
//! 2. If no response is wanted, return immediately
//! 3. Poll the mailbox for `<id>_response` until found (→ Completed) or the
//!    deadline passes (→ TimedOut)
//! 4. Decode, delete the response artifact, return
//!
//! The only suspension point is the sleep between polls. Responses that show
//! up after a timeout are left in place; nothing here sweeps them.

use std::time::Duration;

use tokio::time::Instant;

use crate::bridge::codec;
use crate::bridge::protocol::{Command, CommandId, Params, Response};
use crate::bridge::store::{FsMailbox, Mailbox};
use crate::config::{BridgeConfig, MIN_POLL_INTERVAL};
use crate::error::{BridgeError, Result};

const FOREVER: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Terminal outcome of a `send`.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The executor answered and the response artifact was consumed.
    Completed { id: CommandId, response: Response },

    /// The caller did not ask to wait. The command was written.
    NotRequested { id: CommandId },

    /// No valid response within the deadline. A late response may still
    /// appear under this id.
    TimedOut { id: CommandId },
}

impl Reply {
    pub fn id(&self) -> CommandId {
        match self {
            Self::Completed { id, .. } | Self::NotRequested { id } | Self::TimedOut { id } => *id,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Completed { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Completed { response, .. } => Some(response),
            _ => None,
        }
    }
}

pub struct BridgeClient<M = FsMailbox> {
    mailbox: M,
    poll_interval: Duration,
    timeout: Duration,
}

impl BridgeClient<FsMailbox> {
    /// Client over the directories named in `config`.
    pub fn new(config: &BridgeConfig) -> Self {
        Self::with_mailbox(
            FsMailbox::new(&config.commands_dir, &config.responses_dir),
            config.poll_interval,
            config.timeout,
        )
    }
}

impl<M: Mailbox> BridgeClient<M> {
    /// Client over any mailbox. `poll_interval` is raised to
    /// [`MIN_POLL_INTERVAL`] if shorter.
    pub fn with_mailbox(mailbox: M, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            mailbox,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            timeout,
        }
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Timeout used by [`request`](Self::request).
    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Send and wait up to the default timeout.
    pub async fn request(&self, action: &str, params: Params) -> Result<Reply> {
        self.send(action, params, true, self.timeout).await
    }

    /// Send without waiting for a response.
    pub async fn post(&self, action: &str, params: Params) -> Result<Reply> {
        self.send(action, params, false, self.timeout).await
    }

    /// Write a command and optionally wait for its response.
    ///
    /// Write failures are returned immediately and never retried. A timeout
    /// is `Ok(Reply::TimedOut)`, reported no earlier than `timeout` and no
    /// later than `timeout` plus one poll interval.
    pub async fn send(
        &self,
        action: &str,
        params: Params,
        wait: bool,
        timeout: Duration,
    ) -> Result<Reply> {
        let command = Command::new(action, params);
        let id = command.id();
        let payload = codec::encode_command(&command)?;

        self.mailbox
            .put_command(id, &payload)
            .map_err(|source| BridgeError::WriteFailed {
                path: self.mailbox.command_location(id),
                source,
            })?;
        tracing::debug!(command_id = %id, action, "Sent command");

        if !wait {
            return Ok(Reply::NotRequested { id });
        }

        let started = Instant::now();
        // Saturate absurd timeouts instead of overflowing the clock.
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + FOREVER);

        loop {
            if let Some(response) = self.poll_once(id).await? {
                tracing::info!(
                    command_id = %id,
                    action,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Received response"
                );
                return Ok(Reply::Completed { id, response });
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    command_id = %id,
                    action,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for response"
                );
                return Ok(Reply::TimedOut { id });
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// One look at the mailbox.
    ///
    /// A response that fails to decode may still be mid-write, so it gets one
    /// more read after a poll interval. If that also fails the artifact is
    /// deleted and the failure returned.
    async fn poll_once(&self, id: CommandId) -> Result<Option<Response>> {
        let Some(bytes) = self.read_response(id)? else {
            return Ok(None);
        };

        let response = match codec::decode_response(&bytes) {
            Ok(response) => response,
            Err(first) => {
                tracing::debug!(
                    command_id = %id,
                    error = %first,
                    "Response not decodable, retrying once"
                );
                tokio::time::sleep(self.poll_interval).await;

                let Some(bytes) = self.read_response(id)? else {
                    return Ok(None);
                };
                match codec::decode_response(&bytes) {
                    Ok(response) => response,
                    Err(e) => {
                        let path = self.mailbox.response_location(id);
                        tracing::warn!(
                            command_id = %id,
                            path = %path.display(),
                            error = %e,
                            "Malformed response payload"
                        );
                        self.discard_response(id);
                        return Err(e);
                    }
                }
            }
        };

        self.discard_response(id);
        Ok(Some(response))
    }

    fn read_response(&self, id: CommandId) -> Result<Option<Vec<u8>>> {
        self.mailbox
            .try_get_response(id)
            .map_err(|source| BridgeError::ReadFailed {
                path: self.mailbox.response_location(id),
                source,
            })
    }

    fn discard_response(&self, id: CommandId) {
        if let Err(e) = self.mailbox.delete_response(id) {
            let path = self.mailbox.response_location(id);
            tracing::warn!(
                command_id = %id,
                path = %path.display(),
                error = %e,
                "Failed to delete response artifact"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::codec::decode_command;
    use crate::bridge::store::MemoryMailbox;
    use serde_json::json;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INTERVAL: Duration = Duration::from_millis(100);

    fn memory_client() -> (Arc<MemoryMailbox>, BridgeClient<Arc<MemoryMailbox>>) {
        let mailbox = Arc::new(MemoryMailbox::new());
        let client =
            BridgeClient::with_mailbox(Arc::clone(&mailbox), INTERVAL, Duration::from_secs(1));
        (mailbox, client)
    }

    /// Stand-in executor: answers every command it sees with `answer(command)`.
    fn spawn_executor(
        mailbox: Arc<MemoryMailbox>,
        answer: impl Fn(&Command) -> Vec<u8> + Send + 'static,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut answered = std::collections::HashSet::new();
            loop {
                for id in mailbox.command_ids() {
                    if answered.insert(id) {
                        let command = decode_command(&mailbox.command(id).unwrap()).unwrap();
                        mailbox.respond(id, answer(&command));
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
    }

    fn params(value: serde_json::Value) -> Params {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn post_returns_not_requested_and_writes_command() {
        let (mailbox, client) = memory_client();

        let reply = client
            .post("deleteObject", params(json!({"name": "MyCube"})))
            .await
            .unwrap();

        let Reply::NotRequested { id } = reply else {
            panic!("expected NotRequested");
        };
        assert_eq!(mailbox.command_ids(), vec![id]);
        let command = decode_command(&mailbox.command(id).unwrap()).unwrap();
        assert_eq!(command.id(), id);
        assert_eq!(command.action(), "deleteObject");
        assert_eq!(command.params(), &params(json!({"name": "MyCube"})));
    }

    #[tokio::test(start_paused = true)]
    async fn request_returns_decoded_response_and_deletes_it() {
        let (mailbox, client) = memory_client();
        let executor = spawn_executor(Arc::clone(&mailbox), |_| {
            br#"{"status": "success", "result": {"success": true}}"#.to_vec()
        });

        let reply = client.request("createObject", Params::new()).await.unwrap();
        executor.abort();

        let id = reply.id();
        let response = reply.into_response().expect("completed");
        assert_eq!(response.status(), Some("success"));
        assert_eq!(response.result(), Some(&json!({"success": true})));
        assert!(!mailbox.has_response(id));
        mailbox.delete_response(id).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_one_poll_interval_of_deadline() {
        let (mailbox, client) = memory_client();
        let timeout = Duration::from_millis(1_050);

        let started = Instant::now();
        let reply = client
            .send("getSceneInfo", Params::new(), true, timeout)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(reply.is_timed_out(), "{reply:?}");
        assert!(elapsed >= timeout, "returned early after {elapsed:?}");
        assert!(elapsed <= timeout + INTERVAL, "returned late after {elapsed:?}");
        assert_eq!(mailbox.command_ids(), vec![reply.id()]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_checks_once() {
        let (_mailbox, client) = memory_client();
        let started = Instant::now();
        let reply = client
            .send("getSceneInfo", Params::new(), true, Duration::ZERO)
            .await
            .unwrap();
        assert!(reply.is_timed_out());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_is_left_as_orphan() {
        let (mailbox, client) = memory_client();

        let reply = client.request("getSceneInfo", Params::new()).await.unwrap();
        assert!(reply.is_timed_out());

        mailbox.respond(reply.id(), b"{}".to_vec());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(mailbox.has_response(reply.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_is_an_error_and_removed() {
        let (mailbox, client) = memory_client();
        let executor = spawn_executor(Arc::clone(&mailbox), |_| b"<html>oops</html>".to_vec());

        let err = client
            .request("getSceneInfo", Params::new())
            .await
            .unwrap_err();
        executor.abort();

        assert!(err.is_malformed(), "{err}");
        let id = mailbox.command_ids()[0];
        assert!(!mailbox.has_response(id));
    }

    #[tokio::test(start_paused = true)]
    async fn non_object_response_is_malformed() {
        let (mailbox, client) = memory_client();
        let executor = spawn_executor(Arc::clone(&mailbox), |_| b"[true]".to_vec());

        let err = client
            .request("getSceneInfo", Params::new())
            .await
            .unwrap_err();
        executor.abort();

        assert!(err.is_malformed());
    }

    #[tokio::test(start_paused = true)]
    async fn half_written_response_is_read_again() {
        let (mailbox, client) = memory_client();
        let executor_mailbox = Arc::clone(&mailbox);
        let executor = tokio::spawn(async move {
            loop {
                if let Some(id) = executor_mailbox.command_ids().first().copied() {
                    executor_mailbox.respond(id, br#"{"result": {"sceneName""#.to_vec());
                    // Finishes after the client's first look, before its retry.
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    executor_mailbox.respond(id, br#"{"result": {"sceneName": "Main"}}"#.to_vec());
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let reply = client.request("getSceneInfo", Params::new()).await.unwrap();
        executor.await.unwrap();

        let response = reply.response().expect("completed");
        assert_eq!(response.result(), Some(&json!({"sceneName": "Main"})));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sends_do_not_interfere() {
        let (mailbox, client) = memory_client();
        let client = Arc::new(client);
        let executor = spawn_executor(Arc::clone(&mailbox), |command| {
            serde_json::to_vec(&json!({
                "id": command.id().to_string(),
                "result": command.params()["n"],
            }))
            .unwrap()
        });

        let calls: Vec<_> = (0..8)
            .map(|n| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client
                        .request("echo", params(json!({"n": n})))
                        .await
                        .map(|reply| (n, reply))
                })
            })
            .collect();

        for call in calls {
            let (n, reply) = call.await.unwrap().unwrap();
            let id = reply.id();
            let response = reply.into_response().expect("completed");
            assert_eq!(response.result(), Some(&json!(n)));
            assert_eq!(response.get("id"), Some(&json!(id.to_string())));
        }
        executor.abort();
        assert_eq!(mailbox.command_ids().len(), 8);
    }

    #[tokio::test]
    async fn write_failure_is_surfaced_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("AICommands");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let config = BridgeConfig::new(&blocker, dir.path().join("AIResponses"))
            .with_timeout(Duration::from_secs(30));
        let client = BridgeClient::new(&config);

        let started = std::time::Instant::now();
        let err = client
            .request("getSceneInfo", Params::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::WriteFailed { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    /// Accepts every command and counts response lookups. Lookups fail with
    /// `read_error` when set.
    #[derive(Default)]
    struct CountingMailbox {
        lookups: AtomicUsize,
        read_error: Option<io::ErrorKind>,
    }

    impl Mailbox for CountingMailbox {
        fn put_command(&self, _id: CommandId, _payload: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn try_get_response(&self, _id: CommandId) -> io::Result<Option<Vec<u8>>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match self.read_error {
                Some(kind) => Err(io::Error::from(kind)),
                None => Ok(None),
            }
        }

        fn delete_response(&self, _id: CommandId) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_error_is_surfaced_not_timed_out() {
        let mailbox = CountingMailbox {
            read_error: Some(io::ErrorKind::PermissionDenied),
            ..Default::default()
        };
        let client = BridgeClient::with_mailbox(mailbox, INTERVAL, Duration::from_secs(10));

        let started = Instant::now();
        let err = client
            .request("getSceneInfo", Params::new())
            .await
            .unwrap_err();

        match err {
            BridgeError::ReadFailed { path, source } => {
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
                assert!(path.to_string_lossy().ends_with("_response.json"), "{path:?}");
            }
            other => panic!("expected ReadFailed, got {other}"),
        }
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(client.mailbox().lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn directory_at_response_path_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Arc::new(FsMailbox::new(
            dir.path().join("AICommands"),
            dir.path().join("AIResponses"),
        ));
        let client = BridgeClient::with_mailbox(
            Arc::clone(&mailbox),
            INTERVAL,
            Duration::from_secs(10),
        );

        // Plays an executor that wrongly creates a directory under the response name.
        let executor = tokio::spawn(async move {
            loop {
                let commands: Vec<PathBuf> = std::fs::read_dir(mailbox.commands_dir())
                    .map(|entries| entries.flatten().map(|e| e.path()).collect())
                    .unwrap_or_default();
                if let Some(path) = commands.first() {
                    let id = CommandId::parse(
                        path.file_stem().unwrap().to_str().unwrap(),
                    )
                    .unwrap();
                    std::fs::create_dir_all(mailbox.response_location(id)).unwrap();
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let err = client
            .request("getSceneInfo", Params::new())
            .await
            .unwrap_err();
        executor.await.unwrap();

        assert!(matches!(err, BridgeError::ReadFailed { .. }), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_is_raised_to_floor() {
        let client = BridgeClient::with_mailbox(
            CountingMailbox::default(),
            Duration::ZERO,
            Duration::from_millis(200),
        );
        assert_eq!(client.poll_interval(), MIN_POLL_INTERVAL);

        let reply = client
            .request("getSceneInfo", Params::new())
            .await
            .unwrap();

        assert!(reply.is_timed_out());
        let lookups = client.mailbox().lookups.load(Ordering::SeqCst);
        let most = (200 / MIN_POLL_INTERVAL.as_millis() + 1) as usize;
        assert!(lookups <= most, "{lookups} lookups");
    }

    #[tokio::test(start_paused = true)]
    async fn filesystem_post_leaves_one_command_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::new(dir.path().join("cmds"), dir.path().join("resps"));
        let client = BridgeClient::new(&config);

        let reply = client
            .post("getSceneInfo", Params::new())
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(&config.commands_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", reply.id())]);
        assert!(matches!(reply, Reply::NotRequested { .. }));
    }
}
