pub mod commands;
pub mod formatting;

use crate::console::Console;
use crate::error::SessionError;
use commands::{parse_command, Command};
use formatting::{peer_listing, prompt, welcome_banner};
use libchat::{ClientFactory, Message, PeerBook, Registry, TransportError};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;

pub const NOT_SELECTED: &str = "User not selected. Use :user command";
pub const PEER_DISAPPEARED: &str = "Cannot send message, because user disappeared";
pub const REGISTRY_UNAVAILABLE: &str = "Cannot get users from registry";
pub const SELECTED_REMOVED: &str = "Selected user was removed from registry";

/// How long shutdown waits for outstanding sends before giving up on them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub self_name: String,
    /// Always a name present in the peer directory. Cleared when a refresh drops it.
    pub selected_peer: Option<String>,
    pub terminated: bool,
}

/// How a single background send ended.
#[derive(Debug)]
pub enum SendOutcome {
    Sent,
    NotSelected,
    PeerDisappeared,
    Failed(TransportError),
}

/// The interactive chat loop.
///
/// Commands run one after another on the task that calls [`ChatSession::run`]. Each message line is handed to its
/// own spawned task, so a slow or hung peer never blocks the prompt.
pub struct ChatSession<R> {
    state: SessionState,
    registry: Arc<dyn Registry>,
    peers: PeerBook,
    console: Console,
    input: R,
    send_timeout: Option<Duration>,
    in_flight: Vec<JoinHandle<SendOutcome>>,
}

impl<R> ChatSession<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new<S: Into<String>>(
        name: S,
        registry: Arc<dyn Registry>,
        factory: Arc<dyn ClientFactory>,
        console: Console,
        input: R,
    ) -> Self {
        let state = SessionState { self_name: name.into(), selected_peer: None, terminated: false };
        ChatSession {
            state,
            registry,
            peers: PeerBook::new(factory),
            console,
            input,
            send_timeout: None,
            in_flight: Vec::new(),
        }
    }

    /// Abandon sends that have not completed within `timeout`. `None` waits forever.
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn selected_peer(&self) -> Option<&str> {
        self.state.selected_peer.as_deref()
    }

    pub fn peers(&self) -> &PeerBook {
        &self.peers
    }

    pub async fn run(&mut self) -> Result<(), SessionError> {
        self.console.println(welcome_banner(&self.state.self_name));
        self.update_users().await;
        while !self.state.terminated {
            let Some(input) = self.read_input().await? else {
                info!("End of operator input");
                self.exit();
                break;
            };
            match parse_command(&input) {
                Command::Update => self.update_users().await,
                Command::Exit => self.exit(),
                Command::SelectUser(name) => self.select_user(&name).await,
                Command::Empty => {}
                Command::Message(text) => self.send_in_background(text),
            }
        }
        Ok(())
    }

    /// Prompts until a non-blank line arrives. Returns `None` at the end of input.
    async fn read_input(&mut self) -> Result<Option<String>, SessionError> {
        loop {
            self.console.print(prompt(self.selected_peer()));
            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }
            let line = line.trim_start().trim_end_matches(&['\r', '\n'][..]);
            return Ok(Some(line.to_string()));
        }
    }

    /// Replaces the peer directory with the registry's current listing. If the registry cannot be reached, nothing
    /// changes.
    pub async fn update_users(&mut self) {
        let users = match self.registry.list().await {
            Ok(users) => users,
            Err(err) => {
                warn!("Registry listing failed: {err}");
                self.console.println(REGISTRY_UNAVAILABLE);
                return;
            }
        };
        let directory = self.peers.replace_directory(users).await;
        if let Some(selected) = self.state.selected_peer.as_deref() {
            if !directory.contains(selected) {
                debug!("{selected} left the registry");
                self.console.println(SELECTED_REMOVED);
                self.state.selected_peer = None;
            }
        }
        if !directory.is_empty() {
            self.console.println(peer_listing(&directory));
        }
    }

    pub async fn select_user(&mut self, name: &str) {
        if !self.peers.contains(name).await {
            self.console.println(format!("Unknown user '{name}'"));
            return;
        }
        trace!("Selected {name}");
        self.state.selected_peer = Some(name.to_string());
    }

    fn exit(&mut self) {
        self.state.terminated = true;
    }

    /// Spawns the send of `text` to the currently selected peer and returns immediately.
    pub fn send_in_background(&mut self, text: String) {
        self.in_flight.retain(|task| !task.is_finished());
        let peers = self.peers.clone();
        let console = self.console.clone();
        let sender = self.state.self_name.clone();
        let recipient = self.state.selected_peer.clone();
        let timeout = self.send_timeout;
        let task = tokio::spawn(async move {
            deliver(&peers, &console, &sender, recipient.as_deref(), text, timeout).await
        });
        self.in_flight.push(task);
    }

    /// Waits up to `grace` for the sends still in flight, so messages typed just before `:exit` still go out. Sends
    /// that are still running at the deadline are abandoned.
    pub async fn wait_for_sends(&mut self, grace: Duration) -> Vec<SendOutcome> {
        let deadline = tokio::time::Instant::now() + grace;
        let mut outcomes = Vec::with_capacity(self.in_flight.len());
        let mut abandoned = 0;
        for mut task in self.in_flight.drain(..) {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(err)) => error!("Send task ended abnormally: {err}"),
                Err(_) => {
                    task.abort();
                    abandoned += 1;
                }
            }
        }
        if abandoned > 0 {
            warn!("Abandoned {abandoned} unfinished send(s) after waiting {grace:?}");
        }
        outcomes
    }
}

/// Resolves `recipient` to a pooled client and sends one message. Every failure is reported on the console; none is
/// retried.
pub async fn deliver(
    peers: &PeerBook,
    console: &Console,
    sender: &str,
    recipient: Option<&str>,
    text: String,
    timeout: Option<Duration>,
) -> SendOutcome {
    let Some(recipient) = recipient else {
        console.println(NOT_SELECTED);
        return SendOutcome::NotSelected;
    };
    let Some((address, client)) = peers.resolve(recipient).await else {
        console.println(PEER_DISAPPEARED);
        return SendOutcome::PeerDisappeared;
    };
    let message = Message::new(sender, text);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, client.send_message(&message))
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(limit))),
        None => client.send_message(&message).await,
    };
    match result {
        Ok(()) => {
            trace!("Message delivered to {recipient} at {address}");
            SendOutcome::Sent
        }
        Err(err) => {
            error!("Error sending message from {sender} to {recipient}: {err}");
            console.println(format!("Error! {err}"));
            SendOutcome::Failed(err)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::console::SharedBuffer;
    use async_trait::async_trait;
    use libchat::dummy_impl::{DummyRegistry, RecordingFactory};
    use libchat::{ChatClient, PeerAddress, PeerDirectory, PeerMap, Protocol};
    use tokio::io::BufReader;

    type TestSession = ChatSession<BufReader<&'static [u8]>>;

    fn bob() -> PeerMap {
        PeerMap::from([("bob".to_string(), PeerAddress::new(Protocol::Udp, "h", 1))])
    }

    fn new_session(
        input: &'static str,
        registry: Arc<DummyRegistry>,
        factory: &RecordingFactory,
    ) -> (TestSession, SharedBuffer) {
        env_logger::try_init().ok();
        let buffer = SharedBuffer::default();
        let console = Console::new(buffer.clone());
        let session =
            ChatSession::new("me", registry, Arc::new(factory.clone()), console, BufReader::new(input.as_bytes()));
        (session, buffer)
    }

    #[tokio::test]
    async fn select_and_send_over_udp() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let (mut session, output) = new_session(":user bob\nhello\n:exit\n", registry, &factory);
        session.run().await.unwrap();
        let outcomes = session.wait_for_sends(SHUTDOWN_GRACE).await;
        assert!(matches!(outcomes.as_slice(), [SendOutcome::Sent]));

        let udp_bob = PeerAddress::new(Protocol::Udp, "h", 1);
        assert_eq!(factory.created(), vec![udp_bob.clone()]);
        assert_eq!(factory.sent(), vec![(udp_bob, Message::new("me", "hello"))]);
        assert_eq!(session.selected_peer(), Some("bob"));
        assert!(session.state().terminated);
        let output = output.contents();
        assert!(output.contains("Hi, me"));
        assert!(output.contains("bob ==> udp://h:1"));
        assert!(output.contains("  to [bob] <<< "));
    }

    #[tokio::test]
    async fn unknown_user_keeps_selection() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let (mut session, output) = new_session(":user bob\n:user ghost\n:exit\n", registry, &factory);
        session.run().await.unwrap();
        assert_eq!(session.selected_peer(), Some("bob"));
        assert!(output.contents().contains("Unknown user 'ghost'"));
    }

    #[tokio::test]
    async fn user_names_with_spaces() {
        let factory = RecordingFactory::default();
        let peers = PeerMap::from([("Alice Smith".to_string(), PeerAddress::new(Protocol::Http, "a", 80))]);
        let registry = Arc::new(DummyRegistry::with_peers(peers));
        let (mut session, _) = new_session("  :user   Alice    Smith\n:exit\n", registry, &factory);
        session.run().await.unwrap();
        assert_eq!(session.selected_peer(), Some("Alice Smith"));
    }

    #[tokio::test]
    async fn refresh_that_drops_selected_peer_clears_selection() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::scripted(vec![Some(bob()), Some(PeerMap::new())]));
        let (mut session, output) = new_session(":user bob\n:update\nhello\n:exit\n", registry, &factory);
        session.run().await.unwrap();
        let outcomes = session.wait_for_sends(SHUTDOWN_GRACE).await;
        assert!(matches!(outcomes.as_slice(), [SendOutcome::NotSelected]));
        assert_eq!(session.selected_peer(), None);
        assert!(session.peers().directory().await.is_empty());
        assert!(factory.created().is_empty());
        let output = output.contents();
        assert!(output.contains(SELECTED_REMOVED));
        assert!(output.contains(NOT_SELECTED));
    }

    #[tokio::test]
    async fn failed_refresh_changes_nothing() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::scripted(vec![Some(bob()), None]));
        let (mut session, output) = new_session(":user bob\n:update\n:exit\n", registry.clone(), &factory);
        session.run().await.unwrap();
        assert_eq!(registry.list_calls(), 2);
        assert_eq!(session.selected_peer(), Some("bob"));
        assert_eq!(session.peers().directory().await, PeerDirectory::from(bob()));
        assert!(output.contents().contains(REGISTRY_UNAVAILABLE));
    }

    #[tokio::test]
    async fn failing_send_does_not_stop_the_loop() {
        let factory = RecordingFactory::failing();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let (mut session, output) = new_session(":user bob\nhello\n:update\n:exit\n", registry.clone(), &factory);
        session.run().await.unwrap();
        let outcomes = session.wait_for_sends(SHUTDOWN_GRACE).await;
        assert!(matches!(outcomes.as_slice(), [SendOutcome::Failed(_)]));
        assert_eq!(registry.list_calls(), 2);
        assert!(session.state().terminated);
        assert!(output.contents().contains("Error! Connection failed."));
    }

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let (mut session, output) = new_session(":user bob\n\n   \n\t\n:exit\n", registry, &factory);
        session.run().await.unwrap();
        assert!(session.wait_for_sends(SHUTDOWN_GRACE).await.is_empty());
        assert!(factory.created().is_empty());
        assert!(factory.sent().is_empty());
        // the prompt is shown again for every blank line
        assert_eq!(output.contents().matches("  to [bob] <<< ").count(), 4);
    }

    #[tokio::test]
    async fn message_without_selection() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let (mut session, output) = new_session("hello\n:exit\n", registry, &factory);
        session.run().await.unwrap();
        session.wait_for_sends(SHUTDOWN_GRACE).await;
        assert!(output.contents().contains(NOT_SELECTED));
        assert!(factory.sent().is_empty());
    }

    #[tokio::test]
    async fn end_of_input_terminates() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let (mut session, _) = new_session(":user bob\n", registry, &factory);
        session.run().await.unwrap();
        assert!(session.state().terminated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rapid_messages_share_one_client() {
        let factory = RecordingFactory::default();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let (mut session, _) = new_session(":user bob\none\ntwo\nthree\n:exit\n", registry, &factory);
        session.run().await.unwrap();
        session.wait_for_sends(SHUTDOWN_GRACE).await;
        // earlier tasks may have been detached by the time we wait; give them a moment
        for _ in 0..100 {
            if factory.sent().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(factory.created().len(), 1);
        let mut texts = factory.sent().into_iter().map(|(_, m)| m.text).collect::<Vec<_>>();
        texts.sort();
        assert_eq!(texts, vec!["one", "three", "two"]);
    }

    #[tokio::test]
    async fn vanished_peer_is_reported() {
        let factory = RecordingFactory::default();
        let peers = PeerBook::new(Arc::new(factory.clone()));
        let buffer = SharedBuffer::default();
        let console = Console::new(buffer.clone());
        let outcome = deliver(&peers, &console, "me", Some("bob"), "hello".into(), None).await;
        assert!(matches!(outcome, SendOutcome::PeerDisappeared));
        assert!(buffer.contents().contains(PEER_DISAPPEARED));
    }

    struct HangingClient;

    #[async_trait]
    impl ChatClient for HangingClient {
        async fn send_message(&self, _message: &Message) -> Result<(), TransportError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct HangingFactory;

    impl ClientFactory for HangingFactory {
        fn create(&self, _address: &PeerAddress) -> Arc<dyn ChatClient> {
            Arc::new(HangingClient)
        }
    }

    #[tokio::test]
    async fn hung_send_times_out() {
        let peers = PeerBook::new(Arc::new(HangingFactory));
        peers.replace_directory(bob()).await;
        let buffer = SharedBuffer::default();
        let console = Console::new(buffer.clone());
        let limit = Duration::from_millis(50);
        let outcome = deliver(&peers, &console, "me", Some("bob"), "hello".into(), Some(limit)).await;
        assert!(matches!(outcome, SendOutcome::Failed(TransportError::Timeout(_))));
        assert!(buffer.contents().contains("Error! No response from peer"));
    }

    #[tokio::test]
    async fn hung_send_does_not_block_shutdown() {
        env_logger::try_init().ok();
        let registry = Arc::new(DummyRegistry::with_peers(bob()));
        let console = Console::new(SharedBuffer::default());
        let input = BufReader::new(":user bob\nhello\n:exit\n".as_bytes());
        let mut session = ChatSession::new("me", registry, Arc::new(HangingFactory), console, input);
        session.run().await.unwrap();
        let outcomes = tokio::time::timeout(Duration::from_secs(2), session.wait_for_sends(Duration::from_millis(100)))
            .await
            .expect("shutdown wait did not respect its grace period");
        assert!(outcomes.is_empty());
        // nothing is left to wait for on a second call
        assert!(session.wait_for_sends(Duration::from_millis(100)).await.is_empty());
    }
}
