use crate::runtime::{sleep, tokio};
use crate::services::Status;
use crate::services::rpc::{HelloRequest, ReqId, Request, Response};
use crate::services::store::subscription::Subscription;
use crate::services::types::Credentials;
use crate::{Error, Result};
use futures::{Sink as FutSink, SinkExt, Stream, StreamExt};
use reqwest::Client;
use reqwest_websocket::{Message, RequestBuilderExt};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};
use url::Url;
#[cfg(target_family = "wasm")]
use wasmtimer::{std::Instant, tokio::timeout};
#[cfg(not(target_family = "wasm"))]
use {std::time::Instant, tokio::time::timeout};

const PONG: &str = "pong!";
const HELLO_ID: i32 = -1;

macro_rules! live_methods {
    ($($Variant:ident: $camel:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy)]
        pub enum LiveMethod { $($Variant),+ }

        impl LiveMethod {
            pub const fn camel(self) -> &'static str {
                match self {
                    $( Self::$Variant => $camel ),+
                }
            }
        }
    };
}

live_methods!(
    Hello: "hello",
    Ping: "ping",
    ListenDocument: "listenDocument",
    ListenQuery: "listenQuery",
    Unlisten: "unlisten",
);

type Sink = mpsc::UnboundedSender<Result<Value>>;

enum Command {
    Call {
        id: ReqId,
        payload: Value,
        reply_tx: oneshot::Sender<std::result::Result<Option<Value>, Status>>,
    },
    Listen {
        id: ReqId,
        payload: Value,
        sink: Sink,
    },
    Unlisten {
        id: ReqId,
    },
}

fn encode_message<Q: Serialize>(value: &Q) -> Result<Message> {
    Ok(Message::Text(serde_json::to_string(value)?))
}

async fn socket_task<W, R, E>(
    mut write: W,
    mut read: R,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    hello: HelloRequest,
    hello_tx: oneshot::Sender<Result<()>>,
) -> Result<()>
where
    W: FutSink<Message> + Unpin,
    R: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: std::fmt::Debug,
    Error: From<W::Error> + From<E>,
{
    let mut pending =
        HashMap::<ReqId, oneshot::Sender<std::result::Result<Option<Value>, Status>>>::new();
    let mut listeners = HashMap::<ReqId, Sink>::new();

    trace!(target: "ws", method = %hello.request.method, "sending HELLO");
    write.send(encode_message(&hello)?).await?;

    let mut hello_tx = Some(hello_tx);
    let outcome = loop {
        tokio::select! {
            Some(cmd) = cmd_rx.recv() => match cmd {
                Command::Call { id, payload, reply_tx } => {
                    pending.insert(id, reply_tx);
                    write.send(encode_message(&payload)?).await?;
                }
                Command::Listen { id, payload, sink } => {
                    debug!(target: "ws", ?id, "listen");
                    listeners.insert(id, sink);
                    write.send(encode_message(&payload)?).await?;
                }
                Command::Unlisten { id } => {
                    if listeners.remove(&id).is_some() {
                        debug!(target: "ws", ?id, "unlisten");
                        let request = Request {
                            id: None,
                            method: LiveMethod::Unlisten.camel().to_string(),
                            params: vec![id],
                        };
                        write.send(encode_message(&request)?).await?;
                    }
                }
            },

            Some(message) = read.next() => {
                trace!(target: "ws", ?message, "Got message");

                let response: Response<Value> = match message? {
                    Message::Text(text) if text == PONG => continue,
                    Message::Text(text) => serde_json::from_str(&text)?,
                    Message::Binary(bytes) if bytes == PONG.as_bytes() => continue,
                    Message::Binary(bytes) => serde_json::from_slice(&bytes)?,
                    Message::Ping(payload) => {
                        trace!(target: "ws", ?payload, "Received ping, replying...");
                        write.send(Message::Pong(payload)).await?;
                        continue;
                    }
                    Message::Close { .. } => break Ok(()),
                    _ => continue,
                };

                if response.id == Some(ReqId::Num(HELLO_ID)) {
                    let Some(hello_tx) = hello_tx.take() else {
                        // Just ignore any extra HELLOs
                        continue;
                    };

                    let reply = match response.into_result() {
                        Ok(_) => Ok(()),
                        Err(status) => {
                            error!(target: "ws", %status, "HELLO rejected");
                            Err(Error::ServiceError(status))
                        }
                    };

                    let _ = hello_tx.send(reply);
                    continue;
                }

                let Some(id) = response.id.clone() else {
                    warn!(target: "ws", "Frame without id");
                    continue;
                };

                if let Some(tx) = pending.remove(&id) {
                    let _ = tx.send(response.into_result());
                    continue;
                }

                let terminate = response.terminate.unwrap_or(false);

                match (listeners.get(&id), response.into_result()) {
                    (Some(sink), Ok(Some(value))) => {
                        let _ = sink.send(Ok(value));
                    }
                    (Some(sink), Ok(None)) => {
                        let _ = sink.send(Ok(Value::Null));
                    }
                    (Some(sink), Err(status)) => {
                        let _ = sink.send(Err(Error::ServiceError(status)));
                        listeners.remove(&id);
                        continue;
                    }
                    (None, _) => {
                        trace!(target: "ws", ?id, "Frame for a closed listener");
                        continue;
                    }
                }

                if terminate {
                    listeners.remove(&id);
                }
            }

            else => break Ok(()),
        }
    };

    for (_, sink) in listeners.drain() {
        let _ = sink.send(Err(Error::SubscriptionClosed));
    }

    outcome
}

async fn ping_task(cmd_tx: UnboundedSender<Command>, next_id: Arc<AtomicI32>) -> Result<()> {
    const PING_INTERVAL: Duration = Duration::from_secs(10);
    const HANG_TIMEOUT: Duration = Duration::from_secs(60 * 5);

    let mut last_pong = Instant::now();

    loop {
        sleep(PING_INTERVAL).await;

        trace!(target: "ws", "Pinging server");

        let id = ReqId::Num(next_id.fetch_add(1, Ordering::Relaxed));
        let payload = serde_json::to_value(Request {
            id: Some(id.clone()),
            method: LiveMethod::Ping.camel().to_string(),
            params: Vec::<()>::new(),
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        if cmd_tx
            .send(Command::Call {
                id,
                payload,
                reply_tx,
            })
            .is_err()
        {
            return Err(Error::SubscriptionClosed);
        }

        match timeout(PING_INTERVAL, reply_rx).await {
            Ok(Ok(_)) => last_pong = Instant::now(),
            Ok(Err(_)) => return Err(Error::SubscriptionClosed),
            Err(_) if last_pong.elapsed() > HANG_TIMEOUT => {
                error!(target: "ws", "No ping response from server, closing socket");
                return Err(Error::Other("live channel hung"));
            }
            Err(_) => {}
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct WsBackendOpts {
    /// How long to wait for the server's HELLO response before timing out
    pub hello_timeout: Duration,
}

impl Default for WsBackendOpts {
    fn default() -> Self {
        Self {
            hello_timeout: Duration::from_secs(10),
        }
    }
}

struct WsBackendInner {
    cmd_tx: UnboundedSender<Command>,
    next_id: Arc<AtomicI32>,
    credentials: Credentials,
    handle: JoinHandle<()>,
}

impl Drop for WsBackendInner {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Live listen channel of the document store.
#[derive(Clone)]
pub struct WsBackend {
    inner: Arc<WsBackendInner>,
}

impl WsBackend {
    pub async fn connect(url: Url, credentials: Credentials, opts: WsBackendOpts) -> Result<Self> {
        let token = credentials
            .current()
            .map(|credential| credential.token().expose_secret().to_owned());

        let mut request = Client::default().get(url);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }

        let ws = request.upgrade().send().await?.into_websocket().await?;

        let (write, read) = ws.split();
        let (hello_tx, hello_rx) = oneshot::channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let next_id = Arc::new(AtomicI32::new(1));

        let hello = HelloRequest {
            request: Request {
                id: Some(ReqId::Num(HELLO_ID)),
                method: LiveMethod::Hello.camel().to_string(),
                params: Vec::new(),
            },
            token,
        };

        let socket_handle = async move {
            if let Err(e) = socket_task(write, read, cmd_rx, hello, hello_tx).await {
                warn!(target: "ws", ?e, "socket task crashed");
            }
        };

        let ping_handle = {
            let cmd_tx = cmd_tx.clone();
            let next_id = next_id.clone();
            async move {
                if let Err(e) = ping_task(cmd_tx, next_id).await {
                    warn!(target: "ws", ?e, "ping task ended");
                }
            }
        };

        let handle = tokio::task::spawn(async move {
            tokio::select! {
                _ = socket_handle => {},
                _ = ping_handle => {},
            }
        });

        match timeout(opts.hello_timeout, hello_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(e),
            Err(_) => return Err(Error::Other("timed out waiting for HELLO")),
            _ => return Err(Error::Other("HELLO channel closed unexpectedly")),
        }

        Ok(Self {
            inner: Arc::new(WsBackendInner {
                cmd_tx,
                next_id,
                credentials,
                handle,
            }),
        })
    }

    /// Opens a listen target; every frame the server pushes for it becomes
    /// one item of the returned subscription.
    pub fn listen(&self, method: LiveMethod, target: Value) -> Subscription<Value> {
        let id = ReqId::Num(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let token = self
            .inner
            .credentials
            .current()
            .map(|credential| Value::String(credential.token().expose_secret().to_owned()))
            .unwrap_or(Value::Null);

        let payload = match serde_json::to_value(Request {
            id: Some(id.clone()),
            method: method.camel().to_string(),
            params: vec![target, token],
        }) {
            Ok(payload) => payload,
            Err(error) => return Subscription::failed(error.into()),
        };

        let (sink, rx) = mpsc::unbounded_channel();
        if let Err(mpsc::error::SendError(Command::Listen { sink, .. })) =
            self.inner.cmd_tx.send(Command::Listen {
                id: id.clone(),
                payload,
                sink,
            })
        {
            let _ = sink.send(Err(Error::SubscriptionClosed));
        }

        let cmd_tx = self.inner.cmd_tx.clone();
        Subscription::from_receiver(rx, move || {
            let _ = cmd_tx.send(Command::Unlisten { id });
        })
    }
}

#[cfg(test)]
impl WsBackend {
    /// Backend whose commands are handed to the caller instead of a socket.
    fn detached(credentials: Credentials) -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let backend = Self {
            inner: Arc::new(WsBackendInner {
                cmd_tx,
                next_id: Arc::new(AtomicI32::new(1)),
                credentials,
                handle: tokio::task::spawn(async {}),
            }),
        };

        (backend, cmd_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::types::Credential;
    use futures::channel::mpsc as channel;
    use serde_json::json;
    use tokio::sync::watch;

    struct Server {
        inbox: channel::UnboundedReceiver<Message>,
        outbox: channel::UnboundedSender<Result<Message>>,
        cmd_tx: UnboundedSender<Command>,
        task: JoinHandle<Result<()>>,
    }

    impl Server {
        async fn start() -> Self {
            let (write, inbox) = channel::unbounded::<Message>();
            let (outbox, read) = channel::unbounded::<Result<Message>>();
            let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
            let (hello_tx, hello_rx) = oneshot::channel();

            let hello = HelloRequest {
                request: Request {
                    id: Some(ReqId::Num(HELLO_ID)),
                    method: LiveMethod::Hello.camel().to_string(),
                    params: Vec::new(),
                },
                token: Some("t1".to_owned()),
            };

            let write = write.sink_map_err(|_| Error::SubscriptionClosed);
            let task = tokio::spawn(socket_task(write, read, cmd_rx, hello, hello_tx));

            let mut server = Self {
                inbox,
                outbox,
                cmd_tx,
                task,
            };

            let greeting = server.received().await;
            assert_eq!(greeting["method"], "hello");
            assert_eq!(greeting["token"], "t1");

            server.push(json!({"id": HELLO_ID, "result": "ok"}));
            hello_rx.await.unwrap().unwrap();

            server
        }

        async fn received(&mut self) -> Value {
            match self.inbox.next().await {
                Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
                other => panic!("text frame expected, got {other:?}"),
            }
        }

        fn push(&self, frame: Value) {
            self.outbox
                .unbounded_send(Ok(Message::Text(frame.to_string())))
                .unwrap();
        }

        async fn listen(&mut self, id: i32) -> mpsc::UnboundedReceiver<Result<Value>> {
            let (sink, rx) = mpsc::unbounded_channel();
            self.cmd_tx
                .send(Command::Listen {
                    id: ReqId::Num(id),
                    payload: json!({"id": id, "method": "listenDocument", "params": ["users/U1"]}),
                    sink,
                })
                .unwrap_or_else(|_| panic!("socket task stopped"));

            assert_eq!(self.received().await["id"], id);
            rx
        }

        fn unlisten(&self, id: i32) {
            self.cmd_tx
                .send(Command::Unlisten { id: ReqId::Num(id) })
                .unwrap_or_else(|_| panic!("socket task stopped"));
        }
    }

    fn denied(id: i32) -> Value {
        json!({"id": id, "error": {"severity": "ERROR", "code": "permission-denied"}})
    }

    #[tokio::test]
    async fn frames_reach_their_listener() {
        let mut server = Server::start().await;
        let mut rx = server.listen(1).await;

        server.push(json!({"id": 1, "result": null}));
        server.push(json!({"id": 1, "result": {"name": "Bob"}}));
        server.push(json!({"id": 7, "result": {"name": "Nobody"}}));
        server.push(json!({"id": 1, "result": {"name": "Bobby"}, "terminate": true}));
        server.push(json!({"id": 1, "result": {"name": "Late"}}));

        assert_eq!(rx.recv().await.unwrap().unwrap(), Value::Null);
        assert_eq!(rx.recv().await.unwrap().unwrap(), json!({"name": "Bob"}));
        assert_eq!(rx.recv().await.unwrap().unwrap(), json!({"name": "Bobby"}));
        assert!(rx.recv().await.is_none());

        // The listener is gone, so no unlisten frame goes out.
        server.unlisten(1);
        let _rx = server.listen(2).await;
    }

    #[tokio::test]
    async fn error_frame_closes_listener() {
        let mut server = Server::start().await;
        let mut rx = server.listen(1).await;

        server.push(denied(1));

        let error = rx.recv().await.unwrap().unwrap_err();
        assert!(matches!(error, Error::ServiceError(status) if status.code == "permission-denied"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unlisten_is_sent_once() {
        let mut server = Server::start().await;
        let _rx = server.listen(3).await;

        server.unlisten(3);
        server.unlisten(3);

        let frame = server.received().await;
        assert_eq!(frame["method"], "unlisten");
        assert_eq!(frame["params"], json!([3]));

        let _rx = server.listen(4).await;
    }

    #[tokio::test]
    async fn calls_are_answered_and_open_listeners_closed_on_shutdown() {
        let mut server = Server::start().await;
        let mut rx = server.listen(1).await;

        let (reply_tx, reply_rx) = oneshot::channel();
        server
            .cmd_tx
            .send(Command::Call {
                id: ReqId::Num(5),
                payload: json!({"id": 5, "method": "ping", "params": []}),
                reply_tx,
            })
            .unwrap_or_else(|_| panic!("socket task stopped"));
        assert_eq!(server.received().await["method"], "ping");

        server.push(json!({"id": 5, "result": "pong"}));
        assert_eq!(reply_rx.await.unwrap().unwrap(), Some(json!("pong")));

        let Server {
            outbox,
            cmd_tx,
            task,
            ..
        } = server;
        drop(outbox);
        drop(cmd_tx);

        task.await.unwrap().unwrap();
        assert!(matches!(rx.recv().await, Some(Err(Error::SubscriptionClosed))));
    }

    #[tokio::test]
    async fn cancelling_a_listen_sends_unlisten() {
        let (_credential_tx, credential_rx) =
            watch::channel(Some(Credential::new("U1", None, "t1")));
        let (backend, mut commands) = WsBackend::detached(Credentials::new(credential_rx));

        let subscription = backend.listen(LiveMethod::ListenDocument, json!("users/U1"));

        let id = match commands.recv().await {
            Some(Command::Listen { id, payload, .. }) => {
                assert_eq!(payload["method"], "listenDocument");
                assert_eq!(payload["params"], json!(["users/U1", "t1"]));
                id
            }
            _ => panic!("listen command expected"),
        };

        subscription.cancel();
        drop(subscription);

        match commands.recv().await {
            Some(Command::Unlisten { id: unlisten }) => assert_eq!(unlisten, id),
            _ => panic!("unlisten command expected"),
        }
        assert!(commands.try_recv().is_err());
    }
}
