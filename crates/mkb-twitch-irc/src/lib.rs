//! Twitch chat adapter (IRC over TCP).
//!
//! This crate implements the `mkb-core` ChatTransport port and turns inbound
//! `PRIVMSG` lines into chat events.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, error, info, warn};

pub mod message;
pub mod router;

use mkb_core::{
    domain::{ChannelName, ComponentVersion},
    errors::Error,
    messaging::{port::ChatTransport, types::ChatEvent},
    Result,
};

use crate::message::{sanitize, IrcMessage};

pub const COMPONENT: ComponentVersion = ComponentVersion {
    name: "mkb-twitch-irc",
    version: env!("CARGO_PKG_VERSION"),
};

/// Twitch lines carry tags and can be far longer than the classic 512 bytes.
const MAX_LINE_LEN: usize = 16 * 1024;
const EVENT_QUEUE: usize = 256;

/// Login for the chat connection.
#[derive(Clone)]
pub struct IrcLogin {
    pub username: String,
    pub oauth: String,
}

impl std::fmt::Debug for IrcLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcLogin")
            .field("username", &self.username)
            .field("oauth", &"<redacted>")
            .finish()
    }
}

/// Handle for sending on an established chat connection.
///
/// Outbound lines are queued to a writer task; the connection itself is owned
/// by the reader and writer tasks spawned in [`IrcTransport::connect`].
#[derive(Clone)]
pub struct IrcTransport {
    outgoing: mpsc::UnboundedSender<String>,
}

impl IrcTransport {
    /// Open a TCP connection and register. Returns the transport and the inbound event stream.
    pub async fn connect(
        host: &str,
        port: u16,
        login: &IrcLogin,
    ) -> Result<(Self, mpsc::Receiver<ChatEvent>)> {
        let stream = TcpStream::connect((host, port)).await?;
        info!(host, port, "connected to chat server");
        Ok(Self::start(stream, login))
    }

    /// Run the protocol over an already connected stream.
    pub fn start<S>(stream: S, login: &IrcLogin) -> (Self, mpsc::Receiver<ChatEvent>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let (ev_tx, ev_rx) = mpsc::channel::<ChatEvent>(EVENT_QUEUE);

        tokio::spawn(write_loop(writer, out_rx));
        tokio::spawn(read_loop(reader, out_tx.clone(), ev_tx));

        let transport = Self { outgoing: out_tx };
        for line in [
            format!("PASS oauth:{}", login.oauth),
            format!("NICK {}", login.username.to_lowercase()),
            "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
        ] {
            let _ = transport.outgoing.send(line);
        }
        (transport, ev_rx)
    }

    fn send_raw(&self, line: String) -> Result<()> {
        self.outgoing
            .send(line)
            .map_err(|_| Error::External("chat connection closed".to_string()))
    }
}

#[async_trait]
impl ChatTransport for IrcTransport {
    async fn join(&self, channel: &ChannelName) -> Result<()> {
        self.send_raw(format!("JOIN #{channel}"))
    }

    async fn leave(&self, channel: &ChannelName) -> Result<()> {
        self.send_raw(format!("PART #{channel}"))
    }

    async fn send(&self, channel: &ChannelName, text: &str) -> Result<()> {
        self.send_raw(format!("PRIVMSG #{channel} :{}", sanitize(text)))
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if !line.starts_with("PASS ") {
            debug!(line = %line, "irc >");
        }
        let framed = format!("{line}\r\n");
        if let Err(e) = writer.write_all(framed.as_bytes()).await {
            error!(error = %e, "chat write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(
    reader: R,
    outgoing: mpsc::UnboundedSender<String>,
    events: mpsc::Sender<ChatEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    while let Some(next) = lines.next().await {
        let line = match next {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "chat read failed");
                break;
            }
        };
        let Some(msg) = IrcMessage::parse(&line) else {
            continue;
        };
        match msg.command.as_str() {
            "PING" => {
                let token = msg.params.first().map(String::as_str).unwrap_or("");
                let _ = outgoing.send(format!("PONG :{token}"));
            }
            "PRIVMSG" => {
                if let Some(ev) = msg.to_chat_event() {
                    if events.send(ev).await.is_err() {
                        break;
                    }
                }
            }
            "NOTICE" => {
                let notice = msg.params.last().map(String::as_str).unwrap_or("");
                info!(notice, "server notice");
            }
            "RECONNECT" => warn!("server requested reconnect"),
            _ => debug!(command = %msg.command, "irc <"),
        }
    }
    info!("chat connection closed");
}
