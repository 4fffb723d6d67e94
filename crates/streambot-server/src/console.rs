//! Line-oriented chat transport over stdin/stdout.
//!
//! Inbound lines:
//!   `<user_id> <display_name>[ badges=vip/1,subscriber/12]: <text>`
//!   `@notice <source> <kind> [key=value ...]`
//! Outbound messages are written as `[<channel>] <text>`.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, bail};
use streambot_engine::Engine;
use streambot_engine::error::SinkError;
use streambot_engine::sinks::ChatSink;
use streambot_types::events::{ChatLine, InboundEvent, Notice};
use streambot_types::models::Badges;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One message waiting for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub channel: String,
    pub text: String,
}

/// `ChatSink` feeding the stdout writer.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Outbound>,
}

pub fn outbound() -> (OutboundQueue, mpsc::UnboundedReceiver<Outbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundQueue { tx }, rx)
}

impl ChatSink for OutboundQueue {
    fn send(&self, channel: &str, text: &str) -> Result<(), SinkError> {
        self.tx
            .send(Outbound {
                channel: channel.to_string(),
                text: text.to_string(),
            })
            .map_err(|_| SinkError("console writer stopped".into()))
    }
}

pub async fn write_outbound(mut rx: mpsc::UnboundedReceiver<Outbound>, cancel: CancellationToken) {
    let mut stdout = tokio::io::stdout();
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let line = format!("[{}] {}\n", msg.channel, msg.text);
        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            warn!("Failed to write chat message: {}", e);
            continue;
        }
        let _ = stdout.flush().await;
    }
}

/// Reads stdin until EOF or cancellation and dispatches each line in order.
pub async fn run_console(engine: Arc<Engine>, main_channel: String, cancel: CancellationToken) {
    // A blocking stdin read cannot be cancelled, so it lives on its own
    // thread and the process may exit without joining it.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    info!(channel = %main_channel, "Console transport ready");
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = rx.recv() => match line {
                Some(line) => line,
                None => {
                    info!("Console input closed");
                    break;
                }
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_line(&line, &main_channel) {
            Ok(event) => event,
            Err(e) => {
                warn!("Unreadable console line: {:#}", e);
                continue;
            }
        };

        let engine = engine.clone();
        match tokio::task::spawn_blocking(move || engine.handle_event(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error handling chat event: {}", e),
            Err(e) => warn!("Dispatch task failed: {}", e),
        }
    }
    debug!("Console transport stopped");
}

pub fn parse_line(line: &str, channel: &str) -> anyhow::Result<InboundEvent> {
    if let Some(rest) = line.strip_prefix("@notice") {
        return parse_notice(rest, channel);
    }

    let (head, text) = line
        .split_once(':')
        .context("expected '<user_id> <name>: <text>'")?;
    let mut fields = head.split_whitespace();
    let (Some(user_id), Some(display_name)) = (fields.next(), fields.next()) else {
        bail!("expected a user id and a display name before ':'");
    };

    let mut badges = Badges::new();
    for field in fields {
        let Some(list) = field.strip_prefix("badges=") else {
            bail!("unexpected field '{field}'");
        };
        badges.extend(parse_badges(list)?);
    }

    Ok(InboundEvent::ChatLine(ChatLine {
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
        color: String::new(),
        badges,
        channel: channel.to_string(),
        text: text.strip_prefix(' ').unwrap_or(text).to_string(),
    }))
}

/// `vip/1,subscriber/12`; a badge without a tier is tier 1.
fn parse_badges(list: &str) -> anyhow::Result<Badges> {
    list.split(',')
        .filter(|b| !b.is_empty())
        .map(|badge| -> anyhow::Result<(String, u32)> {
            match badge.split_once('/') {
                Some((name, tier)) => {
                    let tier = tier
                        .parse::<u32>()
                        .with_context(|| format!("bad tier in badge '{badge}'"))?;
                    Ok((name.to_string(), tier))
                }
                None => Ok((badge.to_string(), 1)),
            }
        })
        .collect()
}

/// `user_id` and `user` fill the notice's identity; every pair stays in the payload.
fn parse_notice(rest: &str, channel: &str) -> anyhow::Result<InboundEvent> {
    let mut fields = rest.split_whitespace();
    let (Some(source), Some(kind)) = (fields.next(), fields.next()) else {
        bail!("expected '@notice <source> <kind>'");
    };

    let payload = fields
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("expected key=value, got '{pair}'"))
        })
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    Ok(InboundEvent::Notice(Notice {
        source: source.to_string(),
        kind: kind.to_string(),
        user_id: payload.get("user_id").cloned().unwrap_or_default(),
        display_name: payload.get("user").cloned().unwrap_or_default(),
        channel: channel.to_string(),
        payload,
    }))
}
