//! Line-driven demo of the session engine.
//!
//! Reads commands from stdin and prints what the presentation layer would
//! receive:
//!
//! ```text
//! start <falling_collector|grid_snake_collector|scroll_runner>
//! <up|down|left|right|dash_left|dash_right>
//! tick        (only with ARCADE_TICK_PERIOD_MS=0)
//! abort
//! ```

#![deny(unsafe_code)]

use anyhow::Context;
use arcade_server::{
    AlwaysReady, ChannelSink, EngineConfig, InMemoryLedger, SessionEngine, SinkEvent,
    StartOutcome, StaticCollection,
};
use arcade_sim::{OwnerId, Variant};
use arcade_wire::ActionEventProto;
use prost::Message;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const OWNER: OwnerId = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,arcade_server=info".into()),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env().context("reading ARCADE_* configuration")?;
    info!(
        tick_period_ms = config.tick_period_ms,
        transcripts = ?config.transcript_dir,
        "arcade_demo.starting"
    );

    let (sink, mut events) = ChannelSink::new();
    let engine = SessionEngine::new(
        config,
        InMemoryLedger::new(),
        StaticCollection::new(),
        sink,
        AlwaysReady,
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::Frame(frame) => {
                    println!(
                        "score {}/{}  ticks left {}  ({} bytes)",
                        frame.score,
                        frame.score_cap,
                        frame.remaining_ticks,
                        frame.encoded_len()
                    );
                    for row in &frame.rows {
                        println!("  {row}");
                    }
                    println!("  [{}]", frame.affordances.join(" "));
                }
                SinkEvent::Ended(ended) => {
                    println!(
                        "ended: {} score {} reward {} {}{}",
                        ended.end_reason,
                        ended.score,
                        ended.reward_amount,
                        ended.reward_kind,
                        if ended.credited { "" } else { " (not credited)" }
                    );
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => {}
            (Some("start"), Some(name)) => {
                let Some(variant) = Variant::parse(name) else {
                    println!("unknown variant {name:?}");
                    continue;
                };
                match engine.request_session(OWNER, variant).await {
                    StartOutcome::Started(frame) => println!("{}", frame.to_text()),
                    StartOutcome::AlreadyActive => println!("a session is already running"),
                    StartOutcome::Rejected(reason) => println!("rejected: {reason}"),
                }
            }
            (Some("tick"), None) => {
                println!("{:?}", engine.run_tick(OWNER).await);
            }
            (Some("abort"), None) => {
                if !engine.abort_session(OWNER, "player quit").await {
                    println!("nothing to abort");
                }
            }
            (Some(word), None) => {
                let event = ActionEventProto {
                    owner_id: OWNER,
                    action: word.to_string(),
                };
                match engine.apply_event(event).await {
                    Ok(outcome) => println!("{outcome:?}"),
                    Err(_) => println!("unknown command {line:?}"),
                }
            }
            _ => println!("unknown command {line:?}"),
        }
    }

    let aborted = engine.abort_all("stdin closed").await;
    info!(aborted, "arcade_demo.stopping");
    drop(engine);
    printer.await.context("printer task")?;
    Ok(())
}
