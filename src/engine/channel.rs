//! Actor wrapping one UCI engine process. Commands go in through an
//! unbounded writer channel, replies come back as mailbox messages
//! from a line-reader task, so all engine state lives on the actor.

use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;

use actix::prelude::*;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::engine::protocol::{
    self, BestMovePayload, CommandGate, CoordMove, EngineReply, CMD_HANDSHAKE, CMD_QUIT,
    CMD_STOP,
};
use crate::game::scheduler::SearchTicket;

const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Ask the engine for the best move in the ticket's position. The
/// answer is delivered to `reply_to` as a [`SearchCompleted`].
#[derive(Message)]
#[rtype(result = "()")]
pub struct Evaluate {
    pub ticket: SearchTicket,
    pub reply_to: Recipient<SearchCompleted>,
}

/// A finished search. `best` is `None` when the engine reported no
/// legal move or its answer did not decode.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SearchCompleted {
    pub ticket: SearchTicket,
    pub best: Option<CoordMove>,
}

/// Abandon the search in flight, if any.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CancelSearch;

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// One line of engine stdout, forwarded by the reader task.
#[derive(Message)]
#[rtype(result = "()")]
struct EngineLine(String);

/// One issued `go`, still awaiting its `bestmove`. A cancelled or
/// superseded search keeps its slot with `reply_to` cleared: the
/// engine answers every `go` exactly once and in order, so its
/// `bestmove` must be drained against this slot, never delivered.
struct SearchSlot {
    ticket: SearchTicket,
    reply_to: Option<Recipient<SearchCompleted>>,
}

pub struct EngineChannel {
    engine_path: String,
    gate: CommandGate,
    to_engine: Option<mpsc::UnboundedSender<String>>,
    searches: VecDeque<SearchSlot>,
    child: Option<Child>,
}

impl EngineChannel {
    pub fn new(engine_path: String) -> Self {
        Self {
            engine_path,
            gate: CommandGate::new(),
            to_engine: None,
            searches: VecDeque::new(),
            child: None,
        }
    }

    fn send_raw(&self, line: String) {
        if let Some(tx) = &self.to_engine {
            if tx.send(line).is_err() {
                warn!("engine stdin is gone; command dropped");
            }
        } else {
            debug!("no engine process; command dropped");
        }
    }

    /// Route a command through the handshake gate.
    fn dispatch(&mut self, command: String) {
        if let Some(command) = self.gate.submit(command) {
            self.send_raw(command);
        }
    }

    /// Detach every outstanding search from its caller. Returns true
    /// if any of them was still live.
    fn abandon_searches(&mut self) -> bool {
        let mut live = false;
        for slot in &mut self.searches {
            if slot.reply_to.take().is_some() {
                live = true;
            }
        }
        live
    }
}

impl Actor for EngineChannel {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let mut command = Command::new(&self.engine_path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                // The session stays up; the opponent just never moves.
                warn!("failed to start engine '{}': {}", self.engine_path, err);
                return;
            }
        };
        info!("engine process started: {}", self.engine_path);

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(mut stdin) = child.stdin.take() {
            actix_rt::spawn(async move {
                while let Some(line) = rx.recv().await {
                    if stdin.write_all(line.as_bytes()).await.is_err()
                        || stdin.write_all(b"\n").await.is_err()
                        || stdin.flush().await.is_err()
                    {
                        break;
                    }
                }
            });
        }
        if let Some(stdout) = child.stdout.take() {
            let addr = ctx.address();
            actix_rt::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    addr.do_send(EngineLine(line));
                }
                debug!("engine stdout closed");
            });
        }

        // The handshake itself must not wait behind the gate.
        if tx.send(CMD_HANDSHAKE.to_string()).is_err() {
            warn!("engine stdin closed before the handshake");
        }
        self.to_engine = Some(tx);
        self.child = Some(child);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(tx) = &self.to_engine {
            let _ = tx.send(CMD_QUIT.to_string());
        }
        if let Some(mut child) = self.child.take() {
            actix_rt::spawn(async move {
                if tokio::time::timeout(QUIT_GRACE, child.wait()).await.is_err() {
                    warn!("engine ignored quit; killing the process");
                    let _ = child.start_kill();
                }
            });
        }
    }
}

impl Handler<Evaluate> for EngineChannel {
    type Result = ();

    fn handle(&mut self, msg: Evaluate, _ctx: &mut Self::Context) {
        // The caller only issues one search at a time; a second
        // Evaluate means the previous one was invalidated. Its slot
        // stays in the queue so the late bestmove drains against it.
        if self.abandon_searches() {
            debug!("superseding an in-flight search");
        }
        let position = protocol::position_command(&msg.ticket.fen);
        let go = protocol::go_command(msg.ticket.depth);
        self.searches.push_back(SearchSlot {
            ticket: msg.ticket,
            reply_to: Some(msg.reply_to),
        });
        self.dispatch(position);
        self.dispatch(go);
    }
}

impl Handler<CancelSearch> for EngineChannel {
    type Result = ();

    fn handle(&mut self, _msg: CancelSearch, _ctx: &mut Self::Context) {
        if self.abandon_searches() {
            self.dispatch(CMD_STOP.to_string());
        }
    }
}

impl Handler<Shutdown> for EngineChannel {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

impl Handler<EngineLine> for EngineChannel {
    type Result = ();

    fn handle(&mut self, msg: EngineLine, _ctx: &mut Self::Context) {
        match protocol::parse_engine_line(&msg.0) {
            Some(EngineReply::UciOk) => {
                debug!("engine handshake complete");
                for command in self.gate.handshake_complete() {
                    self.send_raw(command);
                }
            }
            Some(EngineReply::BestMove(payload)) => {
                let best = match payload {
                    BestMovePayload::Move(mv) => Some(mv),
                    BestMovePayload::NoMove => None,
                    BestMovePayload::Malformed => {
                        warn!("unparseable bestmove line: {:?}", msg.0);
                        None
                    }
                };
                match self.searches.pop_front() {
                    Some(SearchSlot {
                        ticket,
                        reply_to: Some(reply_to),
                    }) => {
                        reply_to.do_send(SearchCompleted { ticket, best });
                    }
                    Some(SearchSlot { reply_to: None, .. }) => {
                        debug!("drained answer to an abandoned search");
                    }
                    None => debug!("bestmove with no search in flight"),
                }
            }
            None => {}
        }
    }
}
