//! One websocket connection is one game against the engine. The actor
//! owns the session, the input controller and the scheduler, talks to
//! its own [`EngineChannel`] actor, and pushes JSON updates to the
//! browser.

use std::str::FromStr;
use std::time::Duration;

use actix::prelude::*;
use actix_web::web;
use actix_web_actors::ws;
use chess::Square;
use log::{debug, info, warn};

use crate::config::Config;
use crate::engine::channel::{CancelSearch, EngineChannel, Evaluate, SearchCompleted, Shutdown};
use crate::game::controller::{InputOutcome, MoveController};
use crate::game::scheduler::{Difficulty, OpponentMoveScheduler, ReplyOutcome, HUMAN_SIDE};
use crate::game::session::GameSession;
use crate::models::{ClientMessage, ServerMessage};

/// Small pause before the engine is consulted, so that shallow-depth
/// replies still read as the opponent taking a turn.
const ENGINE_MOVE_DELAY: Duration = Duration::from_millis(300);

pub struct PlaySocket {
    pub id: String,
    config: web::Data<Config>,
    session: GameSession,
    controller: MoveController,
    scheduler: OpponentMoveScheduler,
    engine: Option<Addr<EngineChannel>>,
}

impl PlaySocket {
    pub fn new(id: String, config: web::Data<Config>) -> Self {
        Self {
            id,
            config,
            session: GameSession::new(),
            controller: MoveController::new(),
            scheduler: OpponentMoveScheduler::new(Difficulty::default()),
            engine: None,
        }
    }

    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(text) => ctx.text(text),
            Err(err) => warn!("failed to serialize server message: {}", err),
        }
    }

    fn send_state(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let msg = ServerMessage::state(
            &self.session,
            self.scheduler.difficulty(),
            self.scheduler.has_pending(),
        );
        self.send(ctx, &msg);
    }

    /// If the engine is due to move, hand out a ticket and arrange for
    /// it to reach the engine after a short delay. The ticket is
    /// re-checked when the timer fires so a reset in between wins.
    fn maybe_schedule_engine(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let ticket = match self.scheduler.next_request(&self.session) {
            Some(ticket) => ticket,
            None => return,
        };
        ctx.run_later(ENGINE_MOVE_DELAY, move |act, ctx| {
            if !ticket.matches(&act.session) {
                debug!("search request invalidated before dispatch");
                return;
            }
            if let Some(engine) = &act.engine {
                engine.do_send(Evaluate {
                    ticket,
                    reply_to: ctx.address().recipient(),
                });
            }
        });
    }

    fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg.action.as_str() {
            "select" => match parse_square(msg.square.as_deref()) {
                Some(square) => self.handle_select(square, ctx),
                None => self.send(ctx, &ServerMessage::error("select requires a square")),
            },
            "drop" => {
                match (
                    parse_square(msg.from.as_deref()),
                    parse_square(msg.to.as_deref()),
                ) {
                    (Some(from), Some(to)) => self.handle_drop(from, to, ctx),
                    _ => self.send(
                        ctx,
                        &ServerMessage::error("drop requires from and to squares"),
                    ),
                }
            }
            "reset" => self.handle_reset(ctx),
            "set_difficulty" => match msg.difficulty.as_deref().and_then(Difficulty::parse) {
                Some(difficulty) => self.handle_set_difficulty(difficulty, ctx),
                None => self.send(ctx, &ServerMessage::error("unknown difficulty")),
            },
            other => {
                self.send(
                    ctx,
                    &ServerMessage::error(&format!("unknown action: {}", other)),
                );
            }
        }
    }

    fn handle_select(&mut self, square: Square, ctx: &mut ws::WebsocketContext<Self>) {
        if !self.is_human_turn() {
            self.send(ctx, &ServerMessage::highlights_cleared());
            return;
        }
        let outcome = self.controller.square_activated(&mut self.session, square);
        self.apply_outcome(outcome, ctx);
    }

    fn handle_drop(&mut self, from: Square, to: Square, ctx: &mut ws::WebsocketContext<Self>) {
        if !self.is_human_turn() {
            self.send(ctx, &ServerMessage::highlights_cleared());
            return;
        }
        let outcome = self.controller.drag_dropped(&mut self.session, from, to);
        self.apply_outcome(outcome, ctx);
    }

    fn is_human_turn(&self) -> bool {
        self.session.turn() == HUMAN_SIDE
    }

    fn apply_outcome(&mut self, outcome: InputOutcome, ctx: &mut ws::WebsocketContext<Self>) {
        match outcome {
            InputOutcome::Ignored => {
                self.send(ctx, &ServerMessage::highlights_cleared());
            }
            InputOutcome::Selected { origin, targets } => {
                self.send(ctx, &ServerMessage::highlights(origin, &targets));
            }
            InputOutcome::Deselected => {
                self.send(ctx, &ServerMessage::highlights_cleared());
            }
            InputOutcome::Moved(record) => {
                info!("{} played {}", self.id, record.san);
                self.send(ctx, &ServerMessage::highlights_cleared());
                self.maybe_schedule_engine(ctx);
                self.send_state(ctx);
            }
            InputOutcome::Rejected(rejected) => {
                self.send(ctx, &ServerMessage::highlights_cleared());
                self.send(ctx, &ServerMessage::error(&rejected.to_string()));
            }
        }
    }

    fn handle_reset(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        info!("{} reset the game", self.id);
        self.session.reset();
        self.controller.clear();
        self.scheduler.on_reset();
        if let Some(engine) = &self.engine {
            engine.do_send(CancelSearch);
        }
        self.send(ctx, &ServerMessage::highlights_cleared());
        self.send_state(ctx);
    }

    fn handle_set_difficulty(
        &mut self,
        difficulty: Difficulty,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        info!("{} switched difficulty to {}", self.id, difficulty.label());
        self.scheduler.set_difficulty(difficulty, &mut self.session);
        self.controller.clear();
        if let Some(engine) = &self.engine {
            engine.do_send(CancelSearch);
        }
        self.send(ctx, &ServerMessage::highlights_cleared());
        self.send_state(ctx);
    }
}

impl Actor for PlaySocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("play connection started: {}", self.id);
        self.engine = Some(EngineChannel::new(self.config.engine_path.clone()).start());
        self.send_state(ctx);
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        info!("play connection closed: {}", self.id);
        if let Some(engine) = &self.engine {
            engine.do_send(Shutdown);
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PlaySocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => self.handle_message(client_msg, ctx),
                Err(err) => {
                    warn!("error parsing client message: {}", err);
                    self.send(
                        ctx,
                        &ServerMessage::error(&format!("invalid message format: {}", err)),
                    );
                }
            },
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Binary(_)) => {
                self.send(ctx, &ServerMessage::error("binary messages are not supported"));
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<SearchCompleted> for PlaySocket {
    type Result = ();

    fn handle(&mut self, msg: SearchCompleted, ctx: &mut Self::Context) {
        let outcome = self
            .scheduler
            .handle_reply(&mut self.session, &msg.ticket, msg.best);
        match outcome {
            ReplyOutcome::Applied(record) => {
                info!("engine played {}", record.san);
                self.send_state(ctx);
            }
            ReplyOutcome::Stale => {
                debug!("stale engine reply discarded");
            }
            ReplyOutcome::NoMove => {
                debug!("engine reported no legal move");
                self.send_state(ctx);
            }
            ReplyOutcome::Dropped => {
                warn!("engine reply could not be applied");
                self.send_state(ctx);
            }
        }
    }
}

fn parse_square(value: Option<&str>) -> Option<Square> {
    Square::from_str(&value?.to_lowercase()).ok()
}
