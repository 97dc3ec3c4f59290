use rand::Rng;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentId};
use crate::environment::{parse_board_size, Direction, Pos, RewardGrid};
use crate::error::{EngineError, Result};
use crate::planner;
use crate::score::{GameResult, HighScoreStore};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameState {
    NotStarted,
    InProgress,
    GameOver,
}

/// Picked at start, fixed for the whole session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlayMode {
    Manual,
    Autoplay,
}

impl std::fmt::Display for PlayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayMode::Manual => write!(f, "manual"),
            PlayMode::Autoplay => write!(f, "autoplay"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    BoardCreated { size: usize },
    AgentPlaced { agent: AgentId, pos: Pos },
    CellVisited { pos: Pos, agent: AgentId },
    AgentMoved { agent: AgentId, from: Pos, to: Pos },
    ActiveAgentChanged(AgentId),
    ScoreChanged(u64),
    GameOver { final_score: u64 },
    HighScoreChanged(u64),
    Reset,
    Cleared,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotInProgress,
    OutOfBounds,
    Collision,
    NotEligible,
    AutoplayUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted(Vec<GameEvent>),
    Rejected(RejectReason),
}

impl MoveOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveOutcome::Accepted(_))
    }
}

/// All mutable state of one play-through.
#[derive(Debug, Clone)]
pub struct GameSession {
    mode: PlayMode,
    grid: RewardGrid,
    agent1: Agent,
    agent2: Agent,
    active: AgentId,
    score: u64,
    manual_moves: usize,
    over: bool,
}

impl GameSession {
    fn new(grid: RewardGrid, mode: PlayMode) -> Self {
        Self {
            mode,
            agent1: Agent::new(AgentId::First, &grid),
            agent2: Agent::new(AgentId::Second, &grid),
            grid,
            active: AgentId::First,
            score: 0,
            manual_moves: 0,
            over: false,
        }
    }

    pub fn size(&self) -> usize {
        self.grid.size()
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn grid(&self) -> &RewardGrid {
        &self.grid
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        match id {
            AgentId::First => &self.agent1,
            AgentId::Second => &self.agent2,
        }
    }

    fn agent_mut(&mut self, id: AgentId) -> &mut Agent {
        match id {
            AgentId::First => &mut self.agent1,
            AgentId::Second => &mut self.agent2,
        }
    }

    pub fn active(&self) -> AgentId {
        self.active
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    /// Takes whatever reward is left on `pos` and marks it consumed.
    fn collect(&mut self, pos: Pos) -> Option<u32> {
        let taken = self
            .grid
            .reward_at(pos.row, pos.col)
            .and_then(|reward| self.grid.consume(pos.row, pos.col).map(|_| reward));
        match taken {
            Ok(reward) => Some(reward),
            Err(e) => {
                if cfg!(debug_assertions) {
                    panic!("agent position escaped the board: {}", e);
                }
                warn!(error = %e, "agent position escaped the board");
                None
            }
        }
    }

    /// Hands the turn to the other agent unless it is already on the last row.
    fn toggle(&mut self) -> Option<GameEvent> {
        let other = !self.active;
        if self.agent(other).pos.row < self.size() {
            self.active = other;
            Some(GameEvent::ActiveAgentChanged(other))
        } else {
            None
        }
    }

    fn both_at_bottom(&self) -> bool {
        self.agent1.at_bottom(&self.grid) && self.agent2.at_bottom(&self.grid)
    }
}

pub struct TurnStateMachine {
    session: Option<GameSession>,
    high_scores: Box<dyn HighScoreStore>,
    size_input: Option<String>,
    mode: PlayMode,
}

impl TurnStateMachine {
    pub fn new(high_scores: Box<dyn HighScoreStore>) -> Self {
        Self {
            session: None,
            high_scores,
            size_input: None,
            mode: PlayMode::Manual,
        }
    }

    pub fn state(&self) -> GameState {
        match &self.session {
            None => GameState::NotStarted,
            Some(session) if session.over => GameState::GameOver,
            Some(_) => GameState::InProgress,
        }
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn score(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.score)
    }

    pub fn high_score(&self) -> Option<u64> {
        self.high_scores.best()
    }

    pub fn active_agent(&self) -> Option<AgentId> {
        self.session.as_ref().map(|s| s.active)
    }

    pub fn size_input(&self) -> Option<&str> {
        self.size_input.as_deref()
    }

    /// Starts from raw board-size text. Anything but a positive integer leaves
    /// the machine in `NotStarted` with the size input cleared.
    pub fn start_from_input<R: Rng + ?Sized>(
        &mut self,
        input: &str,
        mode: PlayMode,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>> {
        match parse_board_size(input) {
            Ok(size) => {
                let events = self.start(size, mode, rng)?;
                self.size_input = Some(input.trim().to_string());
                Ok(events)
            }
            Err(e) => {
                self.abandon_start(&e);
                Err(e)
            }
        }
    }

    pub fn start<R: Rng + ?Sized>(
        &mut self,
        size: usize,
        mode: PlayMode,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>> {
        match RewardGrid::generate(size, rng) {
            Ok(grid) => Ok(self.start_with_grid(grid, mode)),
            Err(e) => {
                self.abandon_start(&e);
                Err(e)
            }
        }
    }

    fn abandon_start(&mut self, error: &EngineError) {
        warn!(%error, "refusing to start");
        self.session = None;
        self.size_input = None;
    }

    /// Starts a session on a prepared grid. Autoplay sessions are played out
    /// before this returns.
    pub fn start_with_grid(&mut self, grid: RewardGrid, mode: PlayMode) -> Vec<GameEvent> {
        if self.session.is_some() {
            debug!("replacing running session");
        }
        let size = grid.size();
        let mut session = GameSession::new(grid, mode);
        let mut events = vec![GameEvent::BoardCreated { size }];

        for id in [AgentId::First, AgentId::Second] {
            let pos = session.agent(id).pos;
            if let Some(reward) = session.collect(pos) {
                session.score += reward as u64;
            }
            events.push(GameEvent::AgentPlaced { agent: id, pos });
        }
        events.push(GameEvent::ActiveAgentChanged(AgentId::First));
        events.push(GameEvent::ScoreChanged(session.score));

        info!(size, %mode, "game started");
        self.size_input = Some(size.to_string());
        self.mode = mode;
        self.session = Some(session);

        match mode {
            PlayMode::Autoplay => {
                if let MoveOutcome::Accepted(played) = self.autoplay() {
                    events.extend(played);
                }
            }
            // a 1x1 board has no moves left at all
            PlayMode::Manual => events.extend(self.check_game_over()),
        }
        events
    }

    fn running(&mut self) -> std::result::Result<&mut GameSession, RejectReason> {
        match self.session.as_mut() {
            Some(session) if !session.over => Ok(session),
            _ => Err(RejectReason::NotInProgress),
        }
    }

    /// Moves the active agent one row down. Illegal moves leave every piece of
    /// state untouched.
    pub fn move_active(&mut self, direction: Direction) -> MoveOutcome {
        let session = match self.running() {
            Ok(session) => session,
            Err(reason) => return MoveOutcome::Rejected(reason),
        };
        let active = session.active;
        let candidate = match session.agent(active).candidate(&session.grid, direction) {
            Some(pos) => pos,
            None => {
                debug!(agent = %active, ?direction, "move leaves the board");
                return MoveOutcome::Rejected(RejectReason::OutOfBounds);
            }
        };
        if candidate == session.agent(!active).pos {
            debug!(agent = %active, to = %candidate, "move collides with the other agent");
            return MoveOutcome::Rejected(RejectReason::Collision);
        }
        let reward = match session.collect(candidate) {
            Some(reward) => reward,
            None => return MoveOutcome::Rejected(RejectReason::OutOfBounds),
        };

        let from = session.agent_mut(active).r#move(candidate);
        session.score += reward as u64;
        session.manual_moves += 1;
        debug!(
            agent = %active, %from, to = %candidate, reward, score = session.score,
            "move accepted"
        );

        let mut events = vec![
            GameEvent::CellVisited { pos: from, agent: active },
            GameEvent::AgentMoved { agent: active, from, to: candidate },
            GameEvent::ScoreChanged(session.score),
        ];
        events.extend(session.toggle());
        events.extend(self.check_game_over());
        MoveOutcome::Accepted(events)
    }

    /// Explicit turn switch. Same eligibility rule as after a move.
    pub fn toggle_selection(&mut self) -> MoveOutcome {
        let session = match self.running() {
            Ok(session) => session,
            Err(reason) => return MoveOutcome::Rejected(reason),
        };
        match session.toggle() {
            Some(event) => MoveOutcome::Accepted(vec![event]),
            None => MoveOutcome::Rejected(RejectReason::NotEligible),
        }
    }

    /// Replays the optimal routes for the current grid in one go. Only
    /// available before any manual move has been made.
    pub fn autoplay(&mut self) -> MoveOutcome {
        let session = match self.running() {
            Ok(session) => session,
            Err(reason) => return MoveOutcome::Rejected(reason),
        };
        if session.manual_moves > 0 {
            return MoveOutcome::Rejected(RejectReason::AutoplayUnavailable);
        }
        let plan = match planner::solve(&session.grid.snapshot()) {
            Ok(plan) => plan,
            Err(e) => {
                if cfg!(debug_assertions) {
                    panic!("planner rejected a reward grid: {}", e);
                }
                warn!(error = %e, "planner rejected a reward grid");
                return MoveOutcome::Rejected(RejectReason::AutoplayUnavailable);
            }
        };

        let mut events = Vec::with_capacity(2 * plan.path1.len() + 4);
        let mut last = (session.agent1.pos, session.agent2.pos);
        for (p1, p2) in plan.positions() {
            session.collect(p1);
            session.collect(p2);
            events.push(GameEvent::CellVisited { pos: p1, agent: AgentId::First });
            events.push(GameEvent::CellVisited { pos: p2, agent: AgentId::Second });
            last = (p1, p2);
        }
        for (id, to) in [(AgentId::First, last.0), (AgentId::Second, last.1)] {
            let from = session.agent_mut(id).r#move(to);
            events.push(GameEvent::AgentMoved { agent: id, from, to });
        }
        session.score += plan.total;
        events.push(GameEvent::ScoreChanged(session.score));
        info!(total = plan.total, "autoplay finished");

        events.extend(self.check_game_over());
        MoveOutcome::Accepted(events)
    }

    fn check_game_over(&mut self) -> Vec<GameEvent> {
        let session = match self.session.as_mut() {
            Some(session) if !session.over && session.both_at_bottom() => session,
            _ => return Vec::new(),
        };
        session.over = true;
        let final_score = session.score;
        let result = GameResult { size: session.size(), mode: session.mode, final_score };
        let mut events = vec![
            GameEvent::CellVisited { pos: session.agent1.pos, agent: AgentId::First },
            GameEvent::CellVisited { pos: session.agent2.pos, agent: AgentId::Second },
            GameEvent::GameOver { final_score },
        ];
        info!(final_score, "game over");

        if final_score > 0 {
            let previous = self.high_scores.best();
            match self.high_scores.record(&result) {
                Ok(best) if Some(best) != previous => {
                    events.push(GameEvent::HighScoreChanged(best))
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "could not record high score"),
            }
        }
        events
    }

    /// Drops the running session. Size input and mode are kept for [`restart`](Self::restart).
    pub fn reset(&mut self) -> Vec<GameEvent> {
        self.session = None;
        debug!("game reset");
        vec![GameEvent::Reset]
    }

    /// Reset followed by a fresh start with the last size and mode.
    pub fn restart<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<GameEvent>> {
        let mut events = self.reset();
        let input = self.size_input.clone().unwrap_or_default();
        events.extend(self.start_from_input(&input, self.mode, rng)?);
        Ok(events)
    }

    /// Like [`reset`](Self::reset), but also forgets the size input.
    pub fn clear(&mut self) -> Vec<GameEvent> {
        self.session = None;
        self.size_input = None;
        debug!("game cleared");
        vec![GameEvent::Cleared, GameEvent::ScoreChanged(0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::MemoryHighScore;
    use rand::{rngs::StdRng, SeedableRng};

    fn fixture() -> RewardGrid {
        RewardGrid::from_rows(vec![vec![0, 4, 0], vec![2, 9, 1], vec![5, 6, 8]]).unwrap()
    }

    fn machine() -> TurnStateMachine {
        TurnStateMachine::new(Box::new(MemoryHighScore::default()))
    }

    #[test]
    fn start_places_agents_and_consumes_start_cells() {
        let mut game = machine();
        let events = game.start_with_grid(fixture(), PlayMode::Manual);
        assert_eq!(events[0], GameEvent::BoardCreated { size: 3 });
        assert!(events
            .contains(&GameEvent::AgentPlaced { agent: AgentId::First, pos: Pos::new(1, 1) }));
        assert!(events
            .contains(&GameEvent::AgentPlaced { agent: AgentId::Second, pos: Pos::new(1, 3) }));
        assert_eq!(game.state(), GameState::InProgress);
        assert_eq!(game.active_agent(), Some(AgentId::First));
        let session = game.session().unwrap();
        assert_eq!(session.agent(AgentId::First).pos, Pos::new(1, 1));
        assert_eq!(session.agent(AgentId::Second).pos, Pos::new(1, 3));
        assert!(session.grid().is_consumed(1, 1).unwrap());
        assert!(session.grid().is_consumed(1, 3).unwrap());
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn moves_alternate_between_agents() {
        let mut game = machine();
        game.start_with_grid(fixture(), PlayMode::Manual);

        let outcome = game.move_active(Direction::DiagonalRight);
        assert!(outcome.is_accepted());
        assert_eq!(game.score(), 9);
        assert_eq!(game.active_agent(), Some(AgentId::Second));

        // (2, 2) is now taken by agent1
        assert_eq!(
            game.move_active(Direction::DiagonalLeft),
            MoveOutcome::Rejected(RejectReason::Collision)
        );
        assert_eq!(
            game.move_active(Direction::DiagonalRight),
            MoveOutcome::Rejected(RejectReason::OutOfBounds)
        );
        assert_eq!(game.score(), 9);
        assert_eq!(game.active_agent(), Some(AgentId::Second));
    }

    #[test]
    fn revisited_cell_pays_nothing() {
        let mut game = machine();
        game.start_with_grid(fixture(), PlayMode::Manual);
        game.move_active(Direction::DiagonalRight); // agent1 -> (2,2), +9
        assert!(game.toggle_selection().is_accepted());
        game.move_active(Direction::DiagonalLeft); // agent1 -> (3,1), +5
        assert_eq!(game.active_agent(), Some(AgentId::Second));
        game.move_active(Direction::DiagonalLeft); // agent2 -> (2,2), already taken
        assert_eq!(game.score(), 14);
        game.move_active(Direction::Down); // agent2 -> (3,2), +6
        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.score(), 20);
    }

    #[test]
    fn finished_agent_forces_turn_to_the_other() {
        let mut game = machine();
        game.start_with_grid(fixture(), PlayMode::Manual);
        game.move_active(Direction::Down);
        game.toggle_selection();
        assert_eq!(game.active_agent(), Some(AgentId::First));
        game.move_active(Direction::Down); // agent1 reaches the last row
        assert_eq!(game.active_agent(), Some(AgentId::Second));
        assert_eq!(game.toggle_selection(), MoveOutcome::Rejected(RejectReason::NotEligible));
        game.move_active(Direction::Down);
        assert_eq!(game.active_agent(), Some(AgentId::Second));
        assert_eq!(game.state(), GameState::InProgress);
        game.move_active(Direction::Down);
        assert_eq!(game.state(), GameState::GameOver);
    }

    #[test]
    fn game_over_records_high_score() {
        let mut game = TurnStateMachine::new(Box::new(MemoryHighScore::new(Some(5))));
        game.start_with_grid(fixture(), PlayMode::Manual);
        game.move_active(Direction::Down);
        game.move_active(Direction::Down);
        game.move_active(Direction::Down);
        let outcome = game.move_active(Direction::Down);
        let events = match outcome {
            MoveOutcome::Accepted(events) => events,
            other => panic!("unexpected {:?}", other),
        };
        assert!(events.contains(&GameEvent::GameOver { final_score: 16 }));
        assert!(events.contains(&GameEvent::HighScoreChanged(16)));
        assert_eq!(game.high_score(), Some(16));
        assert_eq!(
            game.move_active(Direction::Down),
            MoveOutcome::Rejected(RejectReason::NotInProgress)
        );
    }

    #[test]
    fn lower_score_keeps_high_score_quiet() {
        let mut game = TurnStateMachine::new(Box::new(MemoryHighScore::new(Some(100))));
        game.start_with_grid(fixture(), PlayMode::Manual);
        for _ in 0..3 {
            game.move_active(Direction::Down);
        }
        let events = match game.move_active(Direction::Down) {
            MoveOutcome::Accepted(events) => events,
            other => panic!("unexpected {:?}", other),
        };
        assert!(events.contains(&GameEvent::GameOver { final_score: 16 }));
        assert!(!events.iter().any(|e| matches!(e, GameEvent::HighScoreChanged(_))));
        assert_eq!(game.high_score(), Some(100));
    }

    #[test]
    fn zero_score_is_not_recorded() {
        let grid = RewardGrid::from_rows(vec![vec![0, 0], vec![0, 0]]).unwrap();
        let mut game = machine();
        game.start_with_grid(grid, PlayMode::Autoplay);
        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.high_score(), None);
    }

    #[test]
    fn autoplay_scores_planner_total() {
        let mut game = machine();
        let events = game.start_with_grid(fixture(), PlayMode::Autoplay);
        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.score(), 25);
        assert!(events.contains(&GameEvent::GameOver { final_score: 25 }));
        let session = game.session().unwrap();
        assert_eq!(session.agent(AgentId::First).pos, Pos::new(3, 2));
        assert_eq!(session.agent(AgentId::Second).pos, Pos::new(3, 3));
        for (row, col) in [(2, 1), (2, 2), (3, 2), (3, 3)] {
            assert!(session.grid().is_consumed(row, col).unwrap());
        }
        assert!(!session.grid().is_consumed(3, 1).unwrap());
    }

    #[test]
    fn autoplay_unavailable_after_manual_move() {
        let mut game = machine();
        game.start_with_grid(fixture(), PlayMode::Manual);
        game.move_active(Direction::Down);
        assert_eq!(game.autoplay(), MoveOutcome::Rejected(RejectReason::AutoplayUnavailable));
    }

    #[test]
    fn single_cell_board_ends_immediately() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = machine();
        game.start(1, PlayMode::Manual, &mut rng).unwrap();
        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn invalid_input_stays_not_started() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = machine();
        game.start_from_input("3", PlayMode::Manual, &mut rng).unwrap();
        let err = game.start_from_input("-1", PlayMode::Manual, &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSize { .. }));
        assert_eq!(game.state(), GameState::NotStarted);
        assert_eq!(game.size_input(), None);
        assert!(game.start(0, PlayMode::Manual, &mut rng).is_err());
        assert_eq!(game.state(), GameState::NotStarted);
    }

    #[test]
    fn reset_restart_and_clear() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut game = machine();
        game.start_from_input("4", PlayMode::Manual, &mut rng).unwrap();
        game.move_active(Direction::Down);

        assert_eq!(game.reset(), vec![GameEvent::Reset]);
        assert_eq!(game.state(), GameState::NotStarted);
        assert_eq!(game.size_input(), Some("4"));

        game.restart(&mut rng).unwrap();
        assert_eq!(game.state(), GameState::InProgress);
        assert_eq!(game.session().unwrap().size(), 4);
        assert_eq!(game.score(), 0);

        game.clear();
        assert_eq!(game.state(), GameState::NotStarted);
        assert_eq!(game.size_input(), None);
        assert!(game.restart(&mut rng).is_err());
    }

    #[test]
    fn nothing_moves_before_start() {
        let mut game = machine();
        assert_eq!(
            game.move_active(Direction::Down),
            MoveOutcome::Rejected(RejectReason::NotInProgress)
        );
        assert_eq!(game.toggle_selection(), MoveOutcome::Rejected(RejectReason::NotInProgress));
        assert_eq!(game.autoplay(), MoveOutcome::Rejected(RejectReason::NotInProgress));
    }
}
