pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod game;
pub mod planner;
pub mod policy;
pub mod score;

pub use agent::{Agent, AgentId};
pub use environment::{parse_board_size, Direction, Pos, RewardGrid, MAX_BOARD_SIZE, MAX_REWARD};
pub use error::{EngineError, Result};
pub use game::{
    GameEvent, GameSession, GameState, MoveOutcome, PlayMode, RejectReason, TurnStateMachine,
};
pub use planner::{solve, Plan};
pub use score::{CsvHighScore, GameResult, HighScoreStore, MemoryHighScore};
