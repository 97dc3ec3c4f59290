use crate::environment::{Direction, Pos, RewardGrid};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AgentId {
    First,
    Second,
}

// the other agent
impl std::ops::Not for AgentId {
    type Output = AgentId;

    fn not(self) -> Self::Output {
        match self {
            AgentId::First => AgentId::Second,
            AgentId::Second => AgentId::First,
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentId::First => write!(f, "agent1"),
            AgentId::Second => write!(f, "agent2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: AgentId,
    pub pos: Pos,
}

impl Agent {
    /// Places the agent on its top-row start cell: agent1 on the left, agent2 on the right.
    pub fn new(id: AgentId, grid: &RewardGrid) -> Self {
        let pos = match id {
            AgentId::First => Pos::new(1, 1),
            AgentId::Second => Pos::new(1, grid.size()),
        };
        Self { id, pos }
    }

    pub fn candidate(&self, grid: &RewardGrid, direction: Direction) -> Option<Pos> {
        grid.step(self.pos, direction)
    }

    /// Moves to `to` and returns the cell left behind.
    pub fn r#move(&mut self, to: Pos) -> Pos {
        std::mem::replace(&mut self.pos, to)
    }

    pub fn at_bottom(&self, grid: &RewardGrid) -> bool {
        self.pos.row >= grid.size()
    }
}
