use std::io::{self, BufRead, StdinLock};

use rand::Rng;
use tracing::{debug, warn};

use crate::environment::Direction;
use crate::error::Result;
use crate::game::{GameEvent, GameState, MoveOutcome, TurnStateMachine};

/// Everything a driver can ask of the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Input {
    MoveDown,
    MoveDiagonalLeft,
    MoveDiagonalRight,
    ToggleSelection,
    Restart,
    Clear,
    Quit,
}

impl Input {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Input::MoveDown => Some(Direction::Down),
            Input::MoveDiagonalLeft => Some(Direction::DiagonalLeft),
            Input::MoveDiagonalRight => Some(Direction::DiagonalRight),
            _ => None,
        }
    }
}

impl From<Direction> for Input {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Down => Input::MoveDown,
            Direction::DiagonalLeft => Input::MoveDiagonalLeft,
            Direction::DiagonalRight => Input::MoveDiagonalRight,
        }
    }
}

pub trait Policy {
    /// Next input for the machine, `None` once the driver has nothing left to say.
    fn next_input(&mut self, machine: &TurnStateMachine) -> Option<Input>;
}

/// Reads one command per line.
pub struct HumanControlPolicy<B: BufRead> {
    input: B,
}

impl HumanControlPolicy<StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<B: BufRead> HumanControlPolicy<B> {
    pub fn new(input: B) -> Self {
        Self { input }
    }

    pub fn parse_command(line: &str) -> Option<Input> {
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "down" => Some(Input::MoveDown),
            "a" | "left" => Some(Input::MoveDiagonalLeft),
            "d" | "right" => Some(Input::MoveDiagonalRight),
            "t" | "tab" => Some(Input::ToggleSelection),
            "r" | "reset" => Some(Input::Restart),
            "c" | "clear" => Some(Input::Clear),
            "q" | "quit" => Some(Input::Quit),
            _ => None,
        }
    }
}

impl<B: BufRead> Policy for HumanControlPolicy<B> {
    fn next_input(&mut self, _machine: &TurnStateMachine) -> Option<Input> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    if let Some(input) = Self::parse_command(&line) {
                        return Some(input);
                    }
                    if !line.trim().is_empty() {
                        warn!(command = line.trim(), "unknown command");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "could not read input");
                    return None;
                }
            }
        }
    }
}

/// Presses random arrow keys until the game ends or it runs out of attempts.
pub struct RandomPolicy<R: Rng> {
    rng: R,
    attempts_left: usize,
}

impl<R: Rng> RandomPolicy<R> {
    pub fn new(rng: R, max_attempts: usize) -> Self {
        Self { rng, attempts_left: max_attempts }
    }
}

impl<R: Rng> Policy for RandomPolicy<R> {
    fn next_input(&mut self, machine: &TurnStateMachine) -> Option<Input> {
        if machine.state() != GameState::InProgress || self.attempts_left == 0 {
            return None;
        }
        self.attempts_left -= 1;
        let direction: Direction = self.rng.gen();
        Some(direction.into())
    }
}

/// Feeds `policy` inputs into `machine` until the policy stops or quits.
/// Returns the score on the board at that point.
pub fn play<P, R, F>(
    machine: &mut TurnStateMachine,
    policy: &mut P,
    rng: &mut R,
    mut on_event: F,
) -> Result<u64>
where
    P: Policy + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(&GameEvent),
{
    while let Some(input) = policy.next_input(machine) {
        let outcome = match input {
            Input::Quit => break,
            Input::Restart => MoveOutcome::Accepted(machine.restart(rng)?),
            Input::Clear => {
                machine.clear().iter().for_each(&mut on_event);
                break;
            }
            Input::ToggleSelection => machine.toggle_selection(),
            _ => match input.direction() {
                Some(direction) => machine.move_active(direction),
                None => continue,
            },
        };
        match outcome {
            MoveOutcome::Accepted(events) => events.iter().for_each(&mut on_event),
            MoveOutcome::Rejected(reason) => debug!(?input, ?reason, "input ignored"),
        }
    }
    Ok(machine.score())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::RewardGrid;
    use crate::game::PlayMode;
    use crate::score::MemoryHighScore;
    use rand::{rngs::StdRng, SeedableRng};

    fn fixture_machine() -> TurnStateMachine {
        let mut machine = TurnStateMachine::new(Box::new(MemoryHighScore::default()));
        let grid =
            RewardGrid::from_rows(vec![vec![0, 4, 0], vec![2, 9, 1], vec![5, 6, 8]]).unwrap();
        machine.start_with_grid(grid, PlayMode::Manual);
        machine
    }

    #[test]
    fn parses_keyboard_commands() {
        type Human = HumanControlPolicy<&'static [u8]>;
        assert_eq!(Human::parse_command("s\n"), Some(Input::MoveDown));
        assert_eq!(Human::parse_command(" LEFT "), Some(Input::MoveDiagonalLeft));
        assert_eq!(Human::parse_command("tab"), Some(Input::ToggleSelection));
        assert_eq!(Human::parse_command("r"), Some(Input::Restart));
        assert_eq!(Human::parse_command("reset"), Some(Input::Restart));
        assert_eq!(Human::parse_command("q"), Some(Input::Quit));
        assert_eq!(Human::parse_command("x"), None);
    }

    #[test]
    fn scripted_human_game() {
        let mut machine = fixture_machine();
        let script = "s\nbogus\ns\ns\ns\n";
        let mut policy = HumanControlPolicy::new(script.as_bytes());
        let mut rng = StdRng::seed_from_u64(0);
        let mut seen = Vec::new();
        let score = play(&mut machine, &mut policy, &mut rng, |e| seen.push(e.clone())).unwrap();
        assert_eq!(score, 16);
        assert!(seen.contains(&GameEvent::GameOver { final_score: 16 }));
    }

    #[test]
    fn quit_stops_early() {
        let mut machine = fixture_machine();
        let mut policy = HumanControlPolicy::new("s\nq\ns\n".as_bytes());
        let mut rng = StdRng::seed_from_u64(0);
        let score = play(&mut machine, &mut policy, &mut rng, |_| {}).unwrap();
        assert_eq!(score, 2);
        assert_eq!(machine.state(), GameState::InProgress);
    }

    #[test]
    fn random_policy_finishes_a_game() {
        let mut machine = fixture_machine();
        let mut policy = RandomPolicy::new(StdRng::seed_from_u64(42), 1_000);
        let mut rng = StdRng::seed_from_u64(0);
        play(&mut machine, &mut policy, &mut rng, |_| {}).unwrap();
        assert_eq!(machine.state(), GameState::GameOver);
    }
}
