use std::fs::File;

use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chocolate_grid::config::{Args, PolicyKind};
use chocolate_grid::policy::{play, HumanControlPolicy, Input, Policy, RandomPolicy};
use chocolate_grid::{
    AgentId, CsvHighScore, GameEvent, GameSession, GameState, HighScoreStore, MemoryHighScore,
    RewardGrid, TurnStateMachine,
};

fn draw(session: &GameSession) {
    let active = session.agent(session.active()).pos;
    for row in 1..=session.size() {
        let line: Vec<String> = (1..=session.size())
            .map(|col| {
                let here = |id: AgentId| {
                    let pos = session.agent(id).pos;
                    pos.row == row && pos.col == col
                };
                let mark = if active.row == row && active.col == col { '*' } else { ' ' };
                if here(AgentId::First) {
                    format!("{}A1", mark)
                } else if here(AgentId::Second) {
                    format!("{}A2", mark)
                } else if session.grid().is_consumed(row, col).unwrap_or(false) {
                    "  .".to_string()
                } else {
                    format!("{:>3}", session.grid().reward_at(row, col).unwrap_or(0))
                }
            })
            .collect();
        println!("{}", line.join(" "));
    }
    println!("Current Score : {}\n", session.score());
}

fn report(event: &GameEvent) {
    match event {
        GameEvent::ActiveAgentChanged(agent) => println!("{} selected", agent),
        GameEvent::GameOver { final_score } => {
            println!("Game Over!! Your total is {}.", final_score)
        }
        GameEvent::HighScoreChanged(best) => println!("High Score : {}", best),
        other => info!(?other, "event"),
    }
}

/// Draws the board before every prompt of the wrapped policy.
struct ShowBoard<P: Policy>(P);

impl<P: Policy> Policy for ShowBoard<P> {
    fn next_input(&mut self, machine: &TurnStateMachine) -> Option<Input> {
        if let Some(session) = machine.session() {
            if machine.state() == GameState::InProgress {
                draw(session);
            }
        }
        self.0.next_input(machine)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config()?;
    info!(?config, "configuration");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let store: Box<dyn HighScoreStore> = match &config.scores {
        Some(path) => Box::new(CsvHighScore::open(path)?),
        None => Box::new(MemoryHighScore::default()),
    };
    let mut machine = TurnStateMachine::new(store);
    if let Some(best) = machine.high_score() {
        println!("High Score : {}", best);
    }

    let events = match &config.grid {
        Some(path) => {
            let grid = RewardGrid::read_csv(File::open(path)?)?;
            machine.start_with_grid(grid, config.mode)
        }
        None => machine.start(config.size, config.mode, &mut rng)?,
    };
    if let (Some(path), Some(session)) = (&config.export, machine.session()) {
        session.grid().write_csv(File::create(path)?)?;
        info!(path = %path.display(), "exported grid");
    }
    events.iter().for_each(report);

    if machine.state() == GameState::InProgress {
        match config.policy {
            PolicyKind::Human => {
                println!(
                    "s = down, a = diagonal left, d = diagonal right, \
                     t = switch agent, r = reset, c = clear, q = quit"
                );
                let mut policy = ShowBoard(HumanControlPolicy::stdin());
                play(&mut machine, &mut policy, &mut rng, report)?;
            }
            PolicyKind::Random => {
                let policy_rng = StdRng::seed_from_u64(rng.gen());
                let mut policy = ShowBoard(RandomPolicy::new(policy_rng, 10_000));
                play(&mut machine, &mut policy, &mut rng, report)?;
            }
        }
    }

    if let Some(session) = machine.session() {
        draw(session);
    }
    println!("Finished with score {}", machine.score());
    Ok(())
}
