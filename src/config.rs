use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::environment::parse_board_size;
use crate::error::Result;
use crate::game::PlayMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    Human,
    Random,
}

#[derive(Debug, Parser)]
#[command(name = "chocolate-grid")]
#[command(about = "Two agents collecting rewards on a square grid")]
pub struct Args {
    /// Board size (N for an N x N grid)
    #[arg(short, long, default_value = "5")]
    pub size: String,

    /// Let the planner play the optimal routes instead of taking moves
    #[arg(long)]
    pub autoplay: bool,

    /// Seed for the reward grid (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load the reward grid from a CSV file instead of generating it
    #[arg(long)]
    pub grid: Option<PathBuf>,

    /// Who drives manual play
    #[arg(long, default_value = "human")]
    pub policy: PolicyKind,

    /// CSV file used to keep the high score between runs
    #[arg(long)]
    pub scores: Option<PathBuf>,

    /// Write the reward grid to this CSV file once it is created
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub size: usize,
    pub mode: PlayMode,
    pub seed: Option<u64>,
    pub grid: Option<PathBuf>,
    pub policy: PolicyKind,
    pub scores: Option<PathBuf>,
    pub export: Option<PathBuf>,
}

impl Args {
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    /// Validates the raw arguments. The size is only checked when no grid file is given.
    pub fn into_config(self) -> Result<GameConfig> {
        let size = match self.grid {
            Some(_) => 0,
            None => parse_board_size(&self.size)?,
        };
        Ok(GameConfig {
            size,
            mode: if self.autoplay { PlayMode::Autoplay } else { PlayMode::Manual },
            seed: self.seed,
            grid: self.grid,
            policy: self.policy,
            scores: self.scores,
            export: self.export,
        })
    }
}
