use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use csv::Writer;
use tracing::{debug, warn};

use crate::error::Result;
use crate::game::PlayMode;

/// A finished play-through as reported on game over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub size: usize,
    pub mode: PlayMode,
    pub final_score: u64,
}

pub trait HighScoreStore {
    /// Best score seen so far, if any game has been recorded.
    fn best(&self) -> Option<u64>;

    /// Stores `max(best, result.final_score)` and returns it.
    fn record(&mut self, result: &GameResult) -> Result<u64>;
}

#[derive(Debug, Default)]
pub struct MemoryHighScore {
    best: Option<u64>,
}

impl MemoryHighScore {
    pub fn new(previous: Option<u64>) -> Self {
        Self { best: previous }
    }
}

impl HighScoreStore for MemoryHighScore {
    fn best(&self) -> Option<u64> {
        self.best
    }

    fn record(&mut self, result: &GameResult) -> Result<u64> {
        let best = self.best.map_or(result.final_score, |b| b.max(result.final_score));
        self.best = Some(best);
        Ok(best)
    }
}

/// Appends every finished game to a CSV log. The best score is the maximum
/// over all logged rows.
pub struct CsvHighScore {
    path: PathBuf,
    best: Option<u64>,
}

const HEADER: [&str; 4] = ["timestamp_secs", "size", "mode", "score"];

impl CsvHighScore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut best = None;
        if path.exists() {
            let mut reader = csv::Reader::from_path(&path)?;
            for record in reader.records() {
                let record = record?;
                match record.get(3).and_then(|s| s.parse::<u64>().ok()) {
                    Some(score) => best = Some(best.map_or(score, |b: u64| b.max(score))),
                    None => warn!(?record, "skipping unreadable high-score row"),
                }
            }
        }
        debug!(path = %path.display(), ?best, "opened high-score log");
        Ok(Self { path, best })
    }
}

impl HighScoreStore for CsvHighScore {
    fn best(&self) -> Option<u64> {
        self.best
    }

    fn record(&mut self, result: &GameResult) -> Result<u64> {
        let is_new = !self.path.exists() || std::fs::metadata(&self.path)?.len() == 0;
        let file: File = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = Writer::from_writer(file);
        if is_new {
            writer.write_record(HEADER)?;
        }
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        writer.write_record(&[
            timestamp.to_string(),
            result.size.to_string(),
            result.mode.to_string(),
            result.final_score.to_string(),
        ])?;
        writer.flush()?;

        let best = self.best.map_or(result.final_score, |b| b.max(result.final_score));
        self.best = Some(best);
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: u64) -> GameResult {
        GameResult { size: 3, mode: PlayMode::Manual, final_score: score }
    }

    #[test]
    fn memory_store_keeps_maximum() {
        let mut store = MemoryHighScore::new(Some(20));
        assert_eq!(store.record(&result(12)).unwrap(), 20);
        assert_eq!(store.record(&result(31)).unwrap(), 31);
        assert_eq!(store.best(), Some(31));
        assert_eq!(MemoryHighScore::default().best(), None);
    }

    #[test]
    fn csv_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        let mut store = CsvHighScore::open(&path).unwrap();
        assert_eq!(store.best(), None);
        store.record(&result(17)).unwrap();
        store.record(&result(9)).unwrap();

        let reopened = CsvHighScore::open(&path).unwrap();
        assert_eq!(reopened.best(), Some(17));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("timestamp_secs,size,mode,score\n"));
    }
}
