pub mod journal;
pub mod leaderboard;
