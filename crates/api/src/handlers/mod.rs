pub mod achievement;
pub mod boxes;
pub mod character;
pub mod food;
pub mod leaderboard;
pub mod notification;
pub mod quest;
