pub mod chat;
pub mod onboard;
pub mod render;
pub mod send;
