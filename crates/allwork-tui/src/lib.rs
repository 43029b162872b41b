pub mod app;
pub mod board;
pub mod components;
pub mod notice;
pub mod session;
pub mod teams;
pub mod theme;
