//! Drive tmux sessions from scripts and tell when a command's output is done.

pub mod actions;
pub mod app;
pub mod tmux;
