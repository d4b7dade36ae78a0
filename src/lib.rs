//! Spatial simulation for bots living in grid-based rooms: line of sight,
//! proximity queries, grid navigation and per-bot organic movement.

pub mod animation;
pub mod app;
pub mod blueprint;
pub mod config;
pub mod demo;
pub mod event;
pub mod movement;
pub mod spatial;
pub mod state;
