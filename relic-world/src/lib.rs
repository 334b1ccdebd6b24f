//! # relic-world — World-Server Integration
//!
//! This crate provides the integration layer between the game-agnostic
//! `relic-core` subsystem and a world server's event loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             World Server                 │
//! │  ┌───────────────────────────────────┐  │
//! │  │        relic-world                │  │
//! │  │  ┌─────────────┐ ┌─────────────┐ │  │
//! │  │  │  Scholars   │ │   Systems   │ │  │
//! │  │  └──────┬──────┘ └──────┬──────┘ │  │
//! │  │         │               │         │  │
//! │  │         ▼               ▼         │  │
//! │  │    ┌─────────────────────────┐    │  │
//! │  │    │      relic-core         │    │  │
//! │  │    └─────────────────────────┘    │  │
//! │  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `components` — per-player world state (inventory, equipped
//!   artifacts, praying flag, guild buff)
//! - `events` — world events that drive the subsystem
//! - `scholar` — the Scholar NPC interaction driver
//! - `systems` — per-event processing functions
//! - `hooks` — integration points with the host server's callbacks

pub mod components;
pub mod events;
pub mod hooks;
pub mod scholar;
pub mod systems;
