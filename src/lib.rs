//! On-chain job keeper core.
//!
//! Watches new blocks, forks a job-wrapper subprocess per configured job to
//! evaluate workability against a local fork, and submits the resulting
//! transaction bundles to block-builder relays, retrying until inclusion.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                    KEEPER CORE                       │
//!                  │                                                      │
//!   WS new heads   │  ┌────────────┐      ┌────────────┐   fork + IPC    │
//!   ───────────────┼─▶│ blockchain │─────▶│  dispatch  │◀────────────────┼──── job wrapper
//!                  │  │BlockSource │      │ per-job    │                  │     subprocess
//!                  │  └────────────┘      │ loop       │───┐              │
//!                  │                      └─────┬──────┘   │ PortRequest  │
//!                  │                            │          ▼              │
//!                  │                            │    ┌───────────┐        │
//!                  │                WorkRequest │    │   ports   │        │
//!                  │                            │    │  arbiter  │        │
//!                  │                            ▼    └───────────┘        │
//!                  │                      ┌────────────┐                  │
//!   eth_sendBundle │                      │   relay    │                  │
//!   ◀──────────────┼──────────────────────│ submitter  │                  │
//!                  │                      └────────────┘                  │
//!                  │                                                      │
//!                  │  ┌────────────────────────────────────────────────┐  │
//!                  │  │            Cross-Cutting Concerns              │  │
//!                  │  │  ┌────────┐ ┌──────────┐ ┌─────────────────┐   │  │
//!                  │  │  │ config │ │lifecycle │ │  observability  │   │  │
//!                  │  │  └────────┘ └──────────┘ └─────────────────┘   │  │
//!                  │  └────────────────────────────────────────────────┘  │
//!                  └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod blockchain;
pub mod dispatch;
pub mod jobs;
pub mod ports;
pub mod process;
pub mod relay;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::KeeperConfig;
pub use lifecycle::Shutdown;
