//! # avguard core
//!
//! Mediates between an antivirus engine reachable only through a slow,
//! asynchronous messaging interface and any number of UI observers.
//!
//! ## Overview
//!
//! - **Command gateway** ([`gateway::CommandGateway`]): one-shot engine
//!   requests (protection toggles, scan start/pause/resume/stop, protection
//!   query) executed on a dedicated I/O pool so UI threads never block.
//! - **Scan state synthesizer** ([`synthesizer::ScanStateSynthesizer`]):
//!   classifies the engine's raw scanner cache into a [`ScanState`],
//!   debounces bursts, and shares the result with every observer. New
//!   observers get the current state straight away.
//! - **Engine port** ([`engine::EngineApi`]): what the core needs from the
//!   engine. [`engine::SimulatedEngine`] implements it in-process.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use avguard_core::{
//!     config::GuardConfig, engine::SimulatedEngine, gateway::CommandGateway,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! async fn watch_scan() -> avguard_core::Result<()> {
//!     let config = GuardConfig::default();
//!     let engine = Arc::new(SimulatedEngine::new(config.simulator.clone()));
//!     let gateway = CommandGateway::from_config(engine, &config)?;
//!
//!     let scope = CancellationToken::new();
//!     let synthesizer = gateway.observe_scan_state(&scope);
//!     let mut observer = synthesizer.observe();
//!
//!     gateway.start_scan("/tmp").await?;
//!     while let Some(state) = observer.next().await {
//!         println!("{state}");
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod config;
/// Engine port, snapshot cell and the simulated engine
pub mod engine;
pub mod error;
/// Off-thread command dispatch
pub mod gateway;
/// Snapshot classification, debouncing and fan-out
pub mod synthesizer;

pub use avguard_model::{
    EngineFailure, EntryStatus, ProtectionStatus, RawScanEntry,
    RawScanSnapshot, ScanEntry, ScanProgress, ScanState, ScannerStatus,
};
pub use config::{
    ConfigFormat, GuardConfig, GuardConfigSource, SimulatorConfig,
};
pub use error::{GuardError, Result};
pub use gateway::{CommandGateway, IoPool};
pub use synthesizer::{ScanStateObserver, ScanStateSynthesizer, classify};
