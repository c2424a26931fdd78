//! Riffsmith Generation
//!
//! Background preset generation for the tone engine.
//!
//! This crate provides:
//! - [`GenerationScheduler`]: request queue, capped worker threads, retries
//!   with backoff and cancellation by id
//! - [`message_queue`]: lock-free single-producer/single-consumer queue that
//!   carries [`GenerationMessage`]s back to the control thread
//! - [`PresetClient`]: the blocking backend that turns a description into a
//!   [`PresetData`](riffsmith_core::PresetData)
//!
//! # Example
//!
//! ```rust,no_run
//! use riffsmith_core::{DriveParams, EffectBlock, PresetData};
//! use riffsmith_generation::{GenerationMessage, GenerationScheduler, SchedulerConfig};
//!
//! # fn main() -> riffsmith_generation::Result<()> {
//! let client = |description: &str| -> riffsmith_generation::Result<PresetData> {
//!     Ok(PresetData::new(description).with_block(EffectBlock::Drive(DriveParams::default())))
//! };
//! let mut scheduler = GenerationScheduler::new(client, SchedulerConfig::default())?;
//! scheduler.submit("heavy metal with tight gate");
//!
//! // Control thread, a few times per second
//! scheduler.poll_messages(|message| {
//!     if let GenerationMessage::Generated { preset, .. } = message {
//!         println!("new preset: {}", preset.name);
//!     }
//! });
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
mod error;
pub mod message;
pub mod prompts;
pub mod queue;
pub mod request;
pub mod scheduler;

pub use client::PresetClient;
pub use config::SchedulerConfig;
pub use error::{GenerationError, Result};
pub use message::GenerationMessage;
pub use queue::{message_queue, Consumer, Producer};
pub use request::{GenerationRequest, RequestId};
pub use scheduler::GenerationScheduler;
