// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared fakes and fixtures for Understudy tests.
//!
//! The trip-clip workflow is a small system under test whose collaborators
//! are process-wide [`Surface`](understudy::Surface)s, so tests can spy on,
//! stub or mock them without touching the workflow source.
//!
//! # Modules
//!
//! - [`config`] - In-memory profile store fake
//! - [`collaborators`] - Mail, weather, video, persistence, subtitles and validator surfaces
//! - [`instructions`] - Clip instruction factory
//! - [`workflow`] - The trip-clip service
#![forbid(unsafe_code)]

pub mod collaborators;
pub mod config;
pub mod instructions;
pub mod workflow;

pub use collaborators::{
    data_access, instructions_validator, mail_sender, real_mails_sent, subtitles_provider,
    video_producer, weather_provider, YOUTUBE_ORIGIN,
};
pub use config::InMemoryProfileStore;
pub use instructions::{clip_instructions, default_clip_instructions};
pub use workflow::{failure_name, ClipResult, TripClipService, Validation};
