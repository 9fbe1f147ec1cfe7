// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod metadata;
pub mod scoutnet;
pub mod tokens;

pub use metadata::{MetadataField, MetadataSnapshot, RoleMetadata};
pub use scoutnet::{Participant, QuestionMap};
pub use tokens::{DiscordTokenSet, LinkState, ScoutIdTokenSet, TokenResponse};
