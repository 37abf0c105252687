// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed REST services. Both share one [`crate::http::AuthPipeline`].

pub mod auth;
pub mod journal;

pub use auth::{AuthService, AuthTokens, LinkedAccount, User};
pub use journal::{merge_ai_result, EntryUpdate, JournalEntry, JournalService, NewEntry};
