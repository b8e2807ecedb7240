// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod app;
mod commands;
mod widgets;
mod wrap;

pub use app::TerminalUi;
