// zlibrary-core
// Copyright (C) 2026 zlibrary-core contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! A batch client for a rate-limited, per-account book-search/download
//! service, with a credential rotation core (§4.1-§4.4) and an embedded
//! catalog store (§4.6-§4.7) on top.

pub mod bootstrap;
pub mod catalog;
pub mod credential;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod session;
pub mod upstream;

pub use error::{CoreError, Result};
