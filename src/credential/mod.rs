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

//! Credential Rotation Core (C1-C4, §4.1-§4.4).

pub mod manager;
pub mod model;
pub mod state;
pub mod store;

pub use manager::CredentialManager;
pub use model::{AuthShape, Credential, CredentialStatus};
pub use store::{detect_source, load_credentials, LoadedCredentials, Source};
