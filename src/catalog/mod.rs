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

//! Catalog Storage Core (C6-C7, §3.2, §4.6-§4.7).

pub mod database;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod services;

pub use database::{Database, DatabaseStats};
pub use models::{
    Author, Book, BookAuthor, Download, DownloadStatus, ListBook, NewBook, ReadingList, SavedBook, SearchQuery,
};
pub use repository::BookFilter;
pub use services::{BookWithAuthors, CatalogStats};
