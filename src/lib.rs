/*!
# Artist Splitter

A small browser-based utility for regrouping spreadsheets, built in Rust.

## Overview

Royalty and play-count exports usually arrive as one long sheet with a few
title rows on top. This application takes such a file (CSV or Excel), finds
the header row by looking for a column whose name contains "artist" within
the first ten rows, and returns a workbook with one worksheet per artist.
Each worksheet repeats the header row followed by that artist's rows in their
original order.

Two smaller tools sit next to it:

- a pivot table builder (one index column, one value column, summed), off by
  default
- an inventory viewer/editor backed by a single `.xlsx` file

All pages sit behind a shared access code.

## Architecture

### Core (always compiled)
- **table**: `CellValue` and `RawTable`, string coercion
- **regroup**: header detection, grouping, worksheet blocks
- **pivot**: single-aggregate pivot
- **loader**: CSV (`csv`) and Excel/ODS (`calamine`) decoding
- **downloader**: XLSX output (`rust_xlsxwriter`), atomic file writes
- **inventory**: the persisted inventory workbook
- **upload**: validation, naming and the split/pivot pipeline
- **error**: `AppError` with `NotFound` / `InvalidInput` / `IoFailure`

### Web layer (`web` feature)
- **config**: environment configuration
- **login**: access code hashing, sessions, auth middleware
- **app**: routing, handlers and templates

## REST API Endpoints

- `GET /api/inventory` - Inventory as `{headers, rows}`
- `POST /api/inventory` - Replace every inventory record
*/

pub mod downloader;
pub mod error;
pub mod inventory;
pub mod loader;
pub mod pivot;
pub mod regroup;
pub mod table;
pub mod upload;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod login;

pub use error::{AppError, AppResult, ErrorKind};
pub use regroup::{HeaderLocation, SheetBlock, locate_header, split_table};
pub use table::{CellValue, RawTable};
