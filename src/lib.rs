// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT license.

#![allow(dead_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod field;
pub mod io;
pub mod party;
pub mod prg;
pub mod protocol;
pub mod shuffle;
pub mod wire;

pub use config::{Configuration, Table};
pub use error::ProtocolError;
pub use field::FieldElement;
pub use party::Party;
