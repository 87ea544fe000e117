// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;

use esm_graph::{Agent, JsError};
use thiserror::Error;

use crate::host::LoadError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),
    /// An error value produced by loading, linking or evaluating the graph.
    #[error("Uncaught {0}")]
    Uncaught(String),
    /// The graph still had pending work once every job and suspended body
    /// was settled.
    #[error("{0} of the module graph did not complete")]
    Incomplete(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CliError {
    pub fn uncaught(agent: &Agent, error: JsError) -> Self {
        CliError::Uncaught(error.to_string(agent))
    }
}
