//! List riddles and judge scripts against them

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use super::CliError;
use crate::{Catalogue, Judge, RiddleRepository, SandboxConfig, Verdict};

/// One line of the riddle listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiddleSummary {
    pub id: String,
    pub description: String,
    pub element_type: String,
    pub input_len: usize,
}

/// Options for the judge command
#[derive(Debug, Clone, Default)]
pub struct JudgeOptions {
    pub riddle_id: String,
    pub script: String,
    /// JSON catalogue to use instead of the built-in riddles
    pub catalogue: Option<PathBuf>,
    pub config: SandboxConfig,
}

/// Load a catalogue file, or the built-in safari riddles
pub fn load_catalogue(path: Option<&PathBuf>) -> Result<Catalogue, CliError> {
    let catalogue = match path {
        Some(path) => Catalogue::from_file(path)?,
        None => Catalogue::safari()?,
    };
    Ok(catalogue)
}

pub fn list_riddles(catalogue: &Catalogue) -> Vec<RiddleSummary> {
    catalogue
        .riddles()
        .iter()
        .map(|riddle| RiddleSummary {
            id: riddle.id.clone(),
            description: riddle.description.clone(),
            element_type: riddle.element_type.to_string(),
            input_len: riddle.input.len(),
        })
        .collect()
}

/// Judge one script against one riddle
pub fn execute_judge(options: &JudgeOptions) -> Result<Verdict, CliError> {
    let catalogue = load_catalogue(options.catalogue.as_ref())?;
    let judge = Judge::new(Arc::new(catalogue), options.config.clone());
    Ok(judge.judge_by_id(&options.riddle_id, &options.script)?)
}
