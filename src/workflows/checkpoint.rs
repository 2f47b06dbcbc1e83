//! JSON persistence of workflow states.

use super::{Error, State};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::instrument;

/// Writes `state` to `path`. The file is replaced atomically through a uniquely
/// named temporary file in the same directory.
#[instrument(level = "debug", skip(state, path), fields(path = %path.as_ref().display(), generation = state.generation))]
pub fn save<AS, PS>(state: &State<AS, PS>, path: impl AsRef<Path>) -> Result<(), Error>
where
    AS: Serialize,
    PS: Serialize,
{
    let path = path.as_ref();
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temporary = NamedTempFile::new_in(directory)?;

    let mut writer = BufWriter::new(temporary.as_file_mut());
    serde_json::to_writer_pretty(&mut writer, state)?;
    writer.flush()?;
    drop(writer);

    temporary.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load<AS, PS>(path: impl AsRef<Path>) -> Result<State<AS, PS>, Error>
where
    AS: DeserializeOwned,
    PS: DeserializeOwned,
{
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
