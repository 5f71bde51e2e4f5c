use std::io::{Seek, Write};

use thiserror::Error;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Stable member names of the worklist bundle for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMemberNames {
    pub worklist: String,
    pub summary: String,
    pub instructions: String,
    pub dummy_output: String,
}

impl ArchiveMemberNames {
    pub fn for_entity(entity_label: &str) -> Self {
        Self {
            worklist: format!("{}_xl20_worklist.csv", entity_label),
            summary: format!("{}_xl20_summary.txt", entity_label),
            instructions: format!("{}_instructions.txt", entity_label),
            dummy_output: format!("{}_dummy_xl20_output.tpo", entity_label),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Error writing zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Error writing zip archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Bundles the named members into one zip archive.
pub fn bundle_archive<W: Write + Seek>(writer: W, members: &[(String, Vec<u8>)]) -> Result<(), ArchiveError> {
    let mut zip_writer = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    for (name, content) in members.iter() {
        zip_writer.start_file(name.as_str(), options)?;
        zip_writer.write_all(content)?;
        info!("Added archive member. name: '{}', bytes: {}", name, content.len());
    }

    zip_writer.finish()?;
    Ok(())
}
