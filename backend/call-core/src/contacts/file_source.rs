use crate::contacts::ContactSource;
use crate::error::contact_source::ContactSourceError;

use models::Contact;

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

/// Contact directory exported to a local JSON file.
///
/// A missing file is treated like an export that has not been written yet.
#[derive(Debug, Clone)]
pub struct FileContactSource {
    path: PathBuf,
}

impl FileContactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContactSource for FileContactSource {
    async fn fetch(&self) -> Result<Vec<Contact>, ContactSourceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ContactSourceError::transient(format!(
                    "Contact file {} does not exist yet",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(ContactSourceError::unavailable(format!(
                    "Cannot read contact file {}: {e}",
                    self.path.display()
                )));
            }
        };

        Ok(serde_json::from_str(&contents)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
