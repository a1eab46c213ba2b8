//! Ref update records as delivered to a pre-receive hook.

use crate::error::RefUpdateError;

/// New hash git reports when a ref is deleted
pub const DELETE_BRANCH_HASH: &str = "0000000000000000000000000000000000000000";

/// Ref type of branches (`refs/heads/<branch>`)
pub const BRANCH_REF_TYPE: &str = "heads";

/// One `<old> <new> <ref>` update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub old_hash: String,
    pub new_hash: String,
    pub ref_name: String,
}

impl RefUpdate {
    pub fn new(
        old_hash: impl Into<String>,
        new_hash: impl Into<String>,
        ref_name: impl Into<String>,
    ) -> Self {
        Self {
            old_hash: old_hash.into(),
            new_hash: new_hash.into(),
            ref_name: ref_name.into(),
        }
    }

    /// Parse a single stdin line. Fields are separated by single spaces.
    pub fn parse(line: &str) -> Result<Self, RefUpdateError> {
        let parts: Vec<&str> = line.split(' ').collect();
        match parts.as_slice() {
            [old_hash, new_hash, ref_name] => Ok(Self::new(*old_hash, *new_hash, *ref_name)),
            _ => Err(RefUpdateError::InvalidLine {
                fields: parts.len(),
            }),
        }
    }

    /// Build an update from positional arguments, which must be exactly three
    pub fn from_args(args: &[String]) -> Result<Self, RefUpdateError> {
        match args {
            [old_hash, new_hash, ref_name] => {
                Ok(Self::new(old_hash.as_str(), new_hash.as_str(), ref_name.as_str()))
            }
            _ => Err(RefUpdateError::InvalidArgs),
        }
    }

    // ref_name looks like "refs/<type>/<name...>"
    fn segments(&self) -> impl Iterator<Item = &str> {
        self.ref_name.splitn(3, '/')
    }

    /// Second segment of the ref name (`heads`, `tags`, ...)
    pub fn ref_type(&self) -> Option<&str> {
        self.segments().nth(1)
    }

    /// Everything after the ref type, untouched (`feature/x` stays whole)
    pub fn branch_name(&self) -> Option<&str> {
        self.segments().nth(2)
    }

    pub fn is_branch(&self) -> bool {
        self.ref_type() == Some(BRANCH_REF_TYPE)
    }

    pub fn is_delete(&self) -> bool {
        self.new_hash == DELETE_BRANCH_HASH
    }
}
