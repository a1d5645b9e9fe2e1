//! Label printer interface.
//!
//! The print composer lays out the label; this crate only decides what
//! goes on it.

use async_trait::async_trait;
use mart_core::{LabelMetadata, LabelSpec};
use serde::{Deserialize, Serialize};

use crate::error::PrintError;

/// One label to print.
///
/// A job whose `spec.invalid` is set is still sent; the composer prints a
/// placeholder in place of the bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelJob {
    pub spec: LabelSpec,
    pub metadata: LabelMetadata,
    pub copies: u32,
}

#[async_trait]
pub trait LabelPrinter: Send + Sync {
    async fn print(&self, job: &LabelJob) -> Result<(), PrintError>;
}
