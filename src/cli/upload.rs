use crate::cli::UploadArgs;
use crate::provider::{Document, ResearchInput};
use anyhow::Context as _;

use super::run::research;

pub async fn execute(args: UploadArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    // Binary formats (PDF, PPTX) need converting to text first
    let content = String::from_utf8(bytes).map_err(|_| {
        anyhow::anyhow!(
            "{} is not a UTF-8 text document; convert it to text before uploading",
            args.file.display()
        )
    })?;
    if content.trim().is_empty() {
        anyhow::bail!("{} is empty", args.file.display());
    }

    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    research(
        &args.session,
        &args.research,
        ResearchInput::Document(Document { name, content }),
    )
    .await
}
