use crate::dispatch::{Batch, JobError};
use crate::server::AppContext;
use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use vidpress_common::{paths::sanitize_file_name, Error, JobDescriptor, ProfileId};

const VIDEO_FIELD: &str = "videos";
const LEVEL_FIELD: &str = "compressionLevel";
const OUTPUT_DIR_FIELD: &str = "outputDir";

/// An upload written to a private temp directory.
///
/// The directory and everything in it is removed on drop.
struct StagedUpload {
    _dir: TempDir,
    name: String,
    path: PathBuf,
}

/// Handle `POST /compress`: stage one uploaded video and compress it.
pub async fn compress_upload(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut staged: Option<StagedUpload> = None;
    let mut level = String::new();
    let mut output_dir = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(VIDEO_FIELD) => {
                if staged.is_some() {
                    return Err(reject(Error::invalid_input("upload one video per request")));
                }
                staged = Some(stage_upload(field).await?);
            }
            Some(LEVEL_FIELD) => level = read_text(field).await?,
            Some(OUTPUT_DIR_FIELD) => output_dir = read_text(field).await?,
            other => {
                tracing::debug!("Ignoring form field {:?}", other);
            }
        }
    }

    let upload = staged.ok_or_else(|| reject(Error::invalid_input("No file uploaded")))?;

    let output_dir = match output_dir.trim() {
        "" => ctx.config.server.default_output_dir(),
        dir => PathBuf::from(shellexpand::tilde(dir).as_ref()),
    };
    let profile = ProfileId::resolve(&level);
    let threads = ctx.config.server.upload_threads();

    tracing::info!(
        "Upload {} staged; compressing at level {} into {:?}",
        upload.name,
        profile,
        output_dir
    );

    let job = JobDescriptor::new(&upload.path, profile, threads).with_output_dir(Some(output_dir));

    // Cancels the job if this request is dropped (timeout or disconnect).
    let cancel = CancellationToken::new();
    let _abort_on_drop = cancel.clone().drop_guard();

    let batch = Batch::new(vec![job], NonZeroUsize::MIN).with_cancellation(cancel);
    let result = ctx
        .dispatcher
        .run_batch(batch)
        .await
        .map_err(|e| error_response(&upload.name, e))?;

    let outcome = result
        .into_outcomes()
        .into_iter()
        .next()
        .ok_or_else(|| error_response(&upload.name, Error::internal("batch produced no outcome")))?;

    match outcome.result {
        Ok(()) => Ok(format!(
            "Successfully compressed {} to {}",
            upload.name,
            outcome.output_path.display()
        )),
        Err(JobError::Cancelled) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Compression of {} was cancelled", upload.name),
        )),
        Err(JobError::Failed(message)) => {
            tracing::error!("Compressing upload {} failed: {}", upload.name, message);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error compressing {}: {}", upload.name, message),
            ))
        }
    }
}

async fn stage_upload(mut field: Field<'_>) -> Result<StagedUpload, (StatusCode, String)> {
    let name = field
        .file_name()
        .and_then(sanitize_file_name)
        .ok_or_else(|| reject(Error::invalid_input("missing or invalid file name")))?;

    let dir = tempfile::Builder::new()
        .prefix("vidpress-upload-")
        .tempdir()
        .map_err(|e| staging_failure(&name, e))?;
    let path = dir.path().join(&name);

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| staging_failure(&name, e))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| staging_failure(&name, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| staging_failure(&name, e))?;

    tracing::debug!("Staged {} ({} bytes) at {:?}", name, written, path);

    Ok(StagedUpload {
        _dir: dir,
        name,
        path,
    })
}

async fn read_text(field: Field<'_>) -> Result<String, (StatusCode, String)> {
    field
        .text()
        .await
        .map_err(|e| reject(Error::invalid_input(format!("unreadable form field: {}", e))))
}

fn staging_failure(name: &str, e: std::io::Error) -> (StatusCode, String) {
    error_response(name, Error::staging(format!("{}: {}", name, e)))
}

fn status_of(e: &Error) -> StatusCode {
    StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// A request rejected before any file was staged.
fn reject(e: Error) -> (StatusCode, String) {
    tracing::warn!("Rejected upload: {}", e);
    (status_of(&e), e.to_string())
}

fn error_response(name: &str, e: Error) -> (StatusCode, String) {
    tracing::error!("Upload {} failed: {}", name, e);
    (status_of(&e), format!("Error compressing {}: {}", name, e))
}
