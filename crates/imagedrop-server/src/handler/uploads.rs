//! Image upload handlers.
//!
//! Every file field of a multipart request is staged to disk and handed to
//! its own transfer task. The client is always redirected to the landing
//! page; individual transfer failures are logged, and reported through the
//! [`UPLOAD_FAILED_HEADER`] when the service waits for its transfers.
//!
//! A body that breaks off midway keeps every file read before the break.
//!
//! [`UPLOAD_FAILED_HEADER`]: crate::handler::UPLOAD_FAILED_HEADER

use axum::Router;
use axum::extract::State;
use axum::extract::multipart::{Field, MultipartError};
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;

use crate::extract::Multipart;
use crate::handler::response::UploadSummaryHeaders;
use crate::service::{
    LandingPage, ServiceState, StagedFile, StagingArea, StagingError, TransferService,
};

/// Tracing target for upload operations.
const TRACING_TARGET: &str = "imagedrop_server::handler::uploads";

/// Stages and transfers every uploaded file, then redirects.
#[tracing::instrument(skip_all)]
async fn upload_files(
    State(staging): State<StagingArea>,
    State(transfers): State<TransferService>,
    State(landing_page): State<LandingPage>,
    Multipart(mut multipart): Multipart,
) -> impl IntoResponse {
    let mut batch = transfers.batch();

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %err,
                    status = %err.status(),
                    "multipart body ended early"
                );
                break;
            }
        };

        let Some(file_name) = field.file_name().map(str::to_owned) else {
            tracing::trace!(
                target: TRACING_TARGET,
                field = field.name().unwrap_or_default(),
                "skipping non-file field"
            );
            continue;
        };

        match stage_field(&staging, &mut field, &file_name).await {
            Ok(Ok(staged)) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    file = %staged.name,
                    size = staged.size,
                    "file staged"
                );
                batch.spawn(staged);
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    file = %file_name,
                    error = %err,
                    "file skipped"
                );
                batch.skip();
            }
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    file = %file_name,
                    error = %err,
                    status = %err.status(),
                    "multipart body ended inside a file"
                );
                batch.skip();
                break;
            }
        }
    }

    let started = batch.len();
    let summary = batch.finish().await;

    tracing::info!(
        target: TRACING_TARGET,
        transfers = started,
        waited = summary.is_some(),
        "upload accepted"
    );

    (
        summary.map(UploadSummaryHeaders),
        Redirect::to(landing_page.as_str()),
    )
}

/// Writes one file field to the staging area.
///
/// The outer error means the request body is unreadable from here on; the
/// inner one only skips this file.
async fn stage_field(
    staging: &StagingArea,
    field: &mut Field<'_>,
    file_name: &str,
) -> Result<Result<StagedFile, StagingError>, MultipartError> {
    let mut writer = match staging.create(file_name).await {
        Ok(writer) => writer,
        Err(err) => return Ok(Err(err)),
    };

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Ok(writer.finish().await),
            Err(err) => {
                writer.discard().await;
                return Err(err);
            }
        };

        if let Err(err) = writer.write(&chunk).await {
            writer.discard().await;
            return Ok(Err(err));
        }
    }
}

/// Redirects plain navigations of the upload URL.
async fn upload_page(State(landing_page): State<LandingPage>) -> Redirect {
    Redirect::to(landing_page.as_str())
}

/// Returns a [`Router`] with the upload routes.
pub fn routes() -> Router<ServiceState> {
    Router::new().route("/upload", get(upload_page).post(upload_files))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use imagedrop_storage::{Error as StorageError, MemoryContainer};

    use crate::handler::test::{create_test_app, create_test_app_with};
    use crate::handler::{UPLOAD_FAILED_HEADER, UPLOAD_SUCCEEDED_HEADER};
    use crate::service::TransferPolicy;

    const BOUNDARY: &str = "imagedrop-boundary";

    fn file(name: &str, data: &'static [u8]) -> Part {
        Part::bytes(data).file_name(name).mime_type("image/png")
    }

    /// A complete `good.png` part followed by a `broken.png` part that never
    /// reaches its closing boundary.
    fn truncated_body() -> Vec<u8> {
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"good.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             ok\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"broken.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             partial"
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn uploads_every_file_and_redirects() -> anyhow::Result<()> {
        let app = create_test_app().await?;

        let form = MultipartForm::new()
            .add_text("caption", "holiday")
            .add_part("files", file("cat.png", b"meow"))
            .add_part("files", file("dog.png", b"woof"));

        let response = app.server.post("/upload").multipart(form).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/index.html");
        assert_eq!(response.header(UPLOAD_SUCCEEDED_HEADER), "2");
        assert_eq!(response.header(UPLOAD_FAILED_HEADER), "0");

        assert_eq!(app.images.blob_names(), vec!["cat.png", "dog.png"]);
        assert_eq!(app.images.blob("cat.png").as_deref(), Some(&b"meow"[..]));
        assert_eq!(app.images.create_calls(), 1);
        assert_eq!(app.staged_files().len(), 2);
        assert!(app.staged_files().iter().any(|name| name.ends_with("-cat.png")));
        Ok(())
    }

    #[tokio::test]
    async fn failed_transfer_does_not_fail_request() -> anyhow::Result<()> {
        let app = create_test_app().await?;
        app.images
            .fail_put("bad.png", StorageError::transport("forbidden").with_status(403));

        let form = MultipartForm::new()
            .add_part("files", file("good.png", b"ok"))
            .add_part("files", file("bad.png", b"no"));

        let response = app.server.post("/upload").multipart(form).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header(UPLOAD_SUCCEEDED_HEADER), "1");
        assert_eq!(response.header(UPLOAD_FAILED_HEADER), "1");
        assert_eq!(app.images.blob_names(), vec!["good.png"]);
        Ok(())
    }

    #[tokio::test]
    async fn strips_client_directories() -> anyhow::Result<()> {
        let app = create_test_app().await?;

        let form = MultipartForm::new()
            .add_part("files", file("C:\\Users\\me\\Pictures\\cat.png", b"meow"));

        let response = app.server.post("/upload").multipart(form).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(app.images.blob_names(), vec!["cat.png"]);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_file_is_skipped() -> anyhow::Result<()> {
        let app = create_test_app_with(MemoryContainer::new("thumbnails"), |mut config| {
            config.max_file_size = 4;
            config
        })
        .await?;

        let form = MultipartForm::new()
            .add_part("files", file("big.png", b"too large"))
            .add_part("files", file("small.png", b"ok"));

        let response = app.server.post("/upload").multipart(form).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header(UPLOAD_SUCCEEDED_HEADER), "1");
        assert_eq!(response.header(UPLOAD_FAILED_HEADER), "1");
        assert_eq!(app.images.blob_names(), vec!["small.png"]);
        assert!(!app.staged_files().iter().any(|name| name.ends_with("-big.png")));
        Ok(())
    }

    #[tokio::test]
    async fn same_name_files_are_staged_apart() -> anyhow::Result<()> {
        let app = create_test_app().await?;

        let form = MultipartForm::new()
            .add_part("files", file("cat.png", b"meow"))
            .add_part("files", file("cat.png", b"purr"));

        let response = app.server.post("/upload").multipart(form).await;
        assert_eq!(response.header(UPLOAD_SUCCEEDED_HEADER), "2");

        let mut contents = Vec::new();
        for name in app.staged_files() {
            contents.push(std::fs::read(app.staging.path().join("images").join(name))?);
        }
        contents.sort();
        assert_eq!(contents, vec![b"meow".to_vec(), b"purr".to_vec()]);

        let blob = app.images.blob("cat.png").unwrap_or_default();
        assert!(blob == &b"meow"[..] || blob == &b"purr"[..]);
        Ok(())
    }

    #[tokio::test]
    async fn truncated_body_keeps_earlier_files() -> anyhow::Result<()> {
        let app = create_test_app().await?;

        let response = app
            .server
            .post("/upload")
            .content_type(&format!("multipart/form-data; boundary={BOUNDARY}"))
            .bytes(truncated_body().into())
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/index.html");
        assert_eq!(response.header(UPLOAD_SUCCEEDED_HEADER), "1");
        assert_eq!(app.images.blob("good.png").as_deref(), Some(&b"ok"[..]));
        assert!(app.images.blob("broken.png").is_none());
        assert!(!app.staged_files().iter().any(|name| name.ends_with("-broken.png")));
        Ok(())
    }

    #[tokio::test]
    async fn truncated_body_keeps_detached_transfers() -> anyhow::Result<()> {
        let app = create_test_app_with(MemoryContainer::new("thumbnails"), |mut config| {
            config.transfer_policy = TransferPolicy::Detach;
            config
        })
        .await?;

        let response = app
            .server
            .post("/upload")
            .content_type(&format!("multipart/form-data; boundary={BOUNDARY}"))
            .bytes(truncated_body().into())
            .await;
        response.assert_status(StatusCode::SEE_OTHER);

        for _ in 0..100 {
            if app.images.blob("good.png").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(app.images.blob("good.png").as_deref(), Some(&b"ok"[..]));
        Ok(())
    }

    #[tokio::test]
    async fn detached_upload_redirects_without_counts() -> anyhow::Result<()> {
        let app = create_test_app_with(MemoryContainer::new("thumbnails"), |mut config| {
            config.transfer_policy = TransferPolicy::Detach;
            config.landing_page = "/gallery".to_owned();
            config
        })
        .await?;

        let form = MultipartForm::new().add_part("files", file("cat.png", b"meow"));

        let response = app.server.post("/upload").multipart(form).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/gallery");
        assert!(response.maybe_header(UPLOAD_SUCCEEDED_HEADER).is_none());

        for _ in 0..100 {
            if app.images.blob("cat.png").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(app.images.blob("cat.png").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn rejects_non_multipart_body() -> anyhow::Result<()> {
        let app = create_test_app().await?;

        let response = app.server.post("/upload").text("not a form").await;
        response.assert_status_bad_request();

        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "bad_request");
        Ok(())
    }

    #[tokio::test]
    async fn get_redirects_to_landing_page() -> anyhow::Result<()> {
        let app = create_test_app().await?;

        let response = app.server.get("/upload").await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/index.html");
        Ok(())
    }
}
