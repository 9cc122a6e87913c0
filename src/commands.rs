//! Headless subcommands: account handling, listing, deleting and uploading without the TUI
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre;

use volt_tui::model::error::{ApiError, FormErrors};
use volt_tui::model::file_record::{FileRecord, StorageStats};
use volt_tui::model::transfer_event::TransferEvent;
use volt_tui::model::upload_item::UploadId;
use volt_tui::model::user::{LoginRequest, RegisterRequest};
use volt_tui::services::api_client::{AuthApi, FileApi, UploadApi};
use volt_tui::services::batch_debouncer::{sleep_until, Clock, DebounceTimings, SystemClock};
use volt_tui::services::dashboard::Dashboard;
use volt_tui::services::transfer_channel::{UploadOptions, UploadQueue};
use volt_tui::services::upload_tracker::UploadTracker;
use volt_tui::settings::session::SessionStore;
use volt_tui::utils::format_progress_bar;

const BAR_WIDTH: usize = 20;

/// Turn an API failure into the message a user would see in a form
fn user_error(error: ApiError) -> eyre::Report {
    tracing::error!("request failed: {}", error);
    let errors = FormErrors::from_api_error(&error);
    let mut lines: Vec<String> = errors.general_message().map(str::to_string).into_iter().collect();
    lines.extend(errors.fields().map(|(field, msg)| format!("{}: {}", field, msg)));
    eyre::eyre!(lines.join("\n"))
}

pub async fn login(
    api: &dyn AuthApi,
    session: &dyn SessionStore,
    email: String,
    password: String,
    out: &mut impl Write,
) -> eyre::Result<()> {
    let auth = api
        .login(LoginRequest { email, password })
        .await
        .map_err(user_error)?;
    session.save(&auth)?;
    writeln!(out, "Logged in as {}", auth.user.username)?;
    Ok(())
}

pub async fn register(
    api: &dyn AuthApi,
    session: &dyn SessionStore,
    request: RegisterRequest,
    out: &mut impl Write,
) -> eyre::Result<()> {
    let auth = api.register(request).await.map_err(user_error)?;
    session.save(&auth)?;
    writeln!(out, "Account {} created, you are logged in", auth.user.username)?;
    Ok(())
}

pub fn logout(session: &dyn SessionStore, out: &mut impl Write) -> eyre::Result<()> {
    session.clear()?;
    writeln!(out, "Logged out")?;
    Ok(())
}

pub async fn whoami(
    api: &dyn AuthApi,
    session: &dyn SessionStore,
    out: &mut impl Write,
) -> eyre::Result<()> {
    if session.token().is_none() {
        writeln!(out, "Not logged in")?;
        return Ok(());
    }
    let user = api.profile().await.map_err(user_error)?;
    writeln!(out, "{} <{}> (id {})", user.username, user.email, user.id)?;
    Ok(())
}

fn write_stats(out: &mut impl Write, stats: &StorageStats) -> eyre::Result<()> {
    writeln!(
        out,
        "{} files, {} used, {} duplicates",
        stats.total_files,
        stats.storage_used(),
        stats.duplicates()
    )?;
    Ok(())
}

fn write_files(out: &mut impl Write, files: &[FileRecord]) -> eyre::Result<()> {
    for file in files {
        writeln!(out, "{:>6}  {}", file.id, file.to_columns().join("  "))?;
    }
    Ok(())
}

/// Load the user's files into a fresh dashboard
async fn load_dashboard(api: &dyn FileApi, session: &dyn SessionStore) -> eyre::Result<Dashboard> {
    let user = session
        .user()
        .ok_or_else(|| user_error(ApiError::MissingCredential))?;
    let mut dashboard = Dashboard::new();
    dashboard.apply_files(api.list_files(user.id).await);
    dashboard.apply_stats(api.storage_stats().await);
    if let Some(message) = dashboard.errors().general_message() {
        eyre::bail!("{}", message);
    }
    Ok(dashboard)
}

pub async fn list(
    api: &dyn FileApi,
    session: &dyn SessionStore,
    out: &mut impl Write,
) -> eyre::Result<()> {
    let dashboard = load_dashboard(api, session).await?;
    if dashboard.files().is_empty() {
        writeln!(out, "No files yet")?;
    } else {
        write_files(out, dashboard.files())?;
    }
    write_stats(out, dashboard.stats())
}

pub async fn delete(
    api: &dyn FileApi,
    session: &dyn SessionStore,
    id: u64,
    out: &mut impl Write,
) -> eyre::Result<()> {
    let mut dashboard = load_dashboard(api, session).await?;
    let name = dashboard
        .files()
        .iter()
        .find(|f| f.id == id)
        .map(|f| f.display_name.clone())
        .unwrap_or_else(|| format!("file {}", id));

    dashboard.remove_file(api, id).await;
    if let Some(message) = dashboard.errors().general_message() {
        eyre::bail!("Could not delete {}: {}", name, message);
    }
    writeln!(out, "Deleted {}", name)?;
    write_stats(out, dashboard.stats())
}

/// What a headless upload run ended with
#[derive(Debug, Default)]
pub struct UploadSummary {
    /// Records handed over by the tracker, newest batch first
    pub files: Vec<FileRecord>,
    pub stats: Option<StorageStats>,
    /// Finished uploads never handed over because no storage snapshot came back
    pub held: usize,
    pub failed: Vec<(String, String)>,
    pub general_error: Option<String>,
}

/// Upload `files` and print progress lines until the batch has settled
pub async fn upload(
    api: Arc<dyn UploadApi>,
    session: &dyn SessionStore,
    options: UploadOptions,
    timings: DebounceTimings,
    files: Vec<PathBuf>,
    out: &mut impl Write,
) -> eyre::Result<UploadSummary> {
    let clock = SystemClock;
    let mut tracker = UploadTracker::mount(session, timings).map_err(user_error)?;
    let (queue, mut events) = UploadQueue::new(api, options);
    let expected = queue.enqueue(files).await.len();

    let mut dashboard = Dashboard::default();
    let mut merged = false;
    let mut printed: HashMap<UploadId, u8> = HashMap::new();
    let mut terminal = 0;

    loop {
        let settled = terminal == expected
            && (tracker.pending_results().is_empty() || tracker.next_deadline().is_none());
        if settled {
            break;
        }
        let deadline = tracker.next_deadline();

        tokio::select! {
            Some(event) = events.recv() => {
                let id = event.id();
                if event.is_terminal() {
                    terminal += 1;
                }
                let line = describe(&event, &mut printed);
                tracker.handle(event, clock.now());
                if let Some(line) = line {
                    let line = match tracker.progress(id) {
                        Some(progress) => format!("{} {:>3}% {}", format_progress_bar(progress, BAR_WIDTH), progress, line),
                        None => line,
                    };
                    writeln!(out, "{}", line)?;
                }
            },
            _ = sleep_until(deadline) => {
                if let Some(batch) = tracker.poll(clock.now()) {
                    dashboard.merge_upload_batch(batch.files, batch.stats);
                    merged = true;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                let cancelled = queue.cancel_all().await;
                tracing::info!("interrupted, cancelled {} uploads", cancelled.len());
            }
        }
    }

    Ok(UploadSummary {
        files: dashboard.files().to_vec(),
        stats: merged.then(|| dashboard.stats().clone()),
        held: tracker.pending_results().len(),
        failed: tracker.errors(),
        general_error: tracker
            .general_errors()
            .general_message()
            .map(str::to_string),
    })
}

/// One output line per lifecycle step, progress only every tenth percent
fn describe(event: &TransferEvent, printed: &mut HashMap<UploadId, u8>) -> Option<String> {
    match event {
        TransferEvent::Started { file_name, .. } => Some(format!("queued {}", file_name)),
        TransferEvent::Progress { id, completed } => {
            let step = (completed.clamp(0.0, 100.0) / 10.0).floor() as u8;
            let last = printed.entry(*id).or_insert(0);
            if step > *last && step < 10 {
                *last = step;
                Some("uploading".to_string())
            } else {
                None
            }
        }
        TransferEvent::Finished { .. } => Some("done".to_string()),
        TransferEvent::Failed { message, .. } => Some(format!("failed: {}", message)),
        TransferEvent::Cancelled { .. } => Some("cancelled".to_string()),
    }
}

pub fn write_upload_summary(out: &mut impl Write, summary: &UploadSummary) -> eyre::Result<()> {
    if !summary.files.is_empty() {
        writeln!(out, "Uploaded:")?;
        write_files(out, &summary.files)?;
    }
    if let Some(stats) = &summary.stats {
        write_stats(out, stats)?;
    }
    if summary.held > 0 {
        writeln!(
            out,
            "{} uploads finished but the server sent no storage usage; run `list` to see them",
            summary.held
        )?;
    }
    for (name, message) in &summary.failed {
        writeln!(out, "{}: {}", name, message)?;
    }
    if let Some(message) = &summary.general_error {
        writeln!(out, "{}", message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use volt_tui::model::error::ApiResult;
    use volt_tui::model::transfer_event::UploadReply;
    use volt_tui::model::user::{AuthResponse, User};
    use volt_tui::services::api_client::ProgressFn;
    use volt_tui::settings::session::MemorySessionStore;

    struct StubAuth;

    #[async_trait]
    impl AuthApi for StubAuth {
        async fn login(&self, request: LoginRequest) -> ApiResult<AuthResponse> {
            if request.password == "secret" {
                Ok(AuthResponse {
                    token: "t0k3n".to_string(),
                    user: User {
                        id: 1,
                        username: "ada".to_string(),
                        email: request.email,
                        ..User::default()
                    },
                })
            } else {
                Err(ApiError::Unauthorized("invalid credentials".to_string()))
            }
        }

        async fn register(&self, _request: RegisterRequest) -> ApiResult<AuthResponse> {
            Err(ApiError::Conflict("username already taken".to_string()))
        }

        async fn profile(&self) -> ApiResult<User> {
            Ok(User::default())
        }
    }

    /// Answers every upload with one record; only `a.txt` carries a storage snapshot
    struct StubUploader;

    #[async_trait]
    impl UploadApi for StubUploader {
        async fn upload_file(
            &self,
            path: PathBuf,
            _is_private: bool,
            on_progress: ProgressFn,
        ) -> ApiResult<UploadReply> {
            on_progress(50, 100);
            on_progress(100, 100);
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            let id = if name == "a.txt" { 1 } else { 2 };
            let stats = if name == "a.txt" {
                r#", "storage_stats": {"total_files": 2}"#
            } else {
                ""
            };
            Ok(UploadReply::new(
                201,
                format!(
                    r#"{{"success": true, "files": [{{"file_reference": {{"id": {}, "display_name": "{}"}}}}]{}}}"#,
                    id, name, stats
                ),
            ))
        }
    }

    fn timings() -> DebounceTimings {
        DebounceTimings {
            quiescence: Duration::from_millis(100),
            clear_after: Duration::from_millis(20),
        }
    }

    fn write_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"hello").unwrap();
        path
    }

    #[tokio::test]
    async fn test_login_saves_session() {
        let session = MemorySessionStore::new();
        let mut out = Vec::new();
        login(&StubAuth, &session, "ada@example.com".into(), "secret".into(), &mut out)
            .await
            .unwrap();
        assert_eq!(session.token().as_deref(), Some("t0k3n"));
        assert_eq!(String::from_utf8(out).unwrap(), "Logged in as ada\n");
    }

    #[tokio::test]
    async fn test_bad_password_shows_form_message() {
        let session = MemorySessionStore::new();
        let mut out = Vec::new();
        let err = login(&StubAuth, &session, "ada@example.com".into(), "nope".into(), &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password. Please try again.");
        assert!(session.token().is_none());
    }

    #[tokio::test]
    async fn test_register_conflict_names_the_field() {
        let session = MemorySessionStore::new();
        let request = RegisterRequest {
            username: "ada".into(),
            email: "ada@example.com".into(),
            password: "secret".into(),
        };
        let err = register(&StubAuth, &session, request, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "username: This username is already taken.");
    }

    #[tokio::test]
    async fn test_whoami_without_session() {
        let mut out = Vec::new();
        whoami(&StubAuth, &MemorySessionStore::new(), &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Not logged in\n");
    }

    #[tokio::test]
    async fn test_upload_requires_session() {
        let err = upload(
            Arc::new(StubUploader),
            &MemorySessionStore::new(),
            UploadOptions::default(),
            timings(),
            vec![PathBuf::from("a.txt")],
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Authentication required. Please log in again.");
    }

    #[tokio::test]
    async fn test_upload_merges_batch_with_snapshot() {
        let dir = TempDir::new().unwrap();
        let files = vec![write_file(&dir, "a.txt"), write_file(&dir, "b.txt")];
        let session = MemorySessionStore::with_token("t0k3n", User::default());
        let mut out = Vec::new();

        let summary = upload(
            Arc::new(StubUploader),
            &session,
            UploadOptions::default(),
            timings(),
            files,
            &mut out,
        )
        .await
        .unwrap();

        let mut ids: Vec<u64> = summary.files.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(summary.stats.map(|s| s.total_files), Some(2));
        assert_eq!(summary.held, 0);
        assert!(summary.failed.is_empty());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("queued a.txt"));
        assert!(printed.contains("100% done"));
    }

    #[tokio::test]
    async fn test_upload_without_snapshot_is_held() {
        let dir = TempDir::new().unwrap();
        let session = MemorySessionStore::with_token("t0k3n", User::default());

        let summary = upload(
            Arc::new(StubUploader),
            &session,
            UploadOptions::default(),
            timings(),
            vec![write_file(&dir, "b.txt")],
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert!(summary.files.is_empty());
        assert_eq!(summary.stats, None);
        assert_eq!(summary.held, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let session = MemorySessionStore::with_token("t0k3n", User::default());
        let summary = upload(
            Arc::new(StubUploader),
            &session,
            UploadOptions::default(),
            timings(),
            vec![PathBuf::from("/definitely/not/here.txt")],
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "here.txt");
        let mut out = Vec::new();
        write_upload_summary(&mut out, &summary).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("here.txt: Cannot read file"));
    }
}
