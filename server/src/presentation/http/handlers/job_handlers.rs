//! Job handlers (§6 `GET/POST /api/jobs`, `GET /api/jobs/stream`,
//! `GET /api/jobs/{id}`, `PUT /api/jobs/{id}/lines`).

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use uuid::Uuid;

use crate::application::{compute_output_path, NewJob};
use crate::domain::entities::job::{JobPayload, JobSource};
use crate::domain::entities::{BatchCheckpoint, SubtitleCache, SubtitleLine, TranslationJob};
use crate::domain::value_objects::JobState;
use crate::infrastructure::subtitle;
use crate::presentation::http::dto::job_dto::{
    EditLinesRequest, EnqueueResponse, JobDetailQuery, JobDetailResponse, JobEpisodeView, Progress, PreviewLine,
};
use crate::presentation::http::state::AppState;
use crate::shared::error::CoreError;

const DEFAULT_PREVIEW_LIMIT: usize = 80;
const MAX_PREVIEW_LIMIT: usize = 500;

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<TranslationJob>> {
    let mut jobs = state.queue.list().await;
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(jobs)
}

pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(req): Json<crate::domain::entities::EnqueueRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), CoreError> {
    if req.media_path.trim().is_empty() {
        return Err(CoreError::BadRequest("media_path is required".into()));
    }

    let target_language = match req.target_language {
        Some(lang) if !lang.trim().is_empty() => lang,
        _ => state.settings.get().await.target_language,
    };

    let source = match req.source {
        Some(ref s) => s.parse::<JobSource>().map_err(CoreError::BadRequest)?,
        None => JobSource::Manual,
    };

    let dedupe_key = req
        .dedupe_key
        .unwrap_or_else(|| TranslationJob::dedupe_key(&req.media_path, req.subtitle_path.as_deref(), &target_language));

    let payload =
        JobPayload { media_file: req.media_path, subtitle_file: req.subtitle_path, nfo_file: req.nfo_path };

    let (job, created) = state.queue.enqueue(NewJob { source, dedupe_key, payload }).await;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(EnqueueResponse { created, job })))
}

/// Emits the full job list immediately, then every second (§5: "the SSE
/// stream handler owns a 1-second ticker and exits on request-context
/// cancellation"). Axum drops this stream when the client disconnects,
/// which stands in for that cancellation.
pub async fn stream_jobs(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ticks = stream::unfold((state, true), |(state, first)| async move {
        if !first {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        let mut jobs = state.queue.list().await;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let event = match serde_json::to_string(&jobs) {
            Ok(body) => Event::default().data(body),
            Err(_) => Event::default().data("[]"),
        };
        Some((Ok(event), (state, false)))
    });

    Sse::new(ticks).keep_alive(KeepAlive::default())
}

fn target_language_from_dedupe_key(dedupe_key: &str) -> String {
    dedupe_key.rsplit(" | ").next().unwrap_or("en").trim().to_string()
}

async fn resolve_source_lines(state: &AppState, job: &TranslationJob) -> Option<Vec<SubtitleLine>> {
    if let Some(path) = &job.payload.subtitle_file {
        if let Ok(content) = tokio::fs::read_to_string(path).await {
            if let Ok(lines) = subtitle::parse(&content) {
                return Some(lines);
            }
        }
    }

    let cache_key = SubtitleCache::cache_key_for(&job.payload.media_file, 0);
    if let Ok(Some(cached)) = state.store.get_subtitle_cache(&cache_key).await {
        return Some(cached.lines);
    }

    None
}

async fn read_output_lines(output_path: &std::path::Path) -> Option<Vec<SubtitleLine>> {
    let content = tokio::fs::read_to_string(output_path).await.ok()?;
    subtitle::parse(&content).ok()
}

/// Builds the full `{translated, total}` line arrays for a job from whatever
/// state survives: the published output (if the job succeeded), the source
/// subtitle (external file or cache), and batch checkpoints for an
/// in-progress job. Q1 means a successful job whose subtitle was extracted
/// from the embedded track has no recoverable source text once
/// `clear_job_temp` has run, so `original_text` is left blank in that case.
async fn assemble_preview_arrays(
    state: &AppState,
    job: &TranslationJob,
    output_path: &std::path::Path,
) -> (Vec<String>, Vec<String>, usize) {
    let output_lines = if job.status == JobState::Success { read_output_lines(output_path).await } else { None };
    let source_lines = resolve_source_lines(state, job).await;

    let total = output_lines
        .as_ref()
        .map(|l| l.len())
        .or_else(|| source_lines.as_ref().map(|l| l.len()))
        .unwrap_or(0);

    let mut translated = vec![String::new(); total];
    if let Some(lines) = &output_lines {
        for (i, line) in lines.iter().enumerate().take(total) {
            translated[i] = line.text.clone();
        }
    } else {
        let checkpoints = state.store.load_batch_checkpoints(&job.id).await.unwrap_or_default();
        for checkpoint in &checkpoints {
            for (offset, text) in checkpoint.texts.iter().enumerate() {
                let idx = checkpoint.batch_start + offset;
                if idx < total {
                    translated[idx] = text.clone();
                }
            }
        }
    }

    let original = match &source_lines {
        Some(lines) => {
            let mut v: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
            v.resize(total, String::new());
            v
        }
        None => vec![String::new(); total],
    };

    (translated, original, total)
}

fn translated_count(job: &TranslationJob, checkpoints_len: usize, total: usize) -> usize {
    if job.status == JobState::Success {
        total
    } else {
        checkpoints_len.min(total)
    }
}

async fn build_job_detail(
    state: &AppState,
    job: TranslationJob,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Result<JobDetailResponse, CoreError> {
    let target_language = target_language_from_dedupe_key(&job.dedupe_key);
    let output_path =
        compute_output_path(&job.payload.media_file, job.payload.subtitle_file.as_deref(), &target_language);

    let (translated_texts, original_texts, total) = assemble_preview_arrays(state, &job, &output_path).await;

    let checkpoint_lines: usize = state
        .store
        .load_batch_checkpoints(&job.id)
        .await
        .unwrap_or_default()
        .iter()
        .map(BatchCheckpoint::len)
        .sum();
    let progress = Progress::compute(translated_count(&job, checkpoint_lines, total), total);

    let offset = offset.unwrap_or(0).min(total);
    let limit = limit.unwrap_or(DEFAULT_PREVIEW_LIMIT).clamp(1, MAX_PREVIEW_LIMIT);
    let end = (offset + limit).min(total);

    let preview = (offset..end)
        .map(|i| PreviewLine {
            index: i + 1,
            original_text: original_texts.get(i).cloned().unwrap_or_default(),
            translated_text: translated_texts.get(i).cloned().unwrap_or_default(),
        })
        .collect();

    let episode = JobEpisodeView {
        media_path: job.payload.media_file.clone(),
        subtitle_path: job.payload.subtitle_file.clone(),
        nfo_path: job.payload.nfo_file.clone(),
    };

    let editable = job.status == JobState::Success;

    Ok(JobDetailResponse {
        job,
        target_language,
        progress,
        episode,
        preview,
        preview_offset: offset,
        preview_limit: limit,
        editable,
    })
}

pub async fn job_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<JobDetailQuery>,
) -> Result<Json<JobDetailResponse>, CoreError> {
    let job = state.queue.get(&id).await.ok_or_else(|| CoreError::NotFound(format!("job {id} not found")))?;
    let detail = build_job_detail(&state, job, query.offset, query.limit).await?;
    Ok(Json(detail))
}

pub async fn update_lines(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditLinesRequest>,
) -> Result<Json<JobDetailResponse>, CoreError> {
    let job = state.queue.get(&id).await.ok_or_else(|| CoreError::NotFound(format!("job {id} not found")))?;

    match job.status {
        JobState::Running => return Err(CoreError::Conflict(format!("job {id} is currently running"))),
        JobState::Pending => return Err(CoreError::Conflict(format!("job {id} is still pending"))),
        JobState::Success => {}
        _ => return Err(CoreError::BadRequest(format!("job {id} has not completed successfully yet"))),
    }

    let target_language = target_language_from_dedupe_key(&job.dedupe_key);
    let output_path =
        compute_output_path(&job.payload.media_file, job.payload.subtitle_file.as_deref(), &target_language);

    let content = tokio::fs::read_to_string(&output_path)
        .await
        .map_err(|e| CoreError::Internal(format!("failed to read output file: {e}")))?;
    let mut lines = subtitle::parse(&content).map_err(|e| CoreError::Internal(format!("failed to parse output file: {e}")))?;

    for edit in &req.lines {
        if edit.index == 0 || edit.index > lines.len() {
            return Err(CoreError::BadRequest(format!("line index {} out of range", edit.index)));
        }
    }
    for edit in &req.lines {
        lines[edit.index - 1].text = edit.translated_text.clone();
    }

    let body = subtitle::serialize(&lines);
    let tmp_name = format!(
        "{}.tmp-{}",
        output_path.file_name().and_then(|n| n.to_str()).unwrap_or("output"),
        Uuid::new_v4()
    );
    let tmp_path = output_path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, body.as_bytes())
        .await
        .map_err(|e| CoreError::Internal(format!("failed to write output file: {e}")))?;
    tokio::fs::rename(&tmp_path, &output_path)
        .await
        .map_err(|e| CoreError::Internal(format!("failed to publish output file: {e}")))?;

    let detail = build_job_detail(&state, job, None, None).await?;
    Ok(Json(detail))
}
