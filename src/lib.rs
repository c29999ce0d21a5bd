mod cli;
pub(crate) mod core;
pub mod errors;
pub mod schemas;
pub mod services;
pub mod session;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

pub use crate::errors::SessionError;
pub use crate::services::quiz_api::{HttpQuizApi, QuizApi, QuizApiError};
pub use crate::session::{
    load_result, Navigator, QuizRoute, QuizSession, ResultView, SessionOptions, SessionSnapshot,
};

use crate::cli::Command;
use crate::core::{config::Settings, telemetry};

/// Prints the route a shell would navigate to.
struct StdoutNavigator;

impl Navigator for StdoutNavigator {
    fn navigate(&self, route: &str) {
        tracing::info!(route, "Navigating");
        println!("navigate: {route}");
    }
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let command = cli::parse_args(std::env::args().skip(1))?;
    let api: Arc<dyn QuizApi> = Arc::new(HttpQuizApi::from_settings(&settings)?);
    let options = settings.session_options();

    tracing::info!(
        base_url = %settings.api().base_url,
        environment = %settings.runtime().environment.as_str(),
        "Quiz session client ready"
    );

    let result = match command {
        Command::Result { attempt_id } => {
            let timeout = Duration::from_secs(settings.api().request_timeout_seconds);
            load_result(api.as_ref(), attempt_id, timeout).await.map(|view| {
                tracing::info!(
                    attempt_id,
                    finished_at = %core::time::format_timestamp(view.finished_at),
                    correct = view.correct,
                    total = view.total,
                    "Loaded attempt result"
                );
                print_json(&view);
            })
        }
        Command::Open { route, role, start, answers, finalize } => {
            drive_session(api, options, route, role, start, answers, finalize).await
        }
    };

    if settings.telemetry().prometheus_enabled {
        if let Some(rendered) = core::metrics::render() {
            eprintln!("{rendered}");
        }
    }

    result.map_err(|err| {
        tracing::error!(error = %err, retryable = err.is_retryable(), "Quiz session failed");
        let message = err.user_message();
        anyhow::Error::new(err).context(message)
    })
}

async fn drive_session(
    api: Arc<dyn QuizApi>,
    options: SessionOptions,
    route: QuizRoute,
    role: schemas::quiz::Role,
    start: bool,
    answers: Vec<(schemas::QuestionId, schemas::AlternativeId)>,
    finalize: bool,
) -> Result<(), SessionError> {
    let session = QuizSession::open(api, Arc::new(StdoutNavigator), options, route, role).await?;

    if start {
        session.start().await?;
    }
    for (question_id, alternative_id) in answers {
        if !session.select(question_id, alternative_id) {
            tracing::warn!(question_id, alternative_id, "Answer ignored");
        }
    }
    let snapshot = session.snapshot();
    print_json(&snapshot);
    if let Some(remaining) = snapshot.time_remaining_seconds {
        tracing::info!(remaining = %core::time::format_countdown(remaining), "Attempt timer");
    }

    if finalize {
        match session.finalize().await {
            Err(SessionError::SavedNotFinalized { .. }) => {
                tracing::warn!(session_id = %session.id(), "Retrying finalize once more");
                session.retry_finalize().await?;
            }
            other => {
                other?;
            }
        }
        print_json(&session.snapshot());
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(error = %err, "Failed to render JSON"),
    }
}
