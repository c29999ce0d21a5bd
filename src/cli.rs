use anyhow::{anyhow, Context, Result};

use crate::schemas::quiz::Role;
use crate::schemas::{AlternativeId, AttemptId, QuestionId};
use crate::session::QuizRoute;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    /// Open a quiz screen and optionally drive it through start and finalize.
    Open {
        route: QuizRoute,
        role: Role,
        start: bool,
        answers: Vec<(QuestionId, AlternativeId)>,
        finalize: bool,
    },
    Result { attempt_id: AttemptId },
}

pub(crate) fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args = args.into_iter();
    let verb = args.next().ok_or_else(|| anyhow!("{USAGE}"))?;

    if verb == "result" {
        let attempt_id = parse_id(args.next(), "result")?;
        if let Some(extra) = args.next() {
            return Err(anyhow!("Unknown argument: {extra}"));
        }
        return Ok(Command::Result { attempt_id });
    }

    let route = match verb.as_str() {
        "quiz" => QuizRoute::Quiz(parse_id(args.next(), "quiz")?),
        "attempt" => QuizRoute::Attempt(parse_id(args.next(), "attempt")?),
        _ => return Err(anyhow!("Unknown command: {verb}\n{USAGE}")),
    };

    let mut role = Role::Student;
    let mut start = false;
    let mut answers = Vec::new();
    let mut finalize = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--teacher" => role = Role::Teacher,
            "--start" => start = true,
            "--answer" => {
                let pair = args.next().ok_or_else(|| anyhow!("--answer missing value"))?;
                answers.push(parse_answer(&pair)?);
            }
            "--finalize" => finalize = true,
            _ => return Err(anyhow!("Unknown argument: {arg}")),
        }
    }

    Ok(Command::Open { route, role, start, answers, finalize })
}

const USAGE: &str = "usage: quiz-session (quiz <id> | attempt <id>) [--teacher] [--start] \
                     [--answer <question>=<alternative>]... [--finalize] | result <attempt-id>";

fn parse_id(value: Option<String>, what: &str) -> Result<i64> {
    let value = value.ok_or_else(|| anyhow!("{what} id missing"))?;
    value.parse::<i64>().with_context(|| format!("invalid {what} id: {value}"))
}

fn parse_answer(pair: &str) -> Result<(QuestionId, AlternativeId)> {
    let (question, alternative) =
        pair.split_once('=').ok_or_else(|| anyhow!("--answer expects <question>=<alternative>"))?;
    let question = question.trim().parse().with_context(|| format!("invalid question id: {question}"))?;
    let alternative =
        alternative.trim().parse().with_context(|| format!("invalid alternative id: {alternative}"))?;
    Ok((question, alternative))
}
