mod parsing;
mod settings;
mod token;
mod types;

pub(crate) use types::Settings;
