pub mod enhance;
pub mod listmodels;
pub mod prompts;
pub mod settings;
pub mod suggest;
