pub mod config;
pub mod run;
pub mod search;

pub use crate::config::{ExampleSpec, ProgramSpec, SearchConfig, Session, SlotSpec};
pub use crate::run::{run_for_time, serve, time_limit, Job, Worker};
pub use crate::search::{Example, Outcome, Searcher, Strategy};
