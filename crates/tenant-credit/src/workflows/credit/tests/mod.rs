mod common;
mod merge;
mod workflow;
