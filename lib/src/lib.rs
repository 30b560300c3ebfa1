#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(async_fn_in_trait)]

pub mod db;
pub mod engine;
pub mod resolve;
