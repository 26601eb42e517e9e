//! タスクモジュール

pub mod commutation;

pub use commutation::commutation_task;
