pub mod drag;
pub mod form;
pub mod task_board;
