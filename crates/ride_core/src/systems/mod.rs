pub mod assignment;
pub mod candidate_refresh;
pub mod movement;
pub mod request_countdown;
