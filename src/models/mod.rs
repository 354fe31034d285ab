pub mod doodle;
